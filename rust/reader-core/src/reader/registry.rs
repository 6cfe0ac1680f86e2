// rust/reader-core/src/reader/registry.rs

//! Process-wide map from source identity to the body serving it.
//!
//! Entries are weak: the map never keeps a body alive. Lookups, creation and
//! removal all happen under one lock so two handles for the same source
//! always end up sharing one body.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use once_cell::sync::Lazy;
use tracing::debug;

use super::body::Body;
use crate::config::SourceConfig;
use crate::error::Result;
use crate::store::StoreOpener;

static BODIES: Lazy<Mutex<HashMap<String, Weak<Body>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn bodies() -> MutexGuard<'static, HashMap<String, Weak<Body>>> {
    // The map stays consistent even if a holder panicked
    BODIES.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Returns the running body for the source, starting one if there is none.
///
/// A body that is still registered but no longer running is replaced.
pub(crate) fn resolve_or_create(
    config: &SourceConfig,
    opener: &dyn StoreOpener,
) -> Result<Arc<Body>> {
    let key = config.source_key();
    let mut stale = None;

    let resolved = {
        let mut map = bodies();
        match map.get(&key).and_then(Weak::upgrade) {
            Some(body) if body.is_running() => {
                debug!(source = %key, body_id = body.id(), "reusing reader body");
                Ok(body)
            }
            existing => {
                stale = existing;
                Body::start(config, opener).map(|body| {
                    let body = Arc::new(body);
                    map.insert(key.clone(), Arc::downgrade(&body));
                    body
                })
            }
        }
    };

    // Dropping a body takes the lock, so the last stale owner goes here
    drop(stale);
    resolved
}

/// Forgets the entry for `key` if its body is gone.
pub(crate) fn release(key: &str) {
    let mut map = bodies();
    if map.get(key).is_some_and(|weak| weak.strong_count() == 0) {
        map.remove(key);
        debug!(source = key, "reader body unregistered");
    }
}

/// Whether a live body is registered for `source_key`.
pub fn is_live(source_key: &str) -> bool {
    let body = bodies().get(source_key).and_then(Weak::upgrade);
    body.is_some_and(|body| body.is_running())
}
