// rust/reader-core/src/reader/body.rs

//! The background loop that scans one source and feeds every queue pair
//! attached to it.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info, warn};

use super::queue::{liveness, LivenessGuard, LivenessWatch, QueuePair};
use super::registry;
use super::traversal::{traversal_for, Traversal};
use crate::config::SourceConfig;
use crate::error::{ReaderError, Result};
use crate::store::StoreOpener;

static NEXT_BODY_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a body's loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyState {
    /// Running with no queue pair attached.
    Idle,
    /// Running with at least one queue pair attached.
    Serving,
    /// Stop requested; the loop exits at the next iteration boundary.
    Stopping,
    /// The loop has exited.
    Terminated,
}

impl BodyState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Serving,
            2 => Self::Stopping,
            _ => Self::Terminated,
        }
    }
}

/// One background reader per source identity.
///
/// Owned jointly by every [`DataReader`](super::DataReader) attached to the
/// source. Dropping the last owner stops the loop and joins its thread.
pub struct Body {
    id: u64,
    source_key: String,
    intake: Option<Sender<Arc<QueuePair>>>,
    stop: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    // Disconnects when the loop's thread finishes
    producer: LivenessWatch,
    thread: Option<JoinHandle<()>>,
}

impl Body {
    /// Opens the source's store and starts the loop.
    ///
    /// # Errors
    ///
    /// Store open and empty-source errors are returned before any thread is
    /// started.
    pub(crate) fn start(config: &SourceConfig, opener: &dyn StoreOpener) -> Result<Self> {
        let source_key = config.source_key();
        let store = opener.open(config)?;
        let traversal = traversal_for(config, store)?;

        let id = NEXT_BODY_ID.fetch_add(1, Ordering::Relaxed);
        let (intake_tx, intake_rx) = unbounded();
        let (guard, producer) = liveness();
        let stop = Arc::new(AtomicBool::new(false));
        let state = Arc::new(AtomicU8::new(BodyState::Idle as u8));

        let worker = Worker {
            id,
            source_key: source_key.clone(),
            traversal,
            intake: intake_rx,
            active: Vec::new(),
            stop: stop.clone(),
            state: state.clone(),
            _alive: guard,
        };

        let thread = thread::Builder::new()
            .name(format!("reader-body-{id}"))
            .spawn(move || worker.run())
            .map_err(|e| ReaderError::Thread {
                message: format!("reader body for '{source_key}'"),
                source: e,
            })?;

        info!(body_id = id, source = %source_key, shuffle = config.shuffle, "started reader body");

        Ok(Self {
            id,
            source_key,
            intake: Some(intake_tx),
            stop,
            state,
            producer,
            thread: Some(thread),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    pub fn state(&self) -> BodyState {
        BodyState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the loop is still accepting and serving pairs.
    pub fn is_running(&self) -> bool {
        matches!(self.state(), BodyState::Idle | BodyState::Serving) && self.producer.is_alive()
    }

    /// Watch handed to new queue pairs so their `full` queue notices when
    /// this body's loop is gone.
    pub(crate) fn producer_watch(&self) -> LivenessWatch {
        self.producer.clone()
    }

    /// Queues a pair for the loop to pick up at its next iteration.
    pub(crate) fn attach(&self, pair: Arc<QueuePair>) -> Result<()> {
        let intake = match &self.intake {
            Some(intake) if self.is_running() => intake,
            _ => return Err(ReaderError::reader_stopped(&self.source_key)),
        };
        intake
            .send(pair)
            .map_err(|_| ReaderError::reader_stopped(&self.source_key))
    }
}

impl Drop for Body {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        let _ = self.state.compare_exchange(
            BodyState::Idle as u8,
            BodyState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        let _ = self.state.compare_exchange(
            BodyState::Serving as u8,
            BodyState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        // Wakes the loop if it is waiting for its first pair
        self.intake.take();

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(body_id = self.id, source = %self.source_key, "reader body thread panicked");
            }
        }

        registry::release(&self.source_key);
        debug!(body_id = self.id, source = %self.source_key, "reader body released");
    }
}

/// State owned by the loop's thread.
struct Worker {
    id: u64,
    source_key: String,
    traversal: Box<dyn Traversal>,
    intake: Receiver<Arc<QueuePair>>,
    // Attached pairs in attach order
    active: Vec<Arc<QueuePair>>,
    stop: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    _alive: LivenessGuard,
}

impl Worker {
    fn run(mut self) {
        while !self.stop.load(Ordering::Acquire) {
            if !self.accept_pairs() {
                break;
            }
            if let Err(e) = self.tick() {
                error!(
                    body_id = self.id,
                    source = %self.source_key,
                    error = %e,
                    "reader body stopping on store failure"
                );
                break;
            }
        }

        self.set_state(BodyState::Terminated);
        info!(body_id = self.id, source = %self.source_key, "reader body stopped");
    }

    /// Moves newly attached pairs into the active set. Waits for one when
    /// nothing is attached. Returns false once the intake is closed.
    fn accept_pairs(&mut self) -> bool {
        if self.active.is_empty() {
            self.set_state(BodyState::Idle);
            match self.intake.recv() {
                Ok(pair) => self.attached(pair),
                Err(_) => return false,
            }
        }
        while let Ok(pair) = self.intake.try_recv() {
            self.attached(pair);
        }
        self.set_state(BodyState::Serving);
        true
    }

    fn attached(&mut self, pair: Arc<QueuePair>) {
        self.active.push(pair);
        debug!(body_id = self.id, pairs = self.active.len(), "queue pair attached");
    }

    /// Feeds one record to every active pair, in attach order.
    fn tick(&mut self) -> Result<()> {
        let mut i = 0;
        while i < self.active.len() {
            match self.read_one(i) {
                Ok(()) => i += 1,
                Err(ReaderError::Disconnected { .. }) => {
                    self.active.remove(i);
                    debug!(body_id = self.id, pairs = self.active.len(), "queue pair detached");
                }
                Err(e) if e.is_transient() => {
                    warn!(body_id = self.id, source = %self.source_key, error = %e, "skipping record");
                    i += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn read_one(&mut self, index: usize) -> Result<()> {
        let pair = &self.active[index];
        let mut buffer = pair.free().pop_live()?;

        match self.traversal.value() {
            Ok(value) => buffer.fill(&value),
            Err(e) => {
                pair.free().push(buffer)?;
                if e.is_transient() {
                    self.traversal.advance()?;
                }
                return Err(e);
            }
        }

        pair.full().push(buffer)?;
        self.traversal.advance()
    }

    fn set_state(&self, next: BodyState) {
        // Stopping only ever gives way to Terminated
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current == BodyState::Stopping as u8 && next != BodyState::Terminated {
                    None
                } else {
                    Some(next as u8)
                }
            });
    }
}
