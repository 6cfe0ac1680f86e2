// rust/reader-core/src/reader/queue.rs

//! Bounded queues and the free/full queue pair shared by a reader body and
//! one consumer.

use std::fmt;
use std::ops::Deref;
use std::time::Duration;

use crossbeam::channel::{bounded, select, Receiver, Sender, TryRecvError};

use crate::error::{ReaderError, Result};

/// Reusable byte container cycled between the two queues of a pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer {
    data: Vec<u8>,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents, reusing the existing allocation.
    pub fn fill(&mut self, bytes: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(bytes);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

/// Held by one side of a queue; dropping it tells the watchers it is gone.
pub struct LivenessGuard {
    _alive: Sender<()>,
}

/// Observes whether the matching [`LivenessGuard`] still exists.
#[derive(Clone)]
pub struct LivenessWatch {
    alive: Receiver<()>,
}

/// Creates a connected guard/watch pair.
pub fn liveness() -> (LivenessGuard, LivenessWatch) {
    // Nothing is ever sent; only disconnection matters.
    let (tx, rx) = bounded(0);
    (LivenessGuard { _alive: tx }, LivenessWatch { alive: rx })
}

impl LivenessWatch {
    pub fn is_alive(&self) -> bool {
        !matches!(self.alive.try_recv(), Err(TryRecvError::Disconnected))
    }
}

/// Bounded FIFO queue with blocking `push` and `pop`.
///
/// The queue watches the side that feeds it. Once that side is gone a
/// blocked `pop` returns whatever is still queued and then fails with
/// `Disconnected` instead of waiting forever.
pub struct BlockingQueue<T> {
    name: &'static str,
    capacity: usize,
    tx: Sender<T>,
    rx: Receiver<T>,
    peer: LivenessWatch,
}

impl<T> BlockingQueue<T> {
    pub fn new(name: &'static str, capacity: usize, peer: LivenessWatch) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            name,
            capacity,
            tx,
            rx,
            peer,
        }
    }

    /// Appends an item, blocking while the queue is full.
    pub fn push(&self, item: T) -> Result<()> {
        self.tx
            .send(item)
            .map_err(|_| ReaderError::disconnected(self.name))
    }

    /// Removes the oldest item, blocking while the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns `Disconnected` once the queue is empty and its peer is gone.
    pub fn pop(&self) -> Result<T> {
        if let Ok(item) = self.rx.try_recv() {
            return Ok(item);
        }
        select! {
            recv(self.rx) -> item => item.map_err(|_| ReaderError::disconnected(self.name)),
            recv(self.peer.alive) -> _ => self.drain_one(),
        }
    }

    /// Like [`pop`](Self::pop) but gives up after `timeout`, returning `None`.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Option<T>> {
        if let Ok(item) = self.rx.try_recv() {
            return Ok(Some(item));
        }
        select! {
            recv(self.rx) -> item => item
                .map(Some)
                .map_err(|_| ReaderError::disconnected(self.name)),
            recv(self.peer.alive) -> _ => self.drain_one().map(Some),
            default(timeout) => Ok(None),
        }
    }

    /// Like [`pop`](Self::pop) but never hands out leftovers: once the peer
    /// is gone it fails with `Disconnected`, even if items remain queued.
    pub fn pop_live(&self) -> Result<T> {
        if !self.peer.is_alive() {
            return Err(ReaderError::disconnected(self.name));
        }
        let item = self.pop()?;
        // The peer may have left while we were blocked
        if self.peer.is_alive() {
            Ok(item)
        } else {
            Err(ReaderError::disconnected(self.name))
        }
    }

    /// Removes the oldest item if there is one.
    pub fn try_pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    // Peer is gone; hand out leftovers, then report the disconnect.
    fn drain_one(&self) -> Result<T> {
        self.rx
            .try_recv()
            .map_err(|_| ReaderError::disconnected(self.name))
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the side feeding this queue still exists.
    pub fn peer_alive(&self) -> bool {
        self.peer.is_alive()
    }
}

impl<T> fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingQueue")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Double-buffering ring between one producer and one consumer.
///
/// `free` holds empty buffers for the producer, `full` holds filled buffers
/// for the consumer. The number of buffers is fixed at construction.
#[derive(Debug)]
pub struct QueuePair {
    free: BlockingQueue<Buffer>,
    full: BlockingQueue<Buffer>,
}

impl QueuePair {
    /// Creates a pair with `size` empty buffers waiting in `free`.
    ///
    /// `producer` watches whoever fills buffers. The returned guard stands
    /// for the consumer and must be kept for as long as it uses the pair.
    pub fn new(size: usize, producer: LivenessWatch) -> (Self, LivenessGuard) {
        let (consumer, consumer_watch) = liveness();
        let free = BlockingQueue::new("free", size, consumer_watch);
        let full = BlockingQueue::new("full", size, producer);

        for _ in 0..size {
            let seeded = free.tx.try_send(Buffer::new());
            debug_assert!(seeded.is_ok());
        }

        (Self { free, full }, consumer)
    }

    /// Empty buffers available to the producer.
    pub fn free(&self) -> &BlockingQueue<Buffer> {
        &self.free
    }

    /// Filled buffers available to the consumer.
    pub fn full(&self) -> &BlockingQueue<Buffer> {
        &self.full
    }

    /// Total number of buffers owned by this pair.
    pub fn size(&self) -> usize {
        self.free.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_pair_seeds_free() {
        let (_producer, watch) = liveness();
        let (pair, _consumer) = QueuePair::new(3, watch);

        assert_eq!(pair.size(), 3);
        assert_eq!(pair.free().len(), 3);
        assert!(pair.full().is_empty());
    }

    #[test]
    fn test_fifo_order() {
        let (_producer, watch) = liveness();
        let (pair, _consumer) = QueuePair::new(3, watch);

        for value in [b"v1", b"v2", b"v3"] {
            let mut buffer = pair.free().pop().unwrap();
            buffer.fill(value);
            pair.full().push(buffer).unwrap();
        }

        let out: Vec<Vec<u8>> = (0..3)
            .map(|_| pair.full().pop().unwrap().to_vec())
            .collect();
        assert_eq!(out, vec![b"v1".to_vec(), b"v2".to_vec(), b"v3".to_vec()]);
    }

    #[test]
    fn test_buffer_conservation() {
        let (_producer, watch) = liveness();
        let (pair, _consumer) = QueuePair::new(4, watch);
        let mut in_flight = Vec::new();

        let check = |held: usize| {
            assert_eq!(pair.free().len() + pair.full().len() + held, 4);
        };

        check(0);
        in_flight.push(pair.free().pop().unwrap());
        in_flight.push(pair.free().pop().unwrap());
        check(in_flight.len());

        pair.full().push(in_flight.pop().unwrap()).unwrap();
        check(in_flight.len());

        in_flight.push(pair.full().pop().unwrap());
        check(in_flight.len());

        for buffer in in_flight.drain(..) {
            pair.free().push(buffer).unwrap();
        }
        check(0);
        assert_eq!(pair.free().len(), 4);
    }

    #[test]
    fn test_buffer_fill_reuses_allocation() {
        let mut buffer = Buffer::new();
        buffer.fill(b"a much longer payload");
        let capacity = buffer.data.capacity();
        buffer.fill(b"short");
        assert_eq!(buffer.as_slice(), b"short");
        assert_eq!(buffer.data.capacity(), capacity);
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let (_producer, watch) = liveness();
        let queue = Arc::new(BlockingQueue::<u32>::new("full", 2, watch));

        let popper = {
            let queue = queue.clone();
            thread::spawn(move || queue.pop().unwrap())
        };
        thread::sleep(Duration::from_millis(20));
        queue.push(7).unwrap();

        assert_eq!(popper.join().unwrap(), 7);
    }

    #[test]
    fn test_push_blocks_while_full() {
        let (_producer, watch) = liveness();
        let queue = Arc::new(BlockingQueue::<u32>::new("free", 1, watch));
        queue.push(1).unwrap();

        let pusher = {
            let queue = queue.clone();
            thread::spawn(move || queue.push(2).unwrap())
        };
        thread::sleep(Duration::from_millis(20));
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.pop().unwrap(), 1);
        pusher.join().unwrap();
        assert_eq!(queue.pop().unwrap(), 2);
    }

    #[test]
    fn test_pop_timeout() {
        let (_producer, watch) = liveness();
        let queue = BlockingQueue::<u32>::new("full", 1, watch);

        assert_eq!(queue.pop_timeout(Duration::from_millis(10)).unwrap(), None);
        queue.push(5).unwrap();
        assert_eq!(queue.pop_timeout(Duration::from_millis(10)).unwrap(), Some(5));
    }

    #[test]
    fn test_pop_drains_then_disconnects_when_peer_gone() {
        let (producer, watch) = liveness();
        let queue = BlockingQueue::<u32>::new("full", 2, watch);
        queue.push(1).unwrap();
        queue.push(2).unwrap();

        drop(producer);
        assert!(!queue.peer_alive());

        assert_eq!(queue.pop().unwrap(), 1);
        assert_eq!(queue.pop().unwrap(), 2);
        let err = queue.pop().unwrap_err();
        assert!(matches!(err, ReaderError::Disconnected { queue: "full" }));
        assert!(queue.pop_timeout(Duration::from_millis(10)).is_err());
    }

    #[test]
    fn test_blocked_pop_wakes_on_disconnect() {
        let (producer, watch) = liveness();
        let queue = Arc::new(BlockingQueue::<u32>::new("full", 1, watch));

        let popper = {
            let queue = queue.clone();
            thread::spawn(move || queue.pop())
        };
        thread::sleep(Duration::from_millis(20));
        drop(producer);

        assert!(popper.join().unwrap().is_err());
    }

    #[test]
    fn test_pop_live_ignores_leftovers() {
        let (consumer, watch) = liveness();
        let queue = BlockingQueue::<u32>::new("free", 3, watch);
        queue.push(1).unwrap();
        assert_eq!(queue.pop_live().unwrap(), 1);

        queue.push(2).unwrap();
        queue.push(3).unwrap();
        drop(consumer);

        assert!(matches!(
            queue.pop_live(),
            Err(ReaderError::Disconnected { queue: "free" })
        ));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_blocked_pop_live_wakes_on_disconnect() {
        let (consumer, watch) = liveness();
        let queue = Arc::new(BlockingQueue::<u32>::new("free", 1, watch));

        let popper = {
            let queue = queue.clone();
            thread::spawn(move || queue.pop_live())
        };
        thread::sleep(Duration::from_millis(20));
        drop(consumer);

        assert!(popper.join().unwrap().is_err());
    }

    #[test]
    fn test_consumer_guard_disconnects_free() {
        let (_producer, watch) = liveness();
        let (pair, consumer) = QueuePair::new(1, watch);
        let held = pair.free().pop().unwrap();

        drop(consumer);
        assert!(!pair.free().peer_alive());
        assert!(pair.free().pop().is_err());
        drop(held);
    }
}
