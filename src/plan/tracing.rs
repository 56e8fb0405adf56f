//! The interface between the write buffer flush and the mark phase.

use crate::util::ObjectReference;
use crossbeam::deque::{Injector, Steal};
use std::sync::atomic::{AtomicUsize, Ordering};

/// The queue of grey objects waiting to be scanned by the tracer.
///
/// Implementations are shared by all workers, so both methods must be safe to
/// call from several flushing workers at once.
pub trait MarkWorkQueue: 'static + Send + Sync {
    /// Publish a batch of newly marked objects for scanning.
    fn enqueue_batch(&self, objects: &[ObjectReference]);

    /// Publish one newly marked object.
    fn enqueue(&self, object: ObjectReference) {
        self.enqueue_batch(&[object]);
    }

    /// Account `bytes` of marked objects that will never be scanned because
    /// they hold no pointers.
    fn account_noscan_bytes(&self, bytes: usize);
}

/// A lock-free global mark queue.
pub struct SharedMarkQueue {
    queue: Injector<ObjectReference>,
    enqueued: AtomicUsize,
    noscan_bytes: AtomicUsize,
}

impl SharedMarkQueue {
    pub fn new() -> Self {
        SharedMarkQueue {
            queue: Injector::new(),
            enqueued: AtomicUsize::new(0),
            noscan_bytes: AtomicUsize::new(0),
        }
    }

    /// Take one grey object, or `None` if the queue is empty.
    pub fn pop(&self) -> Option<ObjectReference> {
        loop {
            match self.queue.steal() {
                Steal::Success(object) => return Some(object),
                Steal::Empty => return None,
                Steal::Retry => {}
            }
        }
    }

    /// Take every grey object currently queued.
    pub fn drain(&self) -> Vec<ObjectReference> {
        std::iter::from_fn(|| self.pop()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The number of objects ever enqueued.
    pub fn enqueued_count(&self) -> usize {
        self.enqueued.load(Ordering::SeqCst)
    }

    /// The bytes of no-scan objects marked so far.
    pub fn noscan_bytes(&self) -> usize {
        self.noscan_bytes.load(Ordering::SeqCst)
    }
}

impl Default for SharedMarkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkWorkQueue for SharedMarkQueue {
    fn enqueue_batch(&self, objects: &[ObjectReference]) {
        for object in objects {
            debug_assert!(!object.is_null());
            self.queue.push(*object);
        }
        self.enqueued.fetch_add(objects.len(), Ordering::SeqCst);
    }

    fn account_noscan_bytes(&self, bytes: usize) {
        self.noscan_bytes.fetch_add(bytes, Ordering::SeqCst);
    }
}
