use crate::collector::Collector;
use crate::plan::barriers::{Barrier, HybridBarrier, NoBarrier};
use crate::plan::wbbuf::WriteBuffer;
use crate::util::options::BarrierSelector;
use crate::vm::VMBinding;

/// An execution context that writes pointers into the heap.
///
/// A worker is used by one thread at a time. It owns its barrier, and through
/// it the write buffer, so nothing else may append to or flush that buffer.
pub struct Worker<VM: VMBinding> {
    id: usize,
    collector: &'static Collector<VM>,
    pub barrier: Box<dyn Barrier<VM>>,
}

impl<VM: VMBinding> Worker<VM> {
    pub(crate) fn new(id: usize, collector: &'static Collector<VM>) -> Self {
        let barrier: Box<dyn Barrier<VM>> = match collector.options().barrier {
            BarrierSelector::NoBarrier => Box::new(NoBarrier::default()),
            BarrierSelector::HybridBarrier => Box::new(HybridBarrier::new(collector, id)),
        };
        Worker {
            id,
            collector,
            barrier,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn collector(&self) -> &'static Collector<VM> {
        self.collector
    }

    pub fn barrier(&mut self) -> &mut dyn Barrier<VM> {
        &mut *self.barrier
    }

    /// Whether the worker has started to exit.
    pub fn is_dying(&self) -> bool {
        self.barrier.is_dying()
    }

    /// Mark the worker as exiting. Its buffered entries are dropped, and every
    /// later flush discards instead of marking.
    pub(crate) fn begin_exit(&mut self) {
        debug!("Worker {} is exiting", self.id);
        self.barrier.worker_exiting();
    }

    /// The write buffer, if the worker uses the hybrid barrier.
    pub fn write_buffer(&self) -> Option<&WriteBuffer> {
        self.barrier
            .downcast_ref::<HybridBarrier<VM>>()
            .map(|b| b.write_buffer())
    }

    /// Mutable access to the write buffer, e.g. to set its debug generation.
    pub fn write_buffer_mut(&mut self) -> Option<&mut WriteBuffer> {
        self.barrier
            .downcast_mut::<HybridBarrier<VM>>()
            .map(|b| b.write_buffer_mut())
    }
}

impl<VM: VMBinding> std::fmt::Debug for Worker<VM> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("dying", &self.is_dying())
            .field("write_buffer", &self.write_buffer())
            .finish()
    }
}
