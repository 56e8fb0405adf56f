use crate::build_info;
use crate::plan::barrier_state::GlobalBarrierState;
use crate::util::options::Options;
use crate::vm::VMBinding;

use std::sync::atomic::{AtomicUsize, Ordering};

/// Builds a [`Collector`]. Options can be set on the builder until
/// [`CollectorBuilder::build`] is called. Options are read from the environment
/// when the builder is created, and explicitly set options override them.
pub struct CollectorBuilder {
    pub options: Options,
}

impl CollectorBuilder {
    pub fn new() -> Self {
        CollectorBuilder {
            options: Options::default(),
        }
    }

    /// A builder that ignores environment variables.
    pub fn new_no_env_vars() -> Self {
        CollectorBuilder {
            options: Options::new(),
        }
    }

    /// Set an option by its name. Returns `false` and keeps the previous value
    /// if the name is unknown or the value is invalid.
    pub fn set_option(&mut self, name: &str, val: &str) -> bool {
        self.options.set_from_str(name, val)
    }

    pub fn build<VM: VMBinding>(
        self,
        lookup: VM::VMObjectLookup,
        mark_queue: VM::VMMarkQueue,
    ) -> Collector<VM> {
        Collector::new(self.options, lookup, mark_queue)
    }
}

impl Default for CollectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The state the write barrier shares with the rest of the collector: the
/// published barrier flags, the heap's object lookup and the mark work queue.
///
/// Workers hold a `&'static Collector`, so a runtime usually leaks the one
/// collector it creates.
pub struct Collector<VM: VMBinding> {
    options: Options,
    state: GlobalBarrierState,
    lookup: VM::VMObjectLookup,
    mark_queue: VM::VMMarkQueue,
    next_worker_id: AtomicUsize,
}

impl<VM: VMBinding> Collector<VM> {
    pub fn new(options: Options, lookup: VM::VMObjectLookup, mark_queue: VM::VMMarkQueue) -> Self {
        info!("Initialized {}", *build_info::BUILD_DESCRIPTION);
        debug!("Collector options: {:?}", options);
        Collector {
            options,
            state: GlobalBarrierState::new(),
            lookup,
            mark_queue,
            next_worker_id: AtomicUsize::new(0),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The barrier flags. The collector controller changes these when it
    /// moves between phases.
    pub fn barrier_state(&self) -> &GlobalBarrierState {
        &self.state
    }

    pub fn object_lookup(&self) -> &VM::VMObjectLookup {
        &self.lookup
    }

    pub fn mark_queue(&self) -> &VM::VMMarkQueue {
        &self.mark_queue
    }

    pub(crate) fn next_worker_id(&self) -> usize {
        self.next_worker_id.fetch_add(1, Ordering::Relaxed)
    }
}
