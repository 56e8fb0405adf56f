//! Runtime-to-barrier interface.
//!
//! A runtime creates one [`Collector`] with [`collector_init`], binds a
//! [`Worker`] for every execution context that writes heap pointers, and routes
//! every heap pointer write and every typed copy or clear through the functions
//! here. The collector controller turns the barrier on and off through
//! [`Collector::barrier_state`].
//!
//! For example, a runtime usually does:
//!
//! ```ignore
//! let builder = CollectorBuilder::new();
//! let collector: &'static Collector<MyVM> =
//!     Box::leak(memory_manager::collector_init(builder, heap, queue));
//! let mut worker = memory_manager::bind_worker(collector);
//! memory_manager::object_reference_write(&mut worker, slot, target);
//! ```

use crate::collector::{Collector, CollectorBuilder};
use crate::plan::typed_memory::{self, MemorySlice, TypeInfo};
use crate::scheduler::Worker;
use crate::util::Address;
use crate::vm::VMBinding;

pub use crate::plan::typed_memory::memclr_no_heap_pointers;

/// Create a collector from a builder.
///
/// This attempts to initialize the built-in logger. A runtime that wants its own
/// logger should set it up before calling this.
pub fn collector_init<VM: VMBinding>(
    builder: CollectorBuilder,
    lookup: VM::VMObjectLookup,
    mark_queue: VM::VMMarkQueue,
) -> Box<Collector<VM>> {
    match crate::util::logger::try_init() {
        Ok(_) => debug!("Initialized the logger."),
        Err(_) => debug!("Failed to initialize the logger. Possibly a logger has been initialized by user."),
    }
    Box::new(builder.build::<VM>(lookup, mark_queue))
}

/// Create a worker with a fresh write buffer. Every execution context that
/// writes heap pointers needs its own.
pub fn bind_worker<VM: VMBinding>(collector: &'static Collector<VM>) -> Box<Worker<VM>> {
    let worker = Box::new(Worker::new(collector.next_worker_id(), collector));
    debug!("Bound {:?}", worker);
    worker
}

/// The worker is exiting. Buffered entries are dropped, and barriers on the
/// worker keep working but discard instead of marking. The runtime calls this
/// first thing on its exit path, before any write that would flush.
pub fn begin_worker_exit<VM: VMBinding>(worker: &mut Worker<VM>) {
    worker.begin_exit();
}

/// Destroy a worker. Buffered entries are flushed first, unless the worker is
/// already exiting.
pub fn destroy_worker<VM: VMBinding>(mut worker: Box<Worker<VM>>) {
    if !worker.is_dying() {
        worker.barrier.flush();
    }
    debug!("Destroyed {:?}", worker);
}

/// Write `target` into the heap slot at `slot`, with the barrier.
///
/// `slot` must be a valid, word-aligned heap location.
#[inline(always)]
pub fn object_reference_write<VM: VMBinding>(worker: &mut Worker<VM>, slot: Address, target: Address) {
    worker.barrier.object_reference_write(slot, target);
}

/// Run only the barrier for writing `target` into `slot`. The runtime does the
/// store itself afterwards, with no collector phase change in between.
#[inline(always)]
pub fn object_reference_write_pre<VM: VMBinding>(
    worker: &mut Worker<VM>,
    slot: Address,
    target: Address,
) {
    worker.barrier.object_reference_write_pre(slot, target);
}

/// Flush the worker's buffered entries to the mark work queue, e.g. before the
/// collector checks whether marking has terminated.
pub fn flush_write_buffer<VM: VMBinding>(worker: &mut Worker<VM>) {
    worker.barrier.flush();
}

/// Reset the worker's write buffer after the collector changed the conditions
/// for eager flushing. The buffer must be empty.
pub fn reset_write_buffer<VM: VMBinding>(worker: &mut Worker<VM>) {
    worker.barrier.reset_write_buffer();
}

/// Copy a value of type `ty`. See [`typed_memory::typed_memmove`].
///
/// # Safety
/// Both addresses must be valid for `ty.size` bytes and word aligned.
pub unsafe fn typed_memmove<VM: VMBinding>(
    worker: &mut Worker<VM>,
    ty: &TypeInfo,
    dst: Address,
    src: Address,
) {
    typed_memory::typed_memmove(worker.barrier(), ty, dst, src)
}

/// Copy part of a value of type `ty`. See [`typed_memory::typed_memmove_partial`].
///
/// # Safety
/// `dst` and `src` must be valid for `size` bytes and point `off` bytes into
/// word-aligned values of `ty`.
pub unsafe fn typed_memmove_partial<VM: VMBinding>(
    worker: &mut Worker<VM>,
    ty: &TypeInfo,
    dst: Address,
    src: Address,
    off: usize,
    size: usize,
) {
    typed_memory::typed_memmove_partial(worker.barrier(), ty, dst, src, off, size)
}

/// Copy elements between two slices. See [`typed_memory::typed_slice_copy`].
///
/// # Safety
/// Both slices must be valid for their lengths and word aligned.
pub unsafe fn typed_slice_copy<VM: VMBinding>(
    worker: &mut Worker<VM>,
    elem_ty: &TypeInfo,
    dst: MemorySlice,
    src: MemorySlice,
) -> usize {
    typed_memory::typed_slice_copy(worker.barrier(), elem_ty, dst, src)
}

/// Move call results. See [`typed_memory::call_result_move`].
///
/// # Safety
/// Both addresses must be valid for `size` bytes and word aligned.
pub unsafe fn call_result_move<VM: VMBinding>(
    worker: &mut Worker<VM>,
    ty: Option<&TypeInfo>,
    dst: Address,
    src: Address,
    size: usize,
) {
    typed_memory::call_result_move(worker.barrier(), ty, dst, src, size)
}

/// Zero a value of type `ty`.
///
/// # Safety
/// `ptr` must be valid for `ty.size` bytes and word aligned.
pub unsafe fn typed_memclr<VM: VMBinding>(worker: &mut Worker<VM>, ty: &TypeInfo, ptr: Address) {
    typed_memory::typed_memclr(worker.barrier(), ty, ptr)
}

/// Zero part of a value of type `ty`.
///
/// # Safety
/// `ptr` must be valid for `size` bytes and point `off` bytes into a
/// word-aligned value of `ty`.
pub unsafe fn typed_memclr_partial<VM: VMBinding>(
    worker: &mut Worker<VM>,
    ty: &TypeInfo,
    ptr: Address,
    off: usize,
    size: usize,
) {
    typed_memory::typed_memclr_partial(worker.barrier(), ty, ptr, off, size)
}

/// Zero memory that may hold heap pointers.
///
/// # Safety
/// `ptr` must be valid for `size` bytes. Both must be word aligned.
pub unsafe fn memclr_has_pointers<VM: VMBinding>(worker: &mut Worker<VM>, ptr: Address, size: usize) {
    typed_memory::memclr_has_pointers(worker.barrier(), ptr, size)
}
