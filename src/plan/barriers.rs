//! Write barriers.
//!
//! A barrier is owned by one [`crate::scheduler::Worker`]. Every pointer write a
//! worker performs into the heap goes through its barrier while the collector
//! has the barrier enabled.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::collector::Collector;
use crate::plan::barrier_state::WriteBarrierState;
use crate::plan::flush::{self, FlushOutcome};
use crate::plan::wbbuf::WriteBuffer;
use crate::util::constants::BYTES_IN_ADDRESS;
use crate::util::conversions::{is_address_aligned, raw_is_aligned};
use crate::util::rust_util::unlikely;
use crate::util::Address;
use crate::vm::{ObjectLookup, VMBinding};

use downcast_rs::Downcast;

/// A write barrier.
///
/// Slots passed to these methods must be valid, word aligned and only written
/// by this worker for the duration of the call. Bulk regions must be word
/// aligned and word sized.
pub trait Barrier<VM: VMBinding>: 'static + Send + Downcast {
    /// Flush any buffered entries to the mark work queue.
    fn flush(&mut self);

    /// Drop any buffered entries. The worker is exiting, and from now on
    /// every flush discards instead of marking.
    fn worker_exiting(&mut self);

    /// Whether [`Barrier::worker_exiting`] has been called.
    fn is_dying(&self) -> bool;

    /// Reset the write buffer, e.g. after the collector changed the eager flush
    /// conditions. Buffered entries must have been flushed.
    fn reset_write_buffer(&mut self) {}

    /// The barrier for writing `target` into `slot`. The caller does the
    /// store itself, after this returns.
    fn object_reference_write_pre(&mut self, slot: Address, target: Address);

    /// Write `target` into `slot` with the barrier.
    #[inline(always)]
    fn object_reference_write(&mut self, slot: Address, target: Address) {
        self.object_reference_write_pre(slot, target);
        unsafe { slot.atomic_store::<AtomicUsize>(target.as_usize(), Ordering::Release) };
    }

    /// The barrier for overwriting the `size` bytes at `dst` with the bytes at
    /// `src`, or with zeroes if `src` is `None`. The caller does the copy or
    /// the clear itself, after this returns.
    fn memory_region_copy_pre(&mut self, dst: Address, src: Option<Address>, size: usize);

    /// The barrier state the collector has published.
    fn barrier_state(&self) -> WriteBarrierState;
}

downcast_rs::impl_downcast!(Barrier<VM> where VM: VMBinding);

/// A barrier that does nothing.
#[derive(Default)]
pub struct NoBarrier {
    dying: bool,
}

impl<VM: VMBinding> Barrier<VM> for NoBarrier {
    fn flush(&mut self) {}
    fn worker_exiting(&mut self) {
        self.dying = true;
    }
    fn is_dying(&self) -> bool {
        self.dying
    }
    fn object_reference_write_pre(&mut self, _slot: Address, _target: Address) {}
    fn memory_region_copy_pre(&mut self, _dst: Address, _src: Option<Address>, _size: usize) {}
    fn barrier_state(&self) -> WriteBarrierState {
        WriteBarrierState::default()
    }
}

/// The hybrid barrier: a Yuasa-style deletion barrier combined with a
/// Dijkstra-style insertion barrier.
///
/// ```text
/// writePointer(slot, ptr):
///     shade(*slot)
///     shade(ptr)
///     *slot = ptr
/// ```
///
/// Shading the old value keeps every object that was reachable when marking
/// started reachable for the tracer, even if the only path to it is moved into
/// an unscanned worker stack. Shading the new value keeps an object from being
/// hidden in a black object while the only other reference to it lives in
/// a stack that has not been scanned yet. Together the two let workers run
/// without a barrier on stack writes and without rescanning stacks at the end
/// of marking.
///
/// Shades are not done here. Both values go into the worker's
/// [`WriteBuffer`] and are resolved in bulk when it fills up.
pub struct HybridBarrier<VM: VMBinding> {
    collector: &'static Collector<VM>,
    worker_id: usize,
    wbbuf: WriteBuffer,
    dying: bool,
}

impl<VM: VMBinding> HybridBarrier<VM> {
    pub fn new(collector: &'static Collector<VM>, worker_id: usize) -> Self {
        let state = collector.barrier_state().snapshot();
        let mut wbbuf = WriteBuffer::new(collector.options().effective_write_buffer_entries());
        wbbuf.reset(state.force_eager_flush(wbbuf.debug_gen()));
        Self {
            collector,
            worker_id,
            wbbuf,
            dying: false,
        }
    }

    pub fn write_buffer(&self) -> &WriteBuffer {
        &self.wbbuf
    }

    pub fn write_buffer_mut(&mut self) -> &mut WriteBuffer {
        &mut self.wbbuf
    }

    /// Flush the buffer. `cause` is the write whose barrier filled it, if any.
    #[cold]
    fn flush_with_cause(&mut self, cause: Option<(Address, Address)>) -> FlushOutcome {
        let state = self.collector.barrier_state().snapshot();
        flush::flush(
            self.collector,
            self.worker_id,
            &mut self.wbbuf,
            &state,
            self.dying,
            cause,
        )
    }

    #[inline(always)]
    fn enqueue(&mut self, old: Address, new: Address, cause: Option<(Address, Address)>) {
        if unlikely(!self.wbbuf.put_fast(old, new)) {
            self.flush_with_cause(cause);
        }
    }
}

impl<VM: VMBinding> Barrier<VM> for HybridBarrier<VM> {
    fn flush(&mut self) {
        self.flush_with_cause(None);
    }

    fn worker_exiting(&mut self) {
        self.dying = true;
        self.wbbuf.discard();
    }

    fn is_dying(&self) -> bool {
        self.dying
    }

    fn reset_write_buffer(&mut self) {
        debug_assert!(
            self.wbbuf.is_empty(),
            "write buffer reset with unflushed entries"
        );
        let state = self.collector.barrier_state().snapshot();
        self.wbbuf
            .reset(state.force_eager_flush(self.wbbuf.debug_gen()));
    }

    #[inline(always)]
    fn object_reference_write_pre(&mut self, slot: Address, target: Address) {
        if !self.collector.barrier_state().snapshot().enabled() {
            return;
        }
        // The old value may be overwritten by another worker between this load
        // and the caller's store. That worker's own barrier shades whatever it
        // overwrote, so no value is lost.
        let old = unsafe { Address::from_usize(slot.atomic_load::<AtomicUsize>(Ordering::Relaxed)) };
        self.enqueue(old, target, Some((slot, target)));
    }

    fn memory_region_copy_pre(&mut self, dst: Address, src: Option<Address>, size: usize) {
        if !is_address_aligned(dst)
            || !src.map_or(true, is_address_aligned)
            || !raw_is_aligned(size, BYTES_IN_ADDRESS)
        {
            crate::fatal_error!(
                "bulk barrier: unaligned arguments: dst={}, src={:?}, size={}",
                dst,
                src,
                size
            );
        }
        if !self.collector.barrier_state().snapshot().needed {
            return;
        }
        // Only heap memory is tracked. A region outside every span is a stack or
        // foreign memory, and the tracer finds those values by other means.
        let Some(span) = self.collector.object_lookup().span_of(dst) else {
            return;
        };
        let covered = Address::range_intersection(&(dst..dst + size), &span.range());
        let mut cursor = covered.start;
        while cursor < covered.end {
            let offset = cursor - dst;
            let old = unsafe { Address::from_usize(cursor.atomic_load::<AtomicUsize>(Ordering::Relaxed)) };
            let new = match src {
                Some(src) => unsafe {
                    Address::from_usize((src + offset).atomic_load::<AtomicUsize>(Ordering::Relaxed))
                },
                None => Address::ZERO,
            };
            self.enqueue(old, new, None);
            cursor += BYTES_IN_ADDRESS;
        }
    }

    fn barrier_state(&self) -> WriteBarrierState {
        self.collector.barrier_state().snapshot()
    }
}
