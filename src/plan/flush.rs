//! Flushing the write buffer: turning buffered raw addresses into grey objects.
//!
//! Every path out of a flush must reset or discard the buffer, otherwise the
//! next barrier would write past its end.

use crate::collector::Collector;
use crate::plan::barrier_state::WriteBarrierState;
use crate::plan::tracing::MarkWorkQueue;
use crate::plan::wbbuf::WriteBuffer;
use crate::util::constants::MIN_LEGAL_POINTER;
use crate::util::{Address, ObjectReference};
use crate::vm::{ForeignPointerCheck, HeapObject, ObjectLookup, Scheduling, VMBinding};

use probe::probe;
use static_assertions::const_assert_eq;

// Greyed objects are written back into the buffer's own storage and handed to
// the mark queue from there.
const_assert_eq!(
    std::mem::size_of::<ObjectReference>(),
    std::mem::size_of::<usize>()
);
const_assert_eq!(
    std::mem::align_of::<ObjectReference>(),
    std::mem::align_of::<usize>()
);

/// What a flush did with the buffered entries.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// The number of buffered addresses (two per entry).
    pub pointers: usize,
    /// Objects enqueued for scanning.
    pub greyed: usize,
    /// No-scan objects marked and accounted without scanning.
    pub noscan_marked: usize,
    /// The entries were dropped without marking.
    pub discarded: bool,
}

impl FlushOutcome {
    fn discarded() -> Self {
        FlushOutcome {
            discarded: true,
            ..Default::default()
        }
    }
}

/// Flush the write buffer of a worker to the mark work queue.
///
/// `cause` is the (slot, new value) of the write whose barrier filled the
/// buffer, if the flush comes from a single pointer write. Foreign pointer
/// checks need it. Flushes from bulk barriers or from a forced flush pass `None`.
///
/// The caller must hold the worker exclusively: no barrier may append to `buf`
/// until this returns.
pub fn flush<VM: VMBinding>(
    collector: &Collector<VM>,
    worker_id: usize,
    buf: &mut WriteBuffer,
    state: &WriteBarrierState,
    dying: bool,
    cause: Option<(Address, Address)>,
) -> FlushOutcome {
    if dying {
        // The worker is going away. There is no point in marking for it, and
        // this keeps barriers usable on the exit path.
        debug!(
            "Worker {} is exiting: discarding {} write buffer entries",
            worker_id,
            buf.len()
        );
        probe!(hybrid_barrier, wbbuf_discard, worker_id, buf.len());
        buf.discard();
        return FlushOutcome::discarded();
    }

    if state.cgo {
        if let Some((slot, new)) = cause {
            // This must run in the context that did the write, before the
            // non-preemptible section.
            <VM::VMForeignPointerCheck as ForeignPointerCheck>::check_write_barrier(slot, new);
            if !state.needed {
                // We were only called for the foreign pointer check.
                buf.discard();
                return FlushOutcome::discarded();
            }
        }
    }

    let outcome = <VM::VMScheduling as Scheduling>::run_non_preemptible(|| {
        grey_buffered(collector.object_lookup(), collector.mark_queue(), buf, state)
    });

    probe!(
        hybrid_barrier,
        wbbuf_flush,
        worker_id,
        outcome.pointers,
        outcome.greyed
    );
    trace!(
        "Worker {} flushed write buffer: {} pointers, {} greyed, {} no-scan",
        worker_id,
        outcome.pointers,
        outcome.greyed,
        outcome.noscan_marked
    );
    outcome
}

/// Mark the objects named by the buffered addresses and enqueue the ones that
/// need scanning, then reset the buffer.
///
/// This must not run barriers, since it is part of the barrier, and must not
/// be preempted, since it uses the worker's buffer.
pub fn grey_buffered<L: ObjectLookup, Q: MarkWorkQueue>(
    lookup: &L,
    queue: &Q,
    buf: &mut WriteBuffer,
    state: &WriteBarrierState,
) -> FlushOutcome {
    let force_eager_flush = state.force_eager_flush(buf.debug_gen());
    // Poison the cursor while we work on the buffered pointers.
    let ptrs = buf.begin_flush();
    let mut outcome = FlushOutcome {
        pointers: ptrs.len(),
        ..Default::default()
    };

    if state.checkmark {
        // Slow path for checkmark mode: shade each address on its own.
        for ptr in ptrs.iter() {
            if let Some(found) = lookup.find_object(unsafe { Address::from_usize(*ptr) }) {
                shade(found, queue, &mut outcome);
            }
        }
        buf.reset(force_eager_flush);
        return outcome;
    }

    // Mark all of the pointers in the buffer and record only the pointers we
    // greyed. The buffer itself holds the greyed pointers.
    let mut pos = 0;
    let mut noscan_bytes = 0;
    for i in 0..ptrs.len() {
        let ptr = ptrs[i];
        if ptr < MIN_LEGAL_POINTER {
            // Null pointers are very common, especially for the old values.
            // Filter out these and other obvious non-heap pointers early.
            continue;
        }
        let Some(found) = lookup.find_object(unsafe { Address::from_usize(ptr) }) else {
            continue;
        };
        if !found.span.test_and_set_mark(found.index) {
            // Someone else marked it first, in this flush or another.
            continue;
        }
        if found.span.is_noscan() {
            noscan_bytes += found.span.element_size();
            outcome.noscan_marked += 1;
            continue;
        }
        ptrs[pos] = found.object.value();
        pos += 1;
    }

    if noscan_bytes != 0 {
        queue.account_noscan_bytes(noscan_bytes);
    }
    if pos != 0 {
        // SAFETY: ObjectReference is a transparent wrapper of usize (checked
        // above), and ptrs[..pos] only holds object base addresses.
        let greyed = unsafe {
            std::slice::from_raw_parts(ptrs.as_ptr() as *const ObjectReference, pos)
        };
        queue.enqueue_batch(greyed);
    }
    outcome.greyed = pos;

    buf.reset(force_eager_flush);
    outcome
}

/// Grey one object without the batch filters. Checkmark mode uses this, so the
/// object is enqueued even if it is already marked.
fn shade<Q: MarkWorkQueue>(found: HeapObject<'_>, queue: &Q, outcome: &mut FlushOutcome) {
    found.span.test_and_set_mark(found.index);
    if found.span.is_noscan() {
        queue.account_noscan_bytes(found.span.element_size());
        outcome.noscan_marked += 1;
    } else {
        queue.enqueue(found.object);
        outcome.greyed += 1;
    }
}
