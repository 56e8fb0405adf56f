//! A binding backed by real memory, for tests and benchmarks.
//!
//! [`MockHeap`] allocates word-aligned memory for each span, so barriers can
//! load and store real slots, and the flush resolves real addresses.

use crate::collector::{Collector, CollectorBuilder};
use crate::plan::tracing::SharedMarkQueue;
use crate::plan::typed_memory::TypeInfo;
use crate::policy::span::Span;
use crate::policy::span_map::SpanMap;
use crate::util::constants::BYTES_IN_WORD;
use crate::util::{Address, ObjectReference};
use crate::vm::{ForeignPointerCheck, ObjectLookup, Scheduling, VMBinding};

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct MockVM;

impl VMBinding for MockVM {
    type VMObjectLookup = MockHeap;
    type VMMarkQueue = SharedMarkQueue;
    type VMScheduling = MockScheduling;
    type VMForeignPointerCheck = MockForeignPointerCheck;
}

/// Spans of objects in memory owned by the heap.
#[derive(Default)]
pub struct MockHeap {
    spans: SpanMap,
    // Backs the spans. Never read directly.
    _memory: Vec<Box<[AtomicUsize]>>,
}

impl MockHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a span of `nelems` zeroed objects of `elem_size` bytes, and
    /// return its start address.
    pub fn add_span(&mut self, elem_size: usize, nelems: usize, noscan: bool) -> Address {
        assert!(elem_size % BYTES_IN_WORD == 0);
        let words = elem_size / BYTES_IN_WORD * nelems;
        let memory: Box<[AtomicUsize]> = (0..words).map(|_| AtomicUsize::new(0)).collect();
        let start = Address::from_ptr(memory.as_ptr());
        self.spans.insert(Span::new(start, elem_size, nelems, noscan));
        self._memory.push(memory);
        start
    }

    pub fn span_map(&self) -> &SpanMap {
        &self.spans
    }
}

impl ObjectLookup for MockHeap {
    fn span_of(&self, addr: Address) -> Option<&Span> {
        self.spans.span_of(addr)
    }
}

/// The address of the `index`th object of the span starting at `start`.
pub fn object(start: Address, elem_size: usize, index: usize) -> Address {
    start + elem_size * index
}

pub fn object_ref(addr: Address) -> ObjectReference {
    ObjectReference::from_raw_address(addr)
}

/// Read the word at `addr` the way a concurrent reader would.
pub fn read_word(addr: Address) -> Address {
    unsafe { Address::from_usize(addr.atomic_load::<AtomicUsize>(Ordering::Acquire)) }
}

/// Store `val` at `addr` without any barrier.
pub fn write_word(addr: Address, val: Address) {
    unsafe { addr.atomic_store::<AtomicUsize>(val.as_usize(), Ordering::Release) }
}

/// Build a collector over `heap` that ignores environment variables, and leak
/// it. `options` are (name, value) pairs.
pub fn leaked_collector(heap: MockHeap, options: &[(&str, &str)]) -> &'static Collector<MockVM> {
    let mut builder = CollectorBuilder::new_no_env_vars();
    for (name, val) in options {
        assert!(builder.set_option(name, val), "bad option {}={}", name, val);
    }
    Box::leak(Box::new(builder.build::<MockVM>(heap, SharedMarkQueue::new())))
}

thread_local! {
    static NON_PREEMPTIBLE_SECTIONS: Cell<usize> = const { Cell::new(0) };
    static FOREIGN_CHECKS: RefCell<Vec<ForeignCheck>> = const { RefCell::new(Vec::new()) };
}

pub struct MockScheduling;

impl MockScheduling {
    /// The number of non-preemptible sections entered on this thread.
    pub fn sections_entered() -> usize {
        NON_PREEMPTIBLE_SECTIONS.with(|c| c.get())
    }
}

impl Scheduling for MockScheduling {
    fn run_non_preemptible<R, F: FnOnce() -> R>(f: F) -> R {
        NON_PREEMPTIBLE_SECTIONS.with(|c| c.set(c.get() + 1));
        f()
    }
}

/// A foreign pointer check that ran.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForeignCheck {
    WriteBarrier {
        slot: Address,
        new: Address,
    },
    Memmove {
        dst: Address,
        src: Address,
        off: usize,
        size: usize,
    },
    SliceCopy {
        dst: Address,
        src: Address,
        n: usize,
    },
}

/// Records every check on the calling thread.
pub struct MockForeignPointerCheck;

impl MockForeignPointerCheck {
    /// Take the checks recorded on this thread so far.
    pub fn take() -> Vec<ForeignCheck> {
        FOREIGN_CHECKS.with(|c| std::mem::take(&mut *c.borrow_mut()))
    }

    fn record(check: ForeignCheck) {
        FOREIGN_CHECKS.with(|c| c.borrow_mut().push(check));
    }
}

impl ForeignPointerCheck for MockForeignPointerCheck {
    fn check_write_barrier(slot: Address, new: Address) {
        Self::record(ForeignCheck::WriteBarrier { slot, new });
    }

    fn check_memmove(_ty: &TypeInfo, dst: Address, src: Address, off: usize, size: usize) {
        Self::record(ForeignCheck::Memmove {
            dst,
            src,
            off,
            size,
        });
    }

    fn check_slice_copy(_elem_ty: &TypeInfo, dst: Address, src: Address, n: usize) {
        Self::record(ForeignCheck::SliceCopy { dst, src, n });
    }
}
