use std::ops::Range;

use crate::util::metadata::MarkBitmap;
use crate::util::{Address, ObjectReference};

/// A contiguous run of memory holding `nelems` objects of `elem_size` bytes
/// each, with one mark bit per object.
///
/// Spans belong to the allocator. The write barrier only reads their shape
/// and flips their mark bits.
pub struct Span {
    start: Address,
    elem_size: usize,
    nelems: usize,
    /// Objects in this span contain no pointers, so they never need scanning.
    noscan: bool,
    mark_bits: MarkBitmap,
}

impl Span {
    pub fn new(start: Address, elem_size: usize, nelems: usize, noscan: bool) -> Self {
        assert!(elem_size > 0, "span element size must be non-zero");
        assert!(!start.is_zero(), "span cannot start at address zero");
        Span {
            start,
            elem_size,
            nelems,
            noscan,
            mark_bits: MarkBitmap::new(nelems),
        }
    }

    pub fn start(&self) -> Address {
        self.start
    }

    /// One past the last byte of the last element.
    pub fn limit(&self) -> Address {
        self.start + self.elem_size * self.nelems
    }

    pub fn range(&self) -> Range<Address> {
        self.start..self.limit()
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.start <= addr && addr < self.limit()
    }

    pub fn element_size(&self) -> usize {
        self.elem_size
    }

    pub fn num_elements(&self) -> usize {
        self.nelems
    }

    pub fn is_noscan(&self) -> bool {
        self.noscan
    }

    pub fn mark_bits(&self) -> &MarkBitmap {
        &self.mark_bits
    }

    /// The index of the element containing `addr`. `addr` may point anywhere
    /// inside the element.
    pub fn object_index(&self, addr: Address) -> usize {
        debug_assert!(self.contains(addr));
        (addr - self.start) / self.elem_size
    }

    /// The base address of the element at `index`.
    pub fn object_base(&self, index: usize) -> ObjectReference {
        debug_assert!(index < self.nelems);
        ObjectReference::from_raw_address(self.start + index * self.elem_size)
    }

    pub fn is_marked(&self, index: usize) -> bool {
        self.mark_bits.is_marked(index)
    }

    /// Atomically mark the element at `index`. Returns `true` if this call marked it.
    pub fn test_and_set_mark(&self, index: usize) -> bool {
        self.mark_bits.test_and_set(index)
    }

    /// Clear all mark bits, preparing the span for a new cycle.
    pub fn reset_marks(&self) {
        self.mark_bits.clear();
    }
}

impl std::fmt::Debug for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Span({}..{}, elem_size={}, noscan={})",
            self.start,
            self.limit(),
            self.elem_size,
            self.noscan
        )
    }
}
