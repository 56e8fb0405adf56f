use hybrid_barrier::memory_manager;
use hybrid_barrier::util::test_util::mock_vm::*;
use hybrid_barrier::util::Address;
use hybrid_barrier::{Collector, MemorySlice, TypeInfo, Worker};

const WORD: usize = std::mem::size_of::<usize>();
const VALUE: usize = 8 * WORD;

struct Setup {
    collector: &'static Collector<MockVM>,
    worker: Box<Worker<MockVM>>,
    /// Two pointer-holding values, `dst` and `src`.
    dst: Address,
    src: Address,
    targets: Address,
}

/// `dst` word i points to target i, `src` word i points to target 8 + i.
fn setup(needed: bool) -> Setup {
    let mut heap = MockHeap::new();
    let values = heap.add_span(VALUE, 2, false);
    let targets = heap.add_span(WORD * 2, 16, false);
    let collector = leaked_collector(heap, &[]);
    let dst = object(values, VALUE, 0);
    let src = object(values, VALUE, 1);
    for i in 0..8 {
        write_word(dst + i * WORD, object(targets, WORD * 2, i));
        write_word(src + i * WORD, object(targets, WORD * 2, 8 + i));
    }
    collector.barrier_state().set_needed(needed);
    let worker = memory_manager::bind_worker(collector);
    Setup {
        collector,
        worker,
        dst,
        src,
        targets,
    }
}

impl Setup {
    fn target(&self, i: usize) -> Address {
        object(self.targets, WORD * 2, i)
    }

    fn entries(&self) -> Vec<(Address, Address)> {
        self.worker.write_buffer().unwrap().entries().collect()
    }

    /// The entries a copy of words `range` from src to dst must produce.
    fn copy_entries(&self, range: std::ops::Range<usize>) -> Vec<(Address, Address)> {
        range.map(|i| (self.target(i), self.target(8 + i))).collect()
    }

    fn clear_entries(&self, range: std::ops::Range<usize>) -> Vec<(Address, Address)> {
        range.map(|i| (self.target(i), Address::ZERO)).collect()
    }

    fn dst_word(&self, i: usize) -> Address {
        read_word(self.dst + i * WORD)
    }
}

#[test]
fn memmove_covers_every_word() {
    let mut s = setup(true);
    unsafe {
        memory_manager::typed_memmove(&mut s.worker, &TypeInfo::with_pointers(VALUE), s.dst, s.src);
    }
    assert_eq!(s.entries(), s.copy_entries(0..8));
    for i in 0..8 {
        assert_eq!(s.dst_word(i), s.target(8 + i));
    }
}

#[test]
fn memmove_pointer_free_type_has_no_entries() {
    let mut s = setup(true);
    unsafe {
        memory_manager::typed_memmove(&mut s.worker, &TypeInfo::no_pointers(VALUE), s.dst, s.src);
    }
    assert!(s.entries().is_empty());
    assert_eq!(s.dst_word(3), s.target(11));
}

#[test]
fn memmove_same_address_is_a_no_op() {
    let mut s = setup(true);
    unsafe {
        memory_manager::typed_memmove(&mut s.worker, &TypeInfo::with_pointers(VALUE), s.dst, s.dst);
    }
    assert!(s.entries().is_empty());
}

#[test]
fn memmove_without_marking() {
    let mut s = setup(false);
    unsafe {
        memory_manager::typed_memmove(&mut s.worker, &TypeInfo::with_pointers(VALUE), s.dst, s.src);
    }
    assert!(s.entries().is_empty());
    assert_eq!(s.dst_word(0), s.target(8));
}

#[test]
fn partial_move_at_unaligned_offset() {
    let mut s = setup(true);
    let ty = TypeInfo::with_pointers(VALUE);
    // Bytes 3..43 of the value: whole words 1 to 4 and parts of words 0 and 5.
    let off: usize = 3;
    unsafe {
        memory_manager::typed_memmove_partial(
            &mut s.worker,
            &ty,
            s.dst + off,
            s.src + off,
            off,
            40,
        );
    }
    assert_eq!(s.entries(), s.copy_entries(1..5));
    for i in 1..5 {
        assert_eq!(s.dst_word(i), s.target(8 + i));
    }
    assert_eq!(s.dst_word(6), s.target(6));
}

#[test]
fn partial_move_at_aligned_offset() {
    let mut s = setup(true);
    let ty = TypeInfo::with_pointers(VALUE);
    let off = 2 * WORD;
    unsafe {
        memory_manager::typed_memmove_partial(&mut s.worker, &ty, s.dst + off, s.src + off, off, 3 * WORD);
    }
    assert_eq!(s.entries(), s.copy_entries(2..5));
}

#[test]
fn partial_move_smaller_than_a_word() {
    let mut s = setup(true);
    let ty = TypeInfo::with_pointers(VALUE);
    unsafe {
        memory_manager::typed_memmove_partial(&mut s.worker, &ty, s.dst + 1usize, s.src + 1usize, 1, 4);
    }
    assert!(s.entries().is_empty());
}

#[test]
fn slice_copy_copies_the_shorter_length() {
    let mut s = setup(true);
    let elem = TypeInfo::with_pointers(2 * WORD);
    let n = unsafe {
        memory_manager::typed_slice_copy(
            &mut s.worker,
            &elem,
            MemorySlice::new(s.dst, 3),
            MemorySlice::new(s.src, 2),
        )
    };
    assert_eq!(n, 2);
    assert_eq!(s.entries(), s.copy_entries(0..4));
    assert_eq!(s.dst_word(3), s.target(11));
    assert_eq!(s.dst_word(4), s.target(4));
}

#[test]
fn slice_copy_edge_cases() {
    let mut s = setup(true);
    let elem = TypeInfo::with_pointers(2 * WORD);
    unsafe {
        let empty = memory_manager::typed_slice_copy(
            &mut s.worker,
            &elem,
            MemorySlice::new(s.dst, 0),
            MemorySlice::new(s.src, 2),
        );
        assert_eq!(empty, 0);
        let same = memory_manager::typed_slice_copy(
            &mut s.worker,
            &elem,
            MemorySlice::new(s.dst, 2),
            MemorySlice::new(s.dst, 2),
        );
        assert_eq!(same, 2);
        let raw = memory_manager::typed_slice_copy(
            &mut s.worker,
            &TypeInfo::no_pointers(2 * WORD),
            MemorySlice::new(s.dst, 1),
            MemorySlice::new(s.src, 1),
        );
        assert_eq!(raw, 1);
    }
    assert!(s.entries().is_empty());
    assert_eq!(s.dst_word(0), s.target(8));
}

#[test]
fn call_results() {
    let mut s = setup(true);
    unsafe {
        memory_manager::call_result_move(&mut s.worker, None, s.dst, s.src, 2 * WORD);
    }
    assert!(s.entries().is_empty());
    assert_eq!(s.dst_word(1), s.target(9));

    let ty = TypeInfo::with_pointers(4 * WORD);
    unsafe {
        memory_manager::call_result_move(&mut s.worker, Some(&ty), s.dst + 2 * WORD, s.src + 2 * WORD, 2 * WORD);
    }
    assert_eq!(s.entries(), s.copy_entries(2..4));
}

#[test]
fn clears() {
    let mut s = setup(true);
    let ty = TypeInfo::with_pointers(VALUE);
    unsafe {
        memory_manager::typed_memclr_partial(&mut s.worker, &ty, s.dst + 5usize, 5, 2 * WORD);
    }
    // Bytes 5..21: only word 1 is whole.
    assert_eq!(s.entries(), s.clear_entries(1..2));
    assert!(s.dst_word(1).is_zero());
    assert_eq!(s.dst_word(3), s.target(3));

    memory_manager::flush_write_buffer(&mut s.worker);
    unsafe {
        memory_manager::memclr_has_pointers(&mut s.worker, s.dst + 4 * WORD, 2 * WORD);
    }
    assert_eq!(s.entries(), s.clear_entries(4..6));

    memory_manager::flush_write_buffer(&mut s.worker);
    unsafe {
        memory_manager::typed_memclr(&mut s.worker, &ty, s.src);
    }
    let expected: Vec<_> = (0..8).map(|i| (s.target(8 + i), Address::ZERO)).collect();
    assert_eq!(s.entries(), expected);
    assert!(read_word(s.src + 7 * WORD).is_zero());

    memory_manager::flush_write_buffer(&mut s.worker);
    unsafe {
        memory_manager::typed_memclr(&mut s.worker, &TypeInfo::no_pointers(VALUE), s.dst);
    }
    assert!(s.entries().is_empty());
    assert!(s.dst_word(7).is_zero());
}

#[test]
fn memory_outside_the_heap_is_not_shaded() {
    let mut s = setup(true);
    let mut local = [0usize; 8];
    let local_addr = Address::from_mut_ptr(local.as_mut_ptr());
    unsafe {
        memory_manager::typed_memmove(&mut s.worker, &TypeInfo::with_pointers(VALUE), local_addr, s.src);
    }
    assert!(s.entries().is_empty());
    assert_eq!(local[2], s.target(10).as_usize());
}

#[test]
fn flushed_bulk_entries_are_greyed() {
    let mut s = setup(true);
    unsafe {
        memory_manager::typed_memmove(&mut s.worker, &TypeInfo::with_pointers(VALUE), s.dst, s.src);
    }
    memory_manager::flush_write_buffer(&mut s.worker);
    assert_eq!(s.collector.mark_queue().enqueued_count(), 16);
}

#[test]
#[should_panic(expected = "unaligned arguments")]
fn unaligned_bulk_region_is_fatal() {
    let mut s = setup(true);
    unsafe {
        memory_manager::typed_memmove(&mut s.worker, &TypeInfo::with_pointers(WORD + 4), s.dst, s.src);
    }
}

#[test]
#[should_panic(expected = "unaligned arguments")]
fn unaligned_bulk_source_is_fatal() {
    use hybrid_barrier::plan::Barrier;
    let mut s = setup(true);
    s.worker
        .barrier()
        .memory_region_copy_pre(s.dst, Some(s.src + 4usize), 2 * WORD);
}

#[test]
fn foreign_checks_on_typed_copies() {
    let mut s = setup(false);
    s.collector.barrier_state().set_cgo(true);
    MockForeignPointerCheck::take();
    let ty = TypeInfo::with_pointers(VALUE);
    let elem = TypeInfo::with_pointers(2 * WORD);
    unsafe {
        memory_manager::typed_memmove(&mut s.worker, &ty, s.dst, s.src);
        memory_manager::typed_memmove_partial(&mut s.worker, &ty, s.dst + WORD, s.src + WORD, WORD, WORD);
        memory_manager::typed_slice_copy(
            &mut s.worker,
            &elem,
            MemorySlice::new(s.dst, 4),
            MemorySlice::new(s.src, 4),
        );
    }
    assert_eq!(
        MockForeignPointerCheck::take(),
        vec![
            ForeignCheck::Memmove {
                dst: s.dst,
                src: s.src,
                off: 0,
                size: VALUE
            },
            ForeignCheck::Memmove {
                dst: s.dst + WORD,
                src: s.src + WORD,
                off: WORD,
                size: WORD
            },
            ForeignCheck::SliceCopy {
                dst: s.dst,
                src: s.src,
                n: 4
            },
        ]
    );
    // Foreign checks alone do not shade anything.
    assert!(s.entries().is_empty());
}
