//! Typed memory operations.
//!
//! Copies and clears of whole values may overwrite many pointer slots at once.
//! Each of these runs the bulk barrier over the destination before touching it,
//! so every overwritten pointer and every copied pointer is shaded exactly as if
//! the words were written one at a time.

use crate::plan::barriers::Barrier;
use crate::util::constants::BYTES_IN_ADDRESS;
use crate::util::conversions::word_fragment;
use crate::util::Address;
use crate::vm::{ForeignPointerCheck, VMBinding};

/// What the barrier needs to know about the type of a value being moved.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeInfo {
    /// The size of a value in bytes.
    pub size: usize,
    /// Whether a value may contain heap pointers.
    pub has_pointers: bool,
}

impl TypeInfo {
    pub const fn new(size: usize, has_pointers: bool) -> Self {
        TypeInfo { size, has_pointers }
    }

    pub const fn with_pointers(size: usize) -> Self {
        Self::new(size, true)
    }

    pub const fn no_pointers(size: usize) -> Self {
        Self::new(size, false)
    }
}

/// A run of `len` consecutive elements starting at `start`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemorySlice {
    pub start: Address,
    pub len: usize,
}

impl MemorySlice {
    pub fn new(start: Address, len: usize) -> Self {
        MemorySlice { start, len }
    }
}

/// Move `size` bytes. The regions may overlap.
#[inline(always)]
unsafe fn memmove(dst: Address, src: Address, size: usize) {
    std::ptr::copy(src.to_ptr::<u8>(), dst.to_mut_ptr::<u8>(), size);
}

/// Copy a value of type `ty` from `src` to `dst`.
///
/// # Safety
/// Both addresses must be valid for `ty.size` bytes and word aligned.
pub unsafe fn typed_memmove<VM: VMBinding>(
    barrier: &mut dyn Barrier<VM>,
    ty: &TypeInfo,
    dst: Address,
    src: Address,
) {
    if dst == src {
        return;
    }
    if ty.has_pointers {
        barrier.memory_region_copy_pre(dst, Some(src), ty.size);
    }
    // A pointer in src may change between the barrier and the copy. That write
    // ran its own barrier, so at worst we shaded a value we did not copy.
    memmove(dst, src, ty.size);
    if barrier.barrier_state().cgo {
        <VM::VMForeignPointerCheck as ForeignPointerCheck>::check_memmove(ty, dst, src, 0, ty.size);
    }
}

/// Copy `size` bytes of a value of type `ty`, starting `off` bytes into it. The
/// bytes may start and end in the middle of a word, and only the whole words
/// in the range go through the barrier.
///
/// # Safety
/// `dst` and `src` must be valid for `size` bytes and point `off` bytes into
/// word-aligned values of `ty`.
pub unsafe fn typed_memmove_partial<VM: VMBinding>(
    barrier: &mut dyn Barrier<VM>,
    ty: &TypeInfo,
    dst: Address,
    src: Address,
    off: usize,
    size: usize,
) {
    if dst == src {
        return;
    }
    let state = barrier.barrier_state();
    if state.needed && ty.has_pointers && size >= BYTES_IN_ADDRESS {
        let frag = word_fragment(off);
        let (adst, asrc, asize) = if frag != 0 {
            (dst + frag, src + frag, size - frag)
        } else {
            (dst, src, size)
        };
        barrier.memory_region_copy_pre(adst, Some(asrc), asize & !(BYTES_IN_ADDRESS - 1));
    }
    memmove(dst, src, size);
    if state.cgo {
        <VM::VMForeignPointerCheck as ForeignPointerCheck>::check_memmove(ty, dst, src, off, size);
    }
}

/// Copy `min(dst.len, src.len)` elements of type `elem_ty` and return the number
/// of elements copied.
///
/// # Safety
/// Both slices must be valid for their lengths and word aligned.
pub unsafe fn typed_slice_copy<VM: VMBinding>(
    barrier: &mut dyn Barrier<VM>,
    elem_ty: &TypeInfo,
    dst: MemorySlice,
    src: MemorySlice,
) -> usize {
    let n = dst.len.min(src.len);
    if n == 0 {
        return 0;
    }
    let size = n * elem_ty.size;
    if !elem_ty.has_pointers {
        // Nothing to shade. Just move the bytes.
        memmove(dst.start, src.start, size);
        return n;
    }
    let state = barrier.barrier_state();
    if state.cgo {
        <VM::VMForeignPointerCheck as ForeignPointerCheck>::check_slice_copy(elem_ty, dst.start, src.start, n);
    }
    if dst.start == src.start {
        return n;
    }
    if state.needed {
        barrier.memory_region_copy_pre(dst.start, Some(src.start), size);
    }
    memmove(dst.start, src.start, size);
    n
}

/// Move a call's results from the callee's frame (`src`) to the caller's
/// result area (`dst`). `ty` describes the results and may be unknown, in
/// which case nothing is shaded.
///
/// # Safety
/// Both addresses must be valid for `size` bytes and word aligned.
pub unsafe fn call_result_move<VM: VMBinding>(
    barrier: &mut dyn Barrier<VM>,
    ty: Option<&TypeInfo>,
    dst: Address,
    src: Address,
    size: usize,
) {
    if barrier.barrier_state().needed
        && ty.is_some_and(|ty| ty.has_pointers)
        && size >= BYTES_IN_ADDRESS
    {
        barrier.memory_region_copy_pre(dst, Some(src), size);
    }
    memmove(dst, src, size);
}

/// Zero a value of type `ty` at `ptr`.
///
/// # Safety
/// `ptr` must be valid for `ty.size` bytes and word aligned.
pub unsafe fn typed_memclr<VM: VMBinding>(
    barrier: &mut dyn Barrier<VM>,
    ty: &TypeInfo,
    ptr: Address,
) {
    if ty.has_pointers {
        barrier.memory_region_copy_pre(ptr, None, ty.size);
    }
    memclr_no_heap_pointers(ptr, ty.size);
}

/// Zero `size` bytes of a value of type `ty`, starting `off` bytes into it.
/// Only the whole words in the range go through the barrier.
///
/// # Safety
/// `ptr` must be valid for `size` bytes and point `off` bytes into a
/// word-aligned value of `ty`.
pub unsafe fn typed_memclr_partial<VM: VMBinding>(
    barrier: &mut dyn Barrier<VM>,
    ty: &TypeInfo,
    ptr: Address,
    off: usize,
    size: usize,
) {
    if ty.has_pointers && size >= BYTES_IN_ADDRESS {
        let frag = word_fragment(off);
        barrier.memory_region_copy_pre(
            ptr + frag,
            None,
            (size - frag) & !(BYTES_IN_ADDRESS - 1),
        );
    }
    memclr_no_heap_pointers(ptr, size);
}

/// Zero `size` bytes at `ptr` that may hold heap pointers, e.g. when the
/// element type is not known statically.
///
/// # Safety
/// `ptr` must be valid for `size` bytes. Both must be word aligned.
pub unsafe fn memclr_has_pointers<VM: VMBinding>(
    barrier: &mut dyn Barrier<VM>,
    ptr: Address,
    size: usize,
) {
    barrier.memory_region_copy_pre(ptr, None, size);
    memclr_no_heap_pointers(ptr, size);
}

/// Zero `size` bytes at `ptr` without a barrier. The memory must not hold heap
/// pointers that the collector can still see.
///
/// # Safety
/// `ptr` must be valid for `size` bytes.
pub unsafe fn memclr_no_heap_pointers(ptr: Address, size: usize) {
    std::ptr::write_bytes(ptr.to_mut_ptr::<u8>(), 0, size);
}
