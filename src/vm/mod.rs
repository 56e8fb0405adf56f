//! The seams between the write barrier and the rest of the runtime.
//!
//! The barrier does not own the heap, the scheduler or the mark work queue. A
//! runtime plugs them in by implementing [`VMBinding`]: the object lookup over
//! its span metadata, the queue that receives grey objects, the way it runs a
//! block of code without being preempted, and the foreign-pointer checks.

use crate::plan::tracing::MarkWorkQueue;
use crate::plan::typed_memory::TypeInfo;
use crate::policy::span::Span;
use crate::util::{Address, ObjectReference};

/// A raw address resolved to the object that contains it.
#[derive(Copy, Clone, Debug)]
pub struct HeapObject<'a> {
    /// The base address of the object.
    pub object: ObjectReference,
    /// The span the object lives in.
    pub span: &'a Span,
    /// The index of the object's mark bit in the span.
    pub index: usize,
}

/// Resolve raw addresses to heap objects.
pub trait ObjectLookup: 'static + Send + Sync {
    /// The live span containing `addr`, if any.
    fn span_of(&self, addr: Address) -> Option<&Span>;

    /// Resolve `addr`, which may point into the middle of an object, to the
    /// object containing it. Returns `None` for addresses outside every live span.
    fn find_object(&self, addr: Address) -> Option<HeapObject<'_>> {
        let span = self.span_of(addr)?;
        let index = span.object_index(addr);
        Some(HeapObject {
            object: span.object_base(index),
            span,
            index,
        })
    }
}

/// Scheduler facilities used by the flush.
pub trait Scheduling {
    /// Run `f` so that the current execution context cannot be preempted or
    /// moved to another worker while it runs, and so that nothing scans the
    /// context's own frames as typed data meanwhile.
    ///
    /// The default runs `f` directly, which is correct for runtimes whose
    /// workers are plain OS threads pinned to their `Worker`.
    fn run_non_preemptible<R, F: FnOnce() -> R>(f: F) -> R {
        f()
    }
}

/// Checks that a runtime with foreign (non-GC) memory runs on pointer writes
/// while foreign pointer checking is enabled. Implementations report a
/// violation by panicking, which is how the rest of the runtime reports misuse.
pub trait ForeignPointerCheck {
    /// Check the write of `new` into `slot`. Called on the flush path of the
    /// write that filled the buffer, before any marking.
    fn check_write_barrier(_slot: Address, _new: Address) {}

    /// Check a typed move of `size` bytes at offset `off` into a value of `ty`.
    fn check_memmove(_ty: &TypeInfo, _dst: Address, _src: Address, _off: usize, _size: usize) {}

    /// Check a typed copy of `n` elements of `elem_ty`.
    fn check_slice_copy(_elem_ty: &TypeInfo, _dst: Address, _src: Address, _n: usize) {}
}

/// The type that a runtime implements to bind the write barrier to itself.
pub trait VMBinding: 'static + Sized + Send + Sync {
    type VMObjectLookup: ObjectLookup;
    type VMMarkQueue: MarkWorkQueue;
    type VMScheduling: Scheduling;
    type VMForeignPointerCheck: ForeignPointerCheck;
}
