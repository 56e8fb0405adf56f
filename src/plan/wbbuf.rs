//! The write barrier buffer.
//!
//! Every barrier appends the old and the new value of the written slot to the
//! buffer of the worker that performed the write. The buffer is flushed to the
//! mark work queue when it fills up (see [`crate::plan::flush`]), so the cost of
//! resolving addresses and touching the shared queue is paid once per buffer
//! instead of once per write.
//!
//! This is closely related to a sequential store buffer, except that an SSB is
//! usually used to maintain a remembered set, while this is used for marking.

use crate::util::constants::WRITE_BUFFER_ENTRY_POINTERS;
use crate::util::rust_util::unlikely;
use crate::util::Address;

/// The cursor value while a flush owns the buffer contents. Any append in that
/// window indexes out of bounds instead of silently overwriting entries that
/// are being processed.
const POISONED: usize = usize::MAX >> 1;

/// A fixed-capacity buffer of (old, new) address pairs, owned by one worker.
///
/// `next` and `end` are indices into `buf`, counted in pointers. `end - next`
/// is always a multiple of [`WRITE_BUFFER_ENTRY_POINTERS`] because the fast path
/// only checks for overflow once per entry.
pub struct WriteBuffer {
    /// The next free slot in `buf`.
    next: usize,
    /// One past the last slot that may be written before a flush is due.
    end: usize,
    /// The entries. Holds `entries * WRITE_BUFFER_ENTRY_POINTERS` pointers.
    buf: Box<[usize]>,
    /// A buffer whose generation matches the collector's debug pause
    /// generation flushes on every barrier.
    debug_gen: u32,
}

impl WriteBuffer {
    /// Create an empty buffer that holds `entries` barriers between flushes.
    pub fn new(entries: usize) -> Self {
        assert!(entries > 0, "a write buffer needs at least one entry");
        let Some(pointers) = entries.checked_mul(WRITE_BUFFER_ENTRY_POINTERS) else {
            crate::fatal_error!("write buffer of {} entries is too large", entries);
        };
        let mut buf = WriteBuffer {
            next: 0,
            end: 0,
            buf: vec![0usize; pointers].into_boxed_slice(),
            debug_gen: 0,
        };
        buf.reset(false);
        buf
    }

    /// Empty the buffer. With `force_eager_flush`, the buffer reports full after
    /// a single entry, so every barrier flushes. This is needed while foreign
    /// pointer checks are on, because those must see each write as it happens.
    pub fn reset(&mut self, force_eager_flush: bool) {
        self.next = 0;
        let end = if force_eager_flush {
            // Effectively disable the buffer by forcing a flush on every barrier.
            WRITE_BUFFER_ENTRY_POINTERS
        } else {
            self.buf.len()
        };
        self.set_limit(end);
    }

    /// Set the end of the writable region and check the bounds invariant.
    pub(crate) fn set_limit(&mut self, end: usize) {
        self.end = end;
        self.check_bounds();
    }

    /// A violated bound means a barrier could have written past the end of
    /// the buffer, or an entry could have been half written.
    #[inline]
    pub(crate) fn check_bounds(&self) {
        if self.end > self.buf.len()
            || self.next > self.end
            || (self.end - self.next) % WRITE_BUFFER_ENTRY_POINTERS != 0
        {
            crate::fatal_error!(
                "bad write barrier buffer bounds: next={}, end={}, len={}",
                self.next,
                self.end,
                self.buf.len()
            );
        }
    }

    /// Drop the buffered entries without flushing them. Only for a worker that
    /// is going away: the shaded values it abandons will not be marked by it.
    pub fn discard(&mut self) {
        self.next = 0;
    }

    /// Whether the buffer holds no entries. Like [`WriteBuffer::len`], this
    /// reports a buffer that a flush currently owns as empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add `old` and `new` to the buffer and return `false` if a flush is
    /// necessary. Callers should use this as:
    ///
    /// ```ignore
    /// if !buf.put_fast(old, new) {
    ///     flush(...);
    /// }
    /// // ... actual memory write ...
    /// ```
    ///
    /// The caller must hold the worker that owns this buffer for the whole
    /// sequence, and must not let the collector change phase between the
    /// append and the memory write, or the write may escape the barrier.
    #[inline(always)]
    pub fn put_fast(&mut self, old: Address, new: Address) -> bool {
        let next = self.next;
        self.buf[next] = old.as_usize();
        self.buf[next + 1] = new.as_usize();
        self.next = next + WRITE_BUFFER_ENTRY_POINTERS;
        #[cfg(feature = "extreme_assertions")]
        self.check_bounds();
        !unlikely(self.next == self.end)
    }

    /// The number of buffered entries.
    pub fn len(&self) -> usize {
        if self.next == POISONED {
            return 0;
        }
        self.next / WRITE_BUFFER_ENTRY_POINTERS
    }

    /// The number of entries the buffer holds before it reports full.
    pub fn capacity(&self) -> usize {
        self.end / WRITE_BUFFER_ENTRY_POINTERS
    }

    /// The number of entries the backing storage holds.
    pub fn max_capacity(&self) -> usize {
        self.buf.len() / WRITE_BUFFER_ENTRY_POINTERS
    }

    /// The buffered (old, new) pairs, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = (Address, Address)> + '_ {
        self.buf[..self.len() * WRITE_BUFFER_ENTRY_POINTERS]
            .chunks_exact(WRITE_BUFFER_ENTRY_POINTERS)
            .map(|e| unsafe { (Address::from_usize(e[0]), Address::from_usize(e[1])) })
    }

    pub fn debug_gen(&self) -> u32 {
        self.debug_gen
    }

    pub fn set_debug_gen(&mut self, gen: u32) {
        self.debug_gen = gen;
    }

    /// Hand the buffered pointers to the flush and poison the cursor. The flush
    /// may reuse the returned storage as scratch space. It must end with
    /// [`WriteBuffer::reset`].
    pub(crate) fn begin_flush(&mut self) -> &mut [usize] {
        let n = self.next;
        debug_assert_ne!(n, POISONED, "write buffer flushed re-entrantly");
        self.next = POISONED;
        &mut self.buf[..n]
    }
}

impl std::fmt::Debug for WriteBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("WriteBuffer")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("debug_gen", &self.debug_gen)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(raw: usize) -> Address {
        unsafe { Address::from_usize(raw) }
    }

    #[test]
    fn fills_up_at_capacity() {
        let mut buf = WriteBuffer::new(4);
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 4);
        for i in 0..3 {
            assert!(buf.put_fast(addr(i), addr(i + 100)));
            buf.check_bounds();
        }
        assert!(!buf.put_fast(addr(3), addr(103)));
        buf.check_bounds();
        assert_eq!(buf.len(), 4);
        let entries: Vec<_> = buf.entries().collect();
        assert_eq!(entries[0], (addr(0), addr(100)));
        assert_eq!(entries[3], (addr(3), addr(103)));
    }

    #[test]
    fn eager_mode_flushes_every_entry() {
        let mut buf = WriteBuffer::new(8);
        buf.reset(true);
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.max_capacity(), 8);
        assert!(!buf.put_fast(addr(0x1000), addr(0x2000)));
        buf.reset(false);
        assert_eq!(buf.capacity(), 8);
        assert!(buf.is_empty());
    }

    #[test]
    fn discard_keeps_limit() {
        let mut buf = WriteBuffer::new(4);
        buf.reset(true);
        buf.put_fast(addr(1), addr(2));
        buf.discard();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 1);
    }

    #[test]
    fn bounds_hold_after_reset() {
        for entries in 1..10 {
            let mut buf = WriteBuffer::new(entries);
            for eager in [false, true] {
                buf.reset(eager);
                assert_eq!(
                    (buf.end - buf.next) % WRITE_BUFFER_ENTRY_POINTERS,
                    0
                );
            }
        }
    }

    #[test]
    #[should_panic(expected = "bad write barrier buffer bounds")]
    fn misaligned_limit_is_fatal() {
        let mut buf = WriteBuffer::new(4);
        buf.set_limit(WRITE_BUFFER_ENTRY_POINTERS * 2 + 1);
    }

    #[test]
    fn flushing_buffer_reports_empty() {
        let mut buf = WriteBuffer::new(4);
        buf.put_fast(addr(1), addr(2));
        buf.put_fast(addr(3), addr(4));
        assert_eq!(buf.begin_flush().len(), 2 * WRITE_BUFFER_ENTRY_POINTERS);
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.entries().count(), 0);
        buf.reset(false);
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
    }

    #[test]
    #[should_panic(expected = "too large")]
    fn oversized_buffer_is_fatal() {
        WriteBuffer::new(usize::MAX / WRITE_BUFFER_ENTRY_POINTERS + 1);
    }

    #[test]
    #[should_panic]
    fn append_while_flushing_is_caught() {
        let mut buf = WriteBuffer::new(4);
        buf.put_fast(addr(1), addr(2));
        let _ = buf.begin_flush();
        buf.put_fast(addr(3), addr(4));
    }
}
