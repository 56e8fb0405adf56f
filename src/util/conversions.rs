use crate::util::constants::*;
use crate::util::Address;

/* Alignment */

pub fn is_address_aligned(addr: Address) -> bool {
    addr.is_aligned_to(BYTES_IN_ADDRESS)
}

pub const fn raw_is_aligned(val: usize, align: usize) -> bool {
    val & align.wrapping_sub(1) == 0
}

/// The number of bytes from `off` to the next word boundary. This is zero if
/// `off` is already word aligned.
pub const fn word_fragment(off: usize) -> usize {
    off.wrapping_neg() & (BYTES_IN_WORD - 1)
}
