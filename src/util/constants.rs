/// log2 of the number of bits in a byte
pub const LOG_BITS_IN_BYTE: u8 = 3;

#[cfg(target_pointer_width = "32")]
/// log2 of the number of bytes in an address
pub const LOG_BYTES_IN_ADDRESS: u8 = 2;
#[cfg(target_pointer_width = "64")]
/// log2 of the number of bytes in an address
pub const LOG_BYTES_IN_ADDRESS: u8 = 3;
/// The number of bytes in an address
pub const BYTES_IN_ADDRESS: usize = 1 << LOG_BYTES_IN_ADDRESS;
/// log2 of the number of bits in an address
pub const LOG_BITS_IN_ADDRESS: usize = LOG_BITS_IN_BYTE as usize + LOG_BYTES_IN_ADDRESS as usize;
/// The number of bits in an address
pub const BITS_IN_ADDRESS: usize = 1 << LOG_BITS_IN_ADDRESS;

/// log2 of the number of bytes in a word
pub const LOG_BYTES_IN_WORD: u8 = LOG_BYTES_IN_ADDRESS;
/// The number of bytes in a word
pub const BYTES_IN_WORD: usize = 1 << LOG_BYTES_IN_WORD;

/// log2 of the number of bytes in a page
pub const LOG_BYTES_IN_PAGE: u8 = 12;
/// The number of bytes in a page
pub const BYTES_IN_PAGE: usize = 1 << LOG_BYTES_IN_PAGE;

/// The smallest address that can be a heap pointer. Anything below it (null and
/// small integers that happen to sit in a pointer slot) is dropped by the
/// write buffer flush without a lookup. The first page is never mapped.
pub const MIN_LEGAL_POINTER: usize = BYTES_IN_PAGE;

/// The number of addresses each write barrier adds to the write buffer: the
/// old value of the slot and the new value.
pub const WRITE_BUFFER_ENTRY_POINTERS: usize = 2;

/// The default number of write barriers between flushes of the write buffer.
///
/// This trades latency for throughput amortization. Higher values amortize
/// flushing overhead more, but delay the point where the tracer sees the
/// shaded objects. Higher values also increase the cache footprint of the buffer.
pub const DEFAULT_WRITE_BUFFER_ENTRIES: usize = 256;

/// The number of entries the buffer holds in the small buffer stress mode. It
/// has to be more than one, otherwise a barrier on non-heap pointers could
/// never stay buffered and be combined with a later flush.
pub const SMALL_WRITE_BUFFER_ENTRIES: usize = 2;
