//! Per-object metadata kept outside the objects.

pub mod mark_bit;
pub use mark_bit::MarkBitmap;
