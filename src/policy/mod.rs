//! The heap as the barrier sees it: spans of equal-sized objects with a mark
//! bit per object.

pub mod span;
pub mod span_map;

pub use span::Span;
pub use span_map::SpanMap;
