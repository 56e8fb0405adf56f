//! Utilities used by the rest of the crate.

mod address;
pub use self::address::{Address, ByteSize, ObjectReference};

pub mod constants;
pub mod conversions;
pub mod logger;
pub mod metadata;
pub mod options;
pub mod rust_util;
/// Test utilities. Used by unit tests, integration tests and benchmarks.
pub mod test_util;
