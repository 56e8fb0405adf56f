//! Workers: the execution contexts that own write buffers.

mod worker;
pub use worker::Worker;
