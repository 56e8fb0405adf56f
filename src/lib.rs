#![cfg_attr(feature = "nightly", feature(core_intrinsics))]

//! A buffered hybrid write barrier for concurrent mark-sweep collectors.
//!
//! While the collector marks concurrently with running code, every heap pointer
//! write records both the value it overwrites and the value it stores. The
//! records go into a small per-worker [write buffer](plan::wbbuf::WriteBuffer).
//! When the buffer fills up, its addresses are resolved to heap objects,
//! marked at most once, and handed to the mark work queue in one batch (see
//! [`plan::flush`]). Typed copies and clears run the same barrier over every
//! word they overwrite (see [`plan::typed_memory`]).
//!
//! A runtime plugs in its heap metadata, its mark work queue and its scheduler
//! by implementing [`vm::VMBinding`], and calls into the barrier through
//! [`memory_manager`].

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod build_info;
mod collector;
pub use collector::{Collector, CollectorBuilder};

pub mod memory_manager;
pub mod plan;
pub mod policy;
pub mod scheduler;
pub mod util;
pub mod vm;

pub use crate::plan::barrier_state::WriteBarrierState;
pub use crate::plan::typed_memory::{MemorySlice, TypeInfo};
pub use crate::scheduler::Worker;
