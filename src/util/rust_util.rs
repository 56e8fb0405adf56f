//! Small helpers for things the Rust language and its standard library do not provide on stable.

#[cfg(feature = "nightly")]
pub use core::intrinsics::unlikely;

// unlikely() compiler hint in stable Rust
// [1]: https://github.com/rust-lang/hashbrown/blob/a41bd76de0a53838725b997c6085e024c47a0455/src/raw/mod.rs#L48-L70
// [2]: https://users.rust-lang.org/t/compiler-hint-for-unlikely-likely-for-if-branches/62102/3
#[cfg(not(feature = "nightly"))]
#[cold]
fn cold() {}

#[cfg(not(feature = "nightly"))]
#[inline(always)]
pub fn unlikely(b: bool) -> bool {
    if b {
        cold();
    }
    b
}

/// Report a broken collector invariant and stop. Buffer bounds that are not a
/// multiple of the entry width, or mark state that cannot exist, mean live
/// objects may already have been missed, so there is nothing safe to continue with.
/// Embedders that need the process to terminate build with `panic = "abort"`.
#[macro_export]
macro_rules! fatal_error {
    ($($arg:tt)+) => {{
        log::error!($($arg)+);
        panic!($($arg)+)
    }};
}
