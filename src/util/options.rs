use crate::util::constants::DEFAULT_WRITE_BUFFER_ENTRIES;
use crate::util::constants::SMALL_WRITE_BUFFER_ENTRIES;
use crate::util::constants::WRITE_BUFFER_ENTRY_POINTERS;
use std::default::Default;
use strum_macros::EnumString;

/// The write barrier a worker binds to.
#[derive(Copy, Clone, EnumString, Debug, PartialEq, Eq)]
pub enum BarrierSelector {
    /// No barrier at all. Only correct for collectors that never trace
    /// concurrently with mutators.
    NoBarrier,
    /// The buffered hybrid (deletion + insertion) barrier.
    HybridBarrier,
}

fn always_valid<T>(_: &T) -> bool {
    true
}

/// The environment variable prefix for options, such as `HYBRID_BARRIER_WRITE_BUFFER_ENTRIES`.
pub const ENV_PREFIX: &str = "HYBRID_BARRIER_";

macro_rules! options {
    ($($(#[$outer:meta])* $name:ident: $type:ty[$validator:expr] = $default:expr),*,) => [
        options!($($(#[$outer])* $name: $type[$validator] = $default),*);
    ];
    ($($(#[$outer:meta])* $name:ident: $type:ty[$validator:expr] = $default:expr),*) => [
        /// Options for the write barrier. Each option can be set from a string
        /// with [`Options::set_from_str`], or from an environment variable
        /// whose name is the option name in upper case with the prefix [`ENV_PREFIX`].
        #[derive(Clone, Debug)]
        pub struct Options {
            $($(#[$outer])* pub $name: $type),*
        }
        impl Options {
            /// Set an option by its name. Returns `true` if the option exists,
            /// the value parses and the value passes validation. Otherwise the
            /// current value is kept.
            pub fn set_from_str(&mut self, s: &str, val: &str) -> bool {
                match s {
                    // Parse the given value from str (by env vars or by calling process()) to the right type
                    $(stringify!($name) => if let Ok(ref val) = val.parse::<$type>() {
                        // Validate
                        let validate_fn = $validator;
                        let is_valid = validate_fn(val);
                        if is_valid {
                            // Only set value if valid.
                            self.$name = val.clone();
                        } else {
                            warn!("Unable to set {}={:?}. Invalid value. Default value will be used.", s, val);
                        }
                        is_valid
                    } else {
                        warn!("Unable to set {}={:?}. Can't parse value. Default value will be used.", s, val);
                        false
                    })*
                    _ => {
                        warn!("Unknown option {}={:?}. Ignored.", s, val);
                        false
                    }
                }
            }

            /// Options with their default values, without reading the environment.
            pub fn new() -> Self {
                Options {
                    $($name: $default),*
                }
            }

            /// Read every environment variable that starts with [`ENV_PREFIX`] and
            /// matches an option name, and set the option if its value is valid.
            pub fn read_env_var_settings(&mut self) {
                for (key, val) in std::env::vars() {
                    // strip the prefix, and get the lower case string
                    if let Some(rest_of_key) = key.strip_prefix(ENV_PREFIX) {
                        let lowercase: &str = &rest_of_key.to_lowercase();
                        match lowercase {
                            $(stringify!($name) => { self.set_from_str(lowercase, &val); },)*
                            _ => {}
                        }
                    }
                }
            }
        }
        impl Default for Options {
            fn default() -> Self {
                let mut options = Self::new();
                options.read_env_var_settings();
                options
            }
        }
    ]
}

options! {
    /// Which barrier the workers use.
    barrier:               BarrierSelector [always_valid] = BarrierSelector::HybridBarrier,
    /// The number of (old, new) entries a write buffer holds before it is flushed.
    /// Two entries is the least that lets a buffered entry survive past one more barrier.
    write_buffer_entries:  usize           [|v: &usize| *v >= SMALL_WRITE_BUFFER_ENTRIES && v.checked_mul(WRITE_BUFFER_ENTRY_POINTERS).is_some()] = DEFAULT_WRITE_BUFFER_ENTRIES,
    /// Shrink every write buffer to two entries to stress the flush path.
    small_write_buffer:    bool            [always_valid] = false,
}

impl Options {
    /// The number of entries a buffer holds when it is not in eager flush mode.
    pub fn effective_write_buffer_entries(&self) -> usize {
        if self.small_write_buffer {
            SMALL_WRITE_BUFFER_ENTRIES
        } else {
            self.write_buffer_entries
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let options = Options::new();
        assert_eq!(options.barrier, BarrierSelector::HybridBarrier);
        assert_eq!(options.write_buffer_entries, DEFAULT_WRITE_BUFFER_ENTRIES);
        assert!(!options.small_write_buffer);
    }

    #[test]
    fn set_valid_values() {
        let mut options = Options::new();
        assert!(options.set_from_str("write_buffer_entries", "64"));
        assert_eq!(options.write_buffer_entries, 64);
        assert!(options.set_from_str("barrier", "NoBarrier"));
        assert_eq!(options.barrier, BarrierSelector::NoBarrier);
        assert!(options.set_from_str("small_write_buffer", "true"));
        assert_eq!(
            options.effective_write_buffer_entries(),
            SMALL_WRITE_BUFFER_ENTRIES
        );
    }

    #[test]
    fn reject_invalid_values() {
        let mut options = Options::new();
        assert!(!options.set_from_str("write_buffer_entries", "1"));
        assert!(!options.set_from_str("write_buffer_entries", "many"));
        assert!(!options.set_from_str(
            "write_buffer_entries",
            &(usize::MAX / WRITE_BUFFER_ENTRY_POINTERS + 1).to_string()
        ));
        assert!(!options.set_from_str("barrier", "CardMarking"));
        assert!(!options.set_from_str("no_such_option", "1"));
        assert_eq!(options.write_buffer_entries, DEFAULT_WRITE_BUFFER_ENTRIES);
        assert_eq!(options.barrier, BarrierSelector::HybridBarrier);
    }

    #[test]
    fn env_var_settings() {
        crate::util::test_util::serial_test(|| {
            crate::util::test_util::with_cleanup(
                || {
                    std::env::set_var("HYBRID_BARRIER_WRITE_BUFFER_ENTRIES", "32");
                    let options = Options::default();
                    assert_eq!(options.write_buffer_entries, 32);
                },
                || std::env::remove_var("HYBRID_BARRIER_WRITE_BUFFER_ENTRIES"),
            )
        })
    }
}
