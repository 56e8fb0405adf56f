mod raw {
    // The generated file defines PKG_VERSION, FEATURES_STR, PROFILE and more.
    // See https://docs.rs/built/latest/built/index.html
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// The crate version, such as 0.1.0
pub const PKG_VERSION: &str = raw::PKG_VERSION;

/// Comma separated features enabled for this build
pub const FEATURES: &str = raw::FEATURES_STR;

/// `release` or `debug`
pub const PROFILE: &str = raw::PROFILE;

lazy_static! {
    /// A one-line description of this build, logged when a collector is created.
    pub static ref BUILD_DESCRIPTION: String = format!(
        "hybrid-barrier {} ({}, features: [{}])",
        PKG_VERSION, PROFILE, FEATURES
    );
}
