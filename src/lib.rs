//! Pre-build hook that probes the cross-compiler with `--version` and writes
//! the parsed version to `include/compiler_version.h` as preprocessor macros.

pub mod config;
pub mod extractor;
pub mod header;
pub mod probe;
pub mod report;
pub mod version;

/// Build identifier baked in at compile time by `build.rs`.
/// Format: `build-<7-char-commit-hash>`, or `dev` outside a git checkout.
pub const BUILD: &str = env!("CCVERSION_BUILD");
