//! Progress and diagnostic output for the hook.
//!
//! Both verbosity levels log the same decision points. `Verbose` adds banners,
//! per-field prints and an echo of the generated header.

use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::config::{BuildContext, ProbeConfig};
use crate::extractor::ExtractError;
use crate::header::Written;
use crate::probe::{self, ProbeOutput};
use crate::version::Version;

const BANNER_WIDTH: usize = 70;
const VERBOSE_PREVIEW: usize = 300;
const QUIET_PREVIEW: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Verbose,
}

impl Verbosity {
    pub fn from_flag(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Quiet
        }
    }

    pub fn is_verbose(self) -> bool {
        self == Verbosity::Verbose
    }
}

/// First `max` characters of `text`, never splitting a character.
pub fn preview(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    verbosity: Verbosity,
}

impl Reporter {
    pub fn new(verbosity: Verbosity) -> Self {
        Reporter { verbosity }
    }

    fn banner(&self, message: &str) {
        if !self.verbosity.is_verbose() {
            return;
        }
        let rule = "=".repeat(BANNER_WIDTH);
        info!("{rule}");
        info!("  {message}");
        info!("{rule}");
    }

    pub fn started(&self) {
        self.banner("COMPILER VERSION EXTRACTION STARTED");
    }

    pub fn finished(&self) {
        self.banner("COMPILER VERSION EXTRACTION FINISHED");
    }

    pub fn probing(&self, ctx: &BuildContext, cfg: &ProbeConfig) {
        info!("Compiler path: {}", ctx.compiler_command);
        if self.verbosity.is_verbose() {
            info!("ccversion {} ({})", env!("CARGO_PKG_VERSION"), crate::BUILD);
            if let Ok(cwd) = std::env::current_dir() {
                info!("Working directory: {}", cwd.display());
            }
            info!(
                "Running: {} (timeout {}s{})",
                probe::display_command(&ctx.compiler_command),
                cfg.timeout_secs,
                if cfg.shell { ", via shell" } else { "" }
            );
        }
    }

    pub fn probe_output(&self, output: &ProbeOutput) {
        let combined = output.combined();
        if self.verbosity.is_verbose() {
            match output.code {
                Some(code) => debug!("Return code: {code}"),
                None => debug!("Return code: none (terminated by signal)"),
            }
            debug!("Output length: {} characters", combined.chars().count());
            debug!("First {VERBOSE_PREVIEW} chars of output:");
            debug!("        {}", preview(&combined, VERBOSE_PREVIEW));
        } else {
            info!("Compiler output: {}", preview(&combined, QUIET_PREVIEW));
        }
    }

    pub fn version_found(&self, version: &Version) {
        info!("Extracted version: {version}");
        if self.verbosity.is_verbose() {
            debug!(
                "          Major={}, Minor={}, Patch={}",
                version.major, version.minor, version.patch
            );
        }
    }

    pub fn header_written(&self, ctx: &BuildContext, written: &Written, contents: &str) {
        let include_dir = written.path.parent().unwrap_or(Path::new(""));
        if written.created_include_dir {
            info!("Created include directory: {}", include_dir.display());
        } else if self.verbosity.is_verbose() {
            info!("Include directory exists: {}", include_dir.display());
        }

        if self.verbosity.is_verbose() {
            info!("Project directory: {}", ctx.project_root.display());
            info!("Header file created successfully!");
            info!("          Path: {}", written.path.display());
            info!("          Size: {} bytes", written.bytes);
            info!("Header file contents:");
            for (i, line) in contents.lines().enumerate() {
                info!("        {:2}: {}", i + 1, line);
            }
        } else {
            info!("Header file created: {}", written.path.display());
        }
    }

    pub fn failed(&self, err: &ExtractError) {
        match err {
            ExtractError::ParseFailure { output } => {
                warn!("Could not parse compiler version from output");
                if self.verbosity.is_verbose() {
                    debug!("Full output:\n{output}");
                } else {
                    warn!("   Full output: {output}");
                }
            }
            ExtractError::Timeout { .. } | ExtractError::NotFound { .. } => error!("{err}"),
            ExtractError::Other(e) => {
                error!("Unexpected failure: {e:#}");
                if self.verbosity.is_verbose() {
                    debug!("Details: {e:?}");
                }
            }
        }
        info!("Continuing build without updating the compiler version header");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("abcdef", 3), "abc");
        assert_eq!(preview("abc", 10), "abc");
        assert_eq!(preview("©©©", 2), "©©");
        assert_eq!(preview("", 5), "");
    }

    #[test]
    fn verbosity_from_flag() {
        assert_eq!(Verbosity::from_flag(true), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flag(false), Verbosity::Quiet);
        assert!(Verbosity::Verbose.is_verbose());
        assert!(!Verbosity::Quiet.is_verbose());
    }
}
