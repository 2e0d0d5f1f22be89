//! The pre-build hook: probe the compiler, parse its version, write the header.
//!
//! Every failure is logged and handed back to the caller as an
//! [`ExtractError`]; none of them is meant to stop the build.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::{BuildContext, Config};
use crate::header;
use crate::probe;
use crate::report::{Reporter, Verbosity};
use crate::version::Version;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("compiler command timed out after {timeout:?}: {command}")]
    Timeout { command: String, timeout: Duration },

    #[error("compiler not found: {command} ({reason})")]
    NotFound { command: String, reason: String },

    #[error("could not parse compiler version from output")]
    ParseFailure { output: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExtractError {
    /// Stable identifier used in the JSON report.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::Timeout { .. } => "timeout",
            ExtractError::NotFound { .. } => "not_found",
            ExtractError::ParseFailure { .. } => "parse_failure",
            ExtractError::Other(_) => "other",
        }
    }
}

/// A successful run.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub version: Version,
    pub header_path: PathBuf,
    pub bytes: u64,
    pub created_include_dir: bool,
}

/// Probe, parse and write without the banners or failure logging.
pub fn extract(
    ctx: &BuildContext,
    cfg: &Config,
    reporter: &Reporter,
) -> Result<Extraction, ExtractError> {
    reporter.probing(ctx, &cfg.probe);
    let output = probe::run(&ctx.compiler_command, &cfg.probe)?;
    reporter.probe_output(&output);

    let combined = output.combined();
    let Some(version) = Version::find(&combined) else {
        return Err(ExtractError::ParseFailure { output: combined });
    };
    reporter.version_found(&version);

    let contents = header::render(&version, ctx.build_profile_name.as_deref());
    let written = header::write(&ctx.project_root, &contents)?;
    reporter.header_written(ctx, &written, &contents);

    Ok(Extraction {
        version,
        header_path: written.path,
        bytes: written.bytes,
        created_include_dir: written.created_include_dir,
    })
}

/// Hook entry point. Failures are logged here; the returned error is only
/// informational.
pub fn run(ctx: &BuildContext, cfg: &Config) -> Result<Extraction, ExtractError> {
    let reporter = Reporter::new(Verbosity::from_flag(cfg.verbose));
    reporter.started();
    let result = extract(ctx, cfg, &reporter);
    if let Err(ref e) = result {
        reporter.failed(e);
    }
    reporter.finished();
    result
}
