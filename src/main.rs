use std::ffi::OsString;
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use ccversion::config::{self, BuildContext, Config};
use ccversion::extractor::{self, ExtractError, Extraction};
use ccversion::header;
use ccversion::report::Verbosity;
use ccversion::version::Version;

#[derive(Parser)]
#[command(
    name = "ccversion",
    about = "Write the cross-compiler version to include/compiler_version.h",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CCVERSION_BUILD"), ")"),
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    hook: HookArgs,
}

/// Pre-build hook arguments (default when no subcommand is given)
#[derive(Args)]
struct HookArgs {
    /// Compiler command to probe with --version
    #[arg(long = "cc", env = "CC")]
    compiler: Option<String>,
    /// Project root; the header goes to <dir>/include/compiler_version.h
    #[arg(long, env = "PROJECT_DIR", default_value = ".")]
    project_dir: PathBuf,
    /// Build profile name, recorded as a comment in the header
    #[arg(long, env = "PIOENV")]
    profile: Option<String>,
    /// Seconds to wait for the compiler before giving up
    #[arg(long)]
    timeout: Option<u64>,
    /// Run the compiler command through the platform shell
    #[arg(long)]
    shell: bool,
    /// Terse output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
    /// Banners, debug prints and an echo of the generated header
    #[arg(short, long)]
    verbose: bool,
    /// Print the outcome as a JSON object on stdout
    #[arg(long)]
    json: bool,
    /// Config file (default: <project-dir>/ccversion.toml, then ~/.ccversion/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the first MAJOR.MINOR.PATCH version found in a file (or stdin)
    Parse {
        /// File holding compiler output; reads stdin when omitted
        file: Option<PathBuf>,
    },
    /// Print the header for a version without writing it
    Render {
        /// Version as MAJOR.MINOR.PATCH
        version: Version,
        /// Build profile name for the header comment
        #[arg(short, long)]
        profile: Option<String>,
    },
}

fn main() -> Result<()> {
    // A malformed hook invocation still must not fail the build.
    let Some(cli) = parse_cli(std::env::args_os()) else {
        return Ok(());
    };

    match cli.command {
        Some(Commands::Parse { file }) => parse(file.as_deref()),
        Some(Commands::Render { version, profile }) => {
            print!("{}", header::render(&version, profile.as_deref()));
            Ok(())
        }
        None => {
            run_hook(cli.hook);
            Ok(())
        }
    }
}

/// Parse the command line. Malformed arguments print the clap error and yield
/// `None`; `--help`/`--version` print and exit as usual.
fn parse_cli<I, T>(args: I) -> Option<Cli>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Some(cli),
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            None
        }
        Err(e) => e.exit(),
    }
}

fn init_logging(verbosity: Verbosity) {
    let level = if verbosity.is_verbose() {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .init();
}

/// Runs the extractor. Every outcome is logged and swallowed.
fn run_hook(args: HookArgs) {
    let config_path = config::resolve_path(args.config.as_deref(), &args.project_dir);
    let (mut cfg, load_err) = match config::load(config_path.as_deref()) {
        Ok(cfg) => (cfg, None),
        Err(e) => (Config::default(), Some(e)),
    };

    apply_overrides(&mut cfg, &args);
    init_logging(Verbosity::from_flag(cfg.verbose));

    if let Some(e) = load_err {
        tracing::warn!("ignoring config, using defaults: {e:#}");
    } else if let Some(ref path) = config_path {
        tracing::debug!("Loaded config from {}", path.display());
    }

    let ctx = BuildContext {
        compiler_command: args.compiler.unwrap_or_default(),
        project_root: args.project_dir,
        build_profile_name: args.profile,
    };

    let result = extractor::run(&ctx, &cfg);

    if args.json {
        println!("{}", json_report(&result));
    }
}

/// Command-line flags win over the config file.
fn apply_overrides(cfg: &mut Config, args: &HookArgs) {
    if args.verbose {
        cfg.verbose = true;
    } else if args.quiet {
        cfg.verbose = false;
    }
    if let Some(secs) = args.timeout {
        cfg.probe.timeout_secs = secs;
    }
    if args.shell {
        cfg.probe.shell = true;
    }
}

fn json_report(result: &Result<Extraction, ExtractError>) -> serde_json::Value {
    match result {
        Ok(extraction) => serde_json::json!({
            "status": "ok",
            "version": extraction.version.to_string(),
            "major": extraction.version.major,
            "minor": extraction.version.minor,
            "patch": extraction.version.patch,
            "header_path": extraction.header_path,
            "bytes": extraction.bytes,
            "created_include_dir": extraction.created_include_dir,
        }),
        Err(e) => serde_json::json!({
            "status": "error",
            "kind": e.kind(),
            "message": format!("{e:#}"),
        }),
    }
}

fn parse(file: Option<&Path>) -> Result<()> {
    let text = if let Some(path) = file {
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?
    } else {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        buf
    };

    let version = Version::find(&text).context("no MAJOR.MINOR.PATCH version found")?;
    println!("{version}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccversion::config::ProbeConfig;

    fn hook_args(args: &[&str]) -> HookArgs {
        let mut argv = vec!["ccversion"];
        argv.extend_from_slice(args);
        parse_cli(argv).unwrap().hook
    }

    fn file_config(verbose: bool, timeout_secs: u64, shell: bool) -> Config {
        Config {
            verbose,
            probe: ProbeConfig {
                timeout_secs,
                shell,
            },
        }
    }

    #[test]
    fn malformed_arguments_do_not_abort() {
        assert!(parse_cli(["ccversion", "--bogus"]).is_none());
        assert!(parse_cli(["ccversion", "--timeout", "soon"]).is_none());
        assert!(parse_cli(["ccversion", "--quiet", "--verbose"]).is_none());
    }

    #[test]
    fn hook_flags_parse_without_subcommand() {
        let cli = parse_cli([
            "ccversion",
            "--cc",
            "xtensa-esp32-elf-gcc",
            "--project-dir",
            "/tmp/fw",
            "--profile",
            "esp32dev",
            "--json",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.hook.compiler.as_deref(), Some("xtensa-esp32-elf-gcc"));
        assert_eq!(cli.hook.project_dir, PathBuf::from("/tmp/fw"));
        assert_eq!(cli.hook.profile.as_deref(), Some("esp32dev"));
        assert!(cli.hook.json);
    }

    #[test]
    fn subcommands_parse() {
        let cli = parse_cli(["ccversion", "render", "8.4.0", "-p", "esp32dev"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Render { ref version, ref profile })
                if version.to_string() == "8.4.0" && profile.as_deref() == Some("esp32dev")
        ));
        assert!(parse_cli(["ccversion", "render", "gcc 8.4.0"]).is_none());
    }

    #[test]
    fn no_flags_keep_file_values() {
        let mut cfg = file_config(false, 3, true);
        apply_overrides(&mut cfg, &hook_args(&[]));
        assert!(!cfg.verbose);
        assert_eq!(cfg.probe.timeout_secs, 3);
        assert!(cfg.probe.shell);
    }

    #[test]
    fn verbose_flag_overrides_quiet_file() {
        let mut cfg = file_config(false, 10, false);
        apply_overrides(&mut cfg, &hook_args(&["--verbose"]));
        assert!(cfg.verbose);
    }

    #[test]
    fn quiet_flag_overrides_verbose_file() {
        let mut cfg = file_config(true, 10, false);
        apply_overrides(&mut cfg, &hook_args(&["-q"]));
        assert!(!cfg.verbose);
    }

    #[test]
    fn timeout_and_shell_flags_override_file() {
        let mut cfg = file_config(true, 10, false);
        apply_overrides(&mut cfg, &hook_args(&["--timeout", "2", "--shell"]));
        assert_eq!(cfg.probe.timeout_secs, 2);
        assert!(cfg.probe.shell);
    }

    #[test]
    fn json_report_for_success() {
        let result = Ok(Extraction {
            version: "8.4.0".parse().unwrap(),
            header_path: PathBuf::from("/fw/include/compiler_version.h"),
            bytes: 312,
            created_include_dir: true,
        });
        let report = json_report(&result);
        assert_eq!(report["status"], "ok");
        assert_eq!(report["version"], "8.4.0");
        assert_eq!(report["major"], "8");
        assert_eq!(report["minor"], "4");
        assert_eq!(report["patch"], "0");
        assert_eq!(report["header_path"], "/fw/include/compiler_version.h");
        assert_eq!(report["bytes"], 312);
        assert_eq!(report["created_include_dir"], true);
    }

    #[test]
    fn json_report_for_each_failure_kind() {
        let cases = [
            (
                ExtractError::Timeout {
                    command: "xtensa-esp32-elf-gcc --version".to_string(),
                    timeout: std::time::Duration::from_secs(10),
                },
                "timeout",
            ),
            (
                ExtractError::NotFound {
                    command: String::new(),
                    reason: "no compiler command configured".to_string(),
                },
                "not_found",
            ),
            (
                ExtractError::ParseFailure {
                    output: "clang version unknown".to_string(),
                },
                "parse_failure",
            ),
            (
                ExtractError::Other(anyhow::anyhow!("permission denied")),
                "other",
            ),
        ];

        for (err, kind) in cases {
            let message = format!("{err:#}");
            let report = json_report(&Err(err));
            assert_eq!(report["status"], "error");
            assert_eq!(report["kind"], kind);
            assert_eq!(report["message"], message.as_str());
            assert!(report.get("version").is_none());
        }
    }
}
