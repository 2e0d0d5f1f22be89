use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// File name looked up in the project root.
pub const PROJECT_CONFIG_FILE: &str = "ccversion.toml";

/// Build environment handed to the hook by the build system.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Compiler command as resolved by the build system (`$CC`).
    pub compiler_command: String,
    /// Project root (`$PROJECT_DIR`). The header lands in `include/` below it.
    pub project_root: PathBuf,
    /// Build profile name (`$PIOENV`), only used for a comment in the header.
    pub build_profile_name: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Verbose progress output (banners, debug prints, header echo). Default: true
    #[serde(default = "default_true")]
    pub verbose: bool,
    #[serde(default)]
    pub probe: ProbeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            verbose: true,
            probe: ProbeConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProbeConfig {
    /// Seconds to wait for `<compiler> --version` before killing it. Default: 10
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Run the command through the platform shell. Default: false
    #[serde(default)]
    pub shell: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            timeout_secs: default_timeout_secs(),
            shell: false,
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

/// Returns the base user config directory: ~/.ccversion/
pub fn base_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(home.join(".ccversion"))
}

/// Returns the path to the user-wide config file
pub fn global_config_path() -> Result<PathBuf> {
    Ok(base_dir()?.join("config.toml"))
}

/// Pick the config file to read: an explicit path, else the project file,
/// else the user-wide file. Returns `None` when none of them exist.
pub fn resolve_path(explicit: Option<&Path>, project_root: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let project = project_root.join(PROJECT_CONFIG_FILE);
    if project.exists() {
        return Some(project);
    }
    global_config_path().ok().filter(|p| p.exists())
}

/// Load config from `path` (or return defaults if there is none)
pub fn load(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(config)
}
