use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::version::Version;

/// Directory below the project root that receives the header.
pub const INCLUDE_DIR: &str = "include";

pub const HEADER_FILE: &str = "compiler_version.h";

const GUARD: &str = "COMPILER_VERSION_H";

/// Outcome of a header write.
#[derive(Debug, Clone)]
pub struct Written {
    pub path: PathBuf,
    pub bytes: u64,
    /// True when the include directory did not exist before this write.
    pub created_include_dir: bool,
}

/// `<project_root>/include/compiler_version.h`
pub fn header_path(project_root: &Path) -> PathBuf {
    project_root.join(INCLUDE_DIR).join(HEADER_FILE)
}

/// Render the header text. Output depends only on the arguments.
pub fn render(version: &Version, profile: Option<&str>) -> String {
    let mut h = String::new();
    h.push_str("// Auto-generated compiler version\n");
    h.push_str("// Do not edit manually\n");
    if let Some(profile) = profile.filter(|p| !p.is_empty()) {
        let _ = writeln!(h, "// Generated on: {profile}");
    }
    h.push('\n');
    let _ = writeln!(h, "#ifndef {GUARD}");
    let _ = writeln!(h, "#define {GUARD}\n");
    let _ = writeln!(h, "#define XTENSA_COMPILER_VERSION \"{version}\"");
    let _ = writeln!(h, "#define XTENSA_COMPILER_MAJOR {}", version.major);
    let _ = writeln!(h, "#define XTENSA_COMPILER_MINOR {}", version.minor);
    let _ = writeln!(h, "#define XTENSA_COMPILER_PATCH {}\n", version.patch);
    let _ = writeln!(h, "#endif // {GUARD}");
    h
}

/// Write `contents` to the header below `project_root`, creating the include
/// directory if needed. Any previous header is overwritten.
pub fn write(project_root: &Path, contents: &str) -> Result<Written> {
    let include_dir = project_root.join(INCLUDE_DIR);
    let created_include_dir = !include_dir.is_dir();
    fs::create_dir_all(&include_dir)
        .with_context(|| format!("failed to create {}", include_dir.display()))?;

    let path = include_dir.join(HEADER_FILE);
    fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;

    let bytes = fs::metadata(&path)
        .with_context(|| format!("header missing after write: {}", path.display()))?
        .len();

    Ok(Written {
        path,
        bytes,
        created_include_dir,
    })
}
