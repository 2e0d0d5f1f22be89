use std::process::Command;

/// Short hash of the checked-out commit, if this is a git checkout.
fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?.trim().to_string();
    (!hash.is_empty()).then_some(hash)
}

fn main() {
    println!("cargo:rerun-if-env-changed=CCVERSION_BUILD");
    if std::path::Path::new(".git/HEAD").exists() {
        println!("cargo:rerun-if-changed=.git/HEAD");
    }

    // Release pipelines pin the identifier; local builds fall back to git, then "dev".
    let build = std::env::var("CCVERSION_BUILD")
        .ok()
        .filter(|b| !b.trim().is_empty())
        .or_else(|| git_short_hash().map(|hash| format!("build-{hash}")))
        .unwrap_or_else(|| "dev".to_string());

    println!("cargo:rustc-env=CCVERSION_BUILD={build}");
}
