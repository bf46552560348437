use std::process::Command;

fn git(args: &[&str]) -> Option<std::process::Output> {
    Command::new("git").args(args).output().ok()
}

/// Release builds report the crate version; other builds add the commit
fn main() {
    let version = env!("CARGO_PKG_VERSION");
    let profile = std::env::var("PROFILE").unwrap_or_default();

    let version_string = if profile == "release" {
        version.to_string()
    } else {
        let commit = git(&["rev-parse", "--short", "HEAD"])
            .filter(|output| output.status.success())
            .and_then(|output| String::from_utf8(output.stdout).ok())
            .map(|hash| hash.trim().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let dirty = git(&["diff-index", "--quiet", "HEAD"])
            .map(|output| !output.status.success())
            .unwrap_or(false);

        format!("{}+{}{}", version, commit, if dirty { "-dirty" } else { "" })
    };

    println!("cargo:rustc-env=TELEBRIDGE_VERSION={}", version_string);
    println!("cargo:rerun-if-changed=.git/HEAD");
}
