use std::process::Command;

/// Run a git query and return its trimmed stdout, if git is available
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn main() {
    // Build identity for the startup banner
    let exports = [
        ("GIT_DESC", git(&["describe", "--always", "--dirty", "--tags"])),
        ("GIT_HASH", git(&["rev-parse", "--short", "HEAD"])),
        ("BUILD_TIME", Some(chrono::Utc::now().to_rfc3339())),
    ];
    for (key, value) in exports {
        if let Some(value) = value {
            println!("cargo:rustc-env={}={}", key, value);
        }
    }

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
