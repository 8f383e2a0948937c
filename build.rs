//! Build script for the constellation service
//!
//! Embeds git SHA and build time at compile time for deployment verification.
//! Priority: CI env var, then git command, then "unknown".

use chrono::Utc;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    let git_sha = std::env::var("GIT_SHA")
        .ok()
        .or_else(|| {
            Command::new("git")
                .args(["rev-parse", "HEAD"])
                .output()
                .ok()
                .filter(|o| o.status.success())
                .and_then(|o| String::from_utf8(o.stdout).ok())
                .map(|s| s.trim().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string());

    let build_time = std::env::var("BUILD_TIME").unwrap_or_else(|_| Utc::now().to_rfc3339());

    println!("cargo:rustc-env=GIT_SHA={git_sha}");
    println!("cargo:rustc-env=BUILD_TIME={build_time}");
}
