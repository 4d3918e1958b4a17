//! Build script for stackscope-core
//!
//! This script checks build requirements before compilation:
//! - Minimum Rust version (let-else, `Option::is_some_and` and `io::Error::other` need Rust 1.74+)
//! - Whether the target has any stack capture or symbolication backend
//!
//! Targets outside the `unix` and `windows` families still build; every
//! capture and symbolication call simply reports the capability as absent.

use std::env;

fn main()
{
    println!("cargo:rerun-if-changed=build.rs");

    if let Ok(rustc_version) = rustc_version::version() {
        let min_rust_version = rustc_version::Version::new(1, 74, 0);

        if rustc_version < min_rust_version {
            panic!(
                "stackscope-core requires Rust {} or newer, found {}",
                min_rust_version, rustc_version
            );
        }
    } else {
        // If we can't get version (e.g., in some build environments), just warn
        println!("cargo:warning=could not verify Rust version");
    }

    check_target_backends();
}

/// Warn when the target family has no native unwinder or symbol API.
///
/// Build scripts run on the host, so the target is read from Cargo's
/// `CARGO_CFG_*` variables instead of `cfg!`.
fn check_target_backends()
{
    let family = env::var("CARGO_CFG_TARGET_FAMILY").unwrap_or_default();
    let os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();

    let supported = family.split(',').any(|f| f == "unix" || f == "windows");
    if !supported {
        println!("cargo:warning=stackscope-core: no backtrace backend for target os `{os}`, capture will return 0 frames");
    }
}
