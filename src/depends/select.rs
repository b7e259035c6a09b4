//! Release asset ranking
//!
//! Five passes, each over the whole list, first hit wins:
//!
//! 1. project keyword and target-OS keyword
//! 2. target-OS keyword
//! 3. project keyword
//! 4. neutral (no OS keyword of any OS, no project keyword)
//! 5. the first asset
//!
//! Matching is case-insensitive substring matching on the asset's file name.

use crate::core::config::TargetOs;

const WINDOWS_PATTERNS: &[&str] = &["windows", "win", "win32", "msvc", "mingw", ".dll"];

const LINUX_PATTERNS: &[&str] = &[
    "linux", "ubuntu", "debian", "cent", "centos", "cent_os", "fedora", "arch", "archlinux",
    "alpine", "rhel", "redhat", "linuxmint", "mint", ".so",
];

const PROJECT_PATTERNS: &[&str] = &[
    "src", "source", "proj", "project", "server", "_server", "gamemode", "gamemodes", "bin",
    "build", "packages", "resources", "modules", "plugins", "addons", "extensions", "scripts",
    "system", "core", "runtime", "libs", "include", "deps", "dependencies",
];

fn os_patterns(os: TargetOs) -> &'static [&'static str] {
    match os {
        TargetOs::Windows => WINDOWS_PATTERNS,
        TargetOs::Linux => LINUX_PATTERNS,
    }
}

fn matches_any(name: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| name.contains(p))
}

/// The part of an asset URL that names the file.
fn asset_name(asset: &str) -> String {
    let trimmed = asset.split(['?', '#']).next().unwrap_or(asset);
    trimmed
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(trimmed)
        .to_lowercase()
}

/// Pick the asset best suited to `os`. Returns `None` only for an empty list.
pub fn select_best<S: AsRef<str>>(assets: &[S], os: TargetOs) -> Option<&S> {
    if let [only] = assets {
        return Some(only);
    }

    let names: Vec<String> = assets.iter().map(|a| asset_name(a.as_ref())).collect();
    let target = os_patterns(os);
    let is_project = |n: &str| matches_any(n, PROJECT_PATTERNS);
    let is_target_os = |n: &str| matches_any(n, target);
    let is_any_os = |n: &str| matches_any(n, WINDOWS_PATTERNS) || matches_any(n, LINUX_PATTERNS);

    let passes: [&dyn Fn(&str) -> bool; 4] = [
        &|n: &str| is_project(n) && is_target_os(n),
        &|n: &str| is_target_os(n),
        &|n: &str| is_project(n),
        &|n: &str| !is_any_os(n) && !is_project(n),
    ];

    passes
        .iter()
        .find_map(|pass| names.iter().position(|n| pass(n.as_str())))
        .or(if assets.is_empty() { None } else { Some(0) })
        .map(|idx| &assets[idx])
}
