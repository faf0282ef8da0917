//! Candidate resolution for logical tool names.
//!
//! A logical tool name (e.g. `esptool.py`) is decoupled from the executable
//! actually installed on the host. Resolution maps the name and the host
//! platform to an ordered list of executable names to try, first to last.
//!
//! ## Architecture
//!
//! - `types`: `CandidateList`, the read-only result of a resolution
//! - `table`: `CandidateTable` / `CandidateRule`, the swappable alias table
//!
//! Resolution is pure: no filesystem or PATH probing happens here. Whether a
//! candidate can actually be launched is decided by the spawner, which falls
//! back to the next candidate when a launch fails.
//!
//! ## Usage
//!
//! ```rust
//! use espbridge_core::{Platform, resolve};
//!
//! let candidates = resolve("esptool.py", Platform::MACOS);
//! assert_eq!(candidates.first(), "esptool.py");
//! assert!(candidates.len() > 1);
//! ```

mod table;
mod types;

pub use table::{CandidateRule, CandidateTable, PlatformMatch};
pub use types::CandidateList;

use crate::platform::Platform;

/// Resolve a logical tool name against the built-in candidate table.
pub fn resolve(logical_name: &str, platform: Platform) -> CandidateList {
    CandidateTable::builtin().resolve(logical_name, platform)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unregistered_names_resolve_to_themselves() {
        for name in ["missing-tool", "idf.py", "python3", "esptool", "ESPTOOL.PY", ""] {
            for platform in [Platform::WINDOWS, Platform::MACOS, Platform::OTHER] {
                let list = resolve(name, platform);
                assert_eq!(list.as_slice(), [name.to_string()], "{name} on {platform}");
            }
        }
    }

    #[test]
    fn test_registered_names_keep_logical_name_first() {
        for rule in CandidateTable::builtin().rules() {
            for platform in [Platform::WINDOWS, Platform::MACOS, Platform::OTHER] {
                let list = resolve(rule.logical_name(), platform);
                assert_eq!(list.first(), rule.logical_name());
            }
        }
    }

    #[test]
    fn test_esptool_macos_prefers_homebrew_builds() {
        let list = resolve("esptool.py", Platform::MACOS);
        assert_eq!(
            list.as_slice(),
            ["esptool.py", "esptool-homebrew-arm", "esptool-homebrew-intel", "esptool"]
        );
    }

    #[test]
    fn test_esptool_windows_tries_bundled_exe() {
        let list = resolve("esptool.py", Platform::WINDOWS);
        assert_eq!(list.as_slice(), ["esptool.py", "esptool.exe", "esptool"]);
    }

    #[test]
    fn test_esptool_linux_tries_distro_name() {
        let list = resolve("esptool.py", Platform::OTHER);
        assert_eq!(list.as_slice(), ["esptool.py", "esptool"]);
    }
}
