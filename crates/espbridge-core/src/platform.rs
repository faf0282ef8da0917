//! Host platform classification.
//!
//! Candidate resolution only distinguishes Windows, macOS and "everything
//! else"; finer detail (architecture, distribution) is expressed through the
//! alias lists in the candidate table instead.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of the host platform used by the candidate resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Platform {
    /// Host is a Windows system.
    pub is_windows: bool,
    /// Host is a macOS system.
    pub is_macos: bool,
}

impl Platform {
    /// Windows host.
    pub const WINDOWS: Self = Self {
        is_windows: true,
        is_macos: false,
    };

    /// macOS host.
    pub const MACOS: Self = Self {
        is_windows: false,
        is_macos: true,
    };

    /// Any other host (Linux, BSD, ...).
    pub const OTHER: Self = Self {
        is_windows: false,
        is_macos: false,
    };

    /// Classify the platform this binary was compiled for.
    #[must_use]
    pub const fn current() -> Self {
        Self {
            is_windows: cfg!(target_os = "windows"),
            is_macos: cfg!(target_os = "macos"),
        }
    }

    /// True when the platform is neither Windows nor macOS.
    #[must_use]
    pub const fn is_other(self) -> bool {
        !self.is_windows && !self.is_macos
    }

    /// Short lowercase label (`windows`, `macos`, `linux`).
    #[must_use]
    pub const fn label(self) -> &'static str {
        if self.is_windows {
            "windows"
        } else if self.is_macos {
            "macos"
        } else {
            "linux"
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "windows" | "win" => Ok(Self::WINDOWS),
            "macos" | "mac" | "darwin" => Ok(Self::MACOS),
            "linux" | "other" => Ok(Self::OTHER),
            other => Err(format!(
                "Unknown platform '{other}'. Expected 'windows', 'macos' or 'linux'."
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_matches_compile_target() {
        let platform = Platform::current();
        assert_eq!(platform.is_windows, cfg!(target_os = "windows"));
        assert_eq!(platform.is_macos, cfg!(target_os = "macos"));
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!("win".parse::<Platform>().unwrap(), Platform::WINDOWS);
        assert_eq!("Darwin".parse::<Platform>().unwrap(), Platform::MACOS);
        assert_eq!("linux".parse::<Platform>().unwrap(), Platform::OTHER);
        assert!("plan9".parse::<Platform>().is_err());
    }

    #[test]
    fn test_label_round_trips() {
        for platform in [Platform::WINDOWS, Platform::MACOS, Platform::OTHER] {
            assert_eq!(platform.label().parse::<Platform>().unwrap(), platform);
        }
    }
}
