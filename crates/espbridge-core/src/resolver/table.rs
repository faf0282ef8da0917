//! Swappable alias table driving candidate resolution.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::types::CandidateList;
use crate::platform::Platform;

/// Platforms a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformMatch {
    /// Every platform.
    Any,
    /// Windows only.
    Windows,
    /// macOS only.
    #[serde(rename = "macos")]
    MacOS,
    /// Neither Windows nor macOS.
    Other,
}

impl PlatformMatch {
    /// Whether this selector covers the given platform.
    pub const fn matches(self, platform: Platform) -> bool {
        match self {
            Self::Any => true,
            Self::Windows => platform.is_windows,
            Self::MacOS => platform.is_macos,
            Self::Other => platform.is_other(),
        }
    }
}

/// Alternatives registered for one logical name on a set of platforms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRule {
    logical_name: String,
    platform: PlatformMatch,
    aliases: Vec<String>,
}

impl CandidateRule {
    /// Create a rule.
    pub fn new<I, S>(logical_name: impl Into<String>, platform: PlatformMatch, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            logical_name: logical_name.into(),
            platform,
            aliases: aliases.into_iter().map(Into::into).collect(),
        }
    }

    /// Logical name this rule applies to.
    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    /// Platform selector.
    pub const fn platform(&self) -> PlatformMatch {
        self.platform
    }

    /// Alternative executable names, in preference order.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    fn applies_to(&self, logical_name: &str, platform: Platform) -> bool {
        self.logical_name == logical_name && self.platform.matches(platform)
    }
}

/// Built-in rules: `(logical name, platform, aliases)`.
///
/// Homebrew ships esptool under architecture-specific names, the Windows
/// bundle ships a frozen `esptool.exe`, and most Linux distributions package
/// the tools without the `.py` suffix.
const BUILTIN_RULES: &[(&str, PlatformMatch, &[&str])] = &[
    (
        "esptool.py",
        PlatformMatch::MacOS,
        &["esptool-homebrew-arm", "esptool-homebrew-intel", "esptool"],
    ),
    (
        "esptool.py",
        PlatformMatch::Windows,
        &["esptool.exe", "esptool"],
    ),
    ("esptool.py", PlatformMatch::Other, &["esptool"]),
    ("espefuse.py", PlatformMatch::Any, &["espefuse"]),
    ("espsecure.py", PlatformMatch::Any, &["espsecure"]),
];

static BUILTIN_TABLE: LazyLock<CandidateTable> = LazyLock::new(|| {
    CandidateTable::new(
        BUILTIN_RULES
            .iter()
            .map(|(name, platform, aliases)| {
                CandidateRule::new(*name, *platform, aliases.iter().copied())
            })
            .collect(),
    )
});

/// Ordered set of candidate rules. The first matching rule wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateTable {
    rules: Vec<CandidateRule>,
}

impl CandidateTable {
    /// Create a table from explicit rules.
    pub const fn new(rules: Vec<CandidateRule>) -> Self {
        Self { rules }
    }

    /// An empty table: every name resolves to itself.
    pub const fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The built-in table shipped with espbridge.
    pub fn builtin() -> &'static Self {
        &BUILTIN_TABLE
    }

    /// Return a copy of this table with `rule` taking precedence over the
    /// existing rules.
    #[must_use]
    pub fn with_rule(mut self, rule: CandidateRule) -> Self {
        self.rules.insert(0, rule);
        self
    }

    /// Registered rules in evaluation order.
    pub fn rules(&self) -> &[CandidateRule] {
        &self.rules
    }

    /// Resolve a logical name for a platform.
    ///
    /// Never fails and never returns an empty list: without a matching rule
    /// the result is the logical name alone.
    pub fn resolve(&self, logical_name: &str, platform: Platform) -> CandidateList {
        self.rules
            .iter()
            .find(|rule| rule.applies_to(logical_name, platform))
            .map_or_else(
                || CandidateList::from_aliases(logical_name, std::iter::empty()),
                |rule| {
                    CandidateList::from_aliases(
                        logical_name,
                        rule.aliases.iter().map(String::as_str),
                    )
                },
            )
    }
}
