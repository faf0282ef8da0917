//! Types produced by candidate resolution.

use serde::Serialize;
use std::fmt;

/// Ordered, non-empty list of executable names for one logical tool name.
///
/// The first element is always the unqualified logical name, so an unmodeled
/// platform still gets a reasonable default. Lists are built fresh on every
/// resolution and cannot be mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CandidateList(Vec<String>);

impl CandidateList {
    /// Build a list from the logical name followed by its aliases.
    ///
    /// Aliases equal to the logical name, or repeated, are dropped while
    /// preserving order.
    pub(crate) fn from_aliases<'a, I>(logical_name: &str, aliases: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut names = vec![logical_name.to_string()];
        for alias in aliases {
            if !names.iter().any(|existing| existing == alias) {
                names.push(alias.to_string());
            }
        }
        Self(names)
    }

    /// The logical name itself (first candidate).
    pub fn first(&self) -> &str {
        &self.0[0]
    }

    /// Number of candidates (at least one).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Candidate at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// All candidates, in preference order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Iterate over candidates in preference order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for CandidateList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_are_dropped_in_order() {
        let list = CandidateList::from_aliases("tool", ["tool", "tool-a", "tool-b", "tool-a"]);
        assert_eq!(list.as_slice(), ["tool", "tool-a", "tool-b"]);
        assert_eq!(list.len(), 3);
        assert!(!list.is_empty());
    }

    #[test]
    fn test_display_joins_with_arrows() {
        let list = CandidateList::from_aliases("a", ["b"]);
        assert_eq!(list.to_string(), "a -> b");
        assert_eq!(list.get(1), Some("b"));
        assert_eq!(list.get(2), None);
    }
}
