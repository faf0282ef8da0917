//! Invocation model: one user-requested tool execution.
//!
//! An invocation walks its candidate list from first to last. Only a launch
//! failure moves it to the next candidate; everything else ends it. The
//! terminal outcome is reached exactly once.

use serde::Serialize;

use crate::events::{ExitInfo, InvocationId};
use crate::resolver::CandidateList;

/// Terminal (or pending) state of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationOutcome {
    /// Still trying candidates or supervising a child.
    Pending,
    /// A candidate launched. Its exit code may still be non-zero.
    Succeeded,
    /// Every candidate failed to launch.
    Exhausted,
    /// Cancelled before any candidate launched.
    Cancelled,
}

impl InvocationOutcome {
    /// Whether this outcome is final.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Result of one attempt to run a single candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum AttemptOutcome {
    /// The candidate could not be started.
    LaunchFailed {
        not_found: bool,
        message: String,
    },
    /// The candidate ran and exited by itself.
    Exited(ExitInfo),
    /// The candidate ran but supervising it failed.
    RuntimeError { message: String },
    /// The invocation was cancelled during this attempt.
    Cancelled(ExitInfo),
}

impl AttemptOutcome {
    /// Only launch failures move on to the next candidate.
    pub const fn should_try_next(&self) -> bool {
        matches!(self, Self::LaunchFailed { .. })
    }
}

/// Diagnostic record of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    /// Candidate executable name.
    pub candidate: String,
    /// How the attempt ended.
    pub outcome: AttemptOutcome,
}

/// One user-requested execution of a logical tool name.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    id: InvocationId,
    logical_name: String,
    args: Vec<String>,
    candidates: CandidateList,
    index: usize,
    outcome: InvocationOutcome,
    attempts: Vec<Attempt>,
}

impl Invocation {
    /// Create a pending invocation positioned at the first candidate.
    ///
    /// Empty-string arguments are dropped.
    pub fn new<I, S>(logical_name: impl Into<String>, args: I, candidates: CandidateList) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: InvocationId::new(),
            logical_name: logical_name.into(),
            args: normalize_args(args),
            candidates,
            index: 0,
            outcome: InvocationOutcome::Pending,
            attempts: Vec::new(),
        }
    }

    pub const fn id(&self) -> InvocationId {
        self.id
    }

    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    /// Filtered argument vector passed to every candidate.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub const fn candidates(&self) -> &CandidateList {
        &self.candidates
    }

    /// Index of the candidate currently being tried.
    pub const fn candidate_index(&self) -> usize {
        self.index
    }

    /// The candidate currently being tried, or `None` once exhausted.
    pub fn current_candidate(&self) -> Option<&str> {
        if self.outcome.is_terminal() && self.outcome != InvocationOutcome::Succeeded {
            return None;
        }
        self.candidates.get(self.index)
    }

    /// Whether another candidate follows the current one.
    pub fn has_next(&self) -> bool {
        self.index + 1 < self.candidates.len()
    }

    pub const fn outcome(&self) -> InvocationOutcome {
        self.outcome
    }

    /// Attempts made so far, in order.
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Record the result of trying the current candidate and update state.
    ///
    /// Returns `true` when the next candidate should be tried. Recording on a
    /// terminal invocation is ignored.
    pub fn record(&mut self, outcome: AttemptOutcome) -> bool {
        if self.outcome.is_terminal() {
            return false;
        }
        let candidate = self
            .candidates
            .get(self.index)
            .unwrap_or_else(|| self.candidates.first())
            .to_string();
        let advance = outcome.should_try_next() && self.has_next();
        self.outcome = match &outcome {
            AttemptOutcome::LaunchFailed { .. } if advance => InvocationOutcome::Pending,
            AttemptOutcome::LaunchFailed { .. } => InvocationOutcome::Exhausted,
            AttemptOutcome::Exited(_)
            | AttemptOutcome::RuntimeError { .. }
            | AttemptOutcome::Cancelled(_) => InvocationOutcome::Succeeded,
        };
        self.attempts.push(Attempt { candidate, outcome });
        if advance {
            self.index += 1;
        }
        advance
    }

    /// Mark the invocation cancelled before any candidate launched.
    pub fn mark_cancelled(&mut self) {
        if !self.outcome.is_terminal() {
            self.outcome = InvocationOutcome::Cancelled;
        }
    }
}

/// Drop empty-string arguments, keeping order.
pub fn normalize_args<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    args.into_iter()
        .map(Into::into)
        .filter(|arg| !arg.is_empty())
        .collect()
}
