//! Events emitted while running a tool invocation.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one invocation, unique across the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationId(Uuid);

impl InvocationId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a launched process stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseReason {
    /// The process exited on its own.
    Exited,
    /// The invocation was cancelled by the caller.
    Cancelled,
}

/// Exit descriptor carried by a close event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitInfo {
    /// Exit code, when the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal on Unix, when killed by one.
    pub signal: Option<i32>,
    /// Why the process stopped.
    pub reason: CloseReason,
}

impl ExitInfo {
    /// Exit descriptor for a process that exited by itself.
    pub const fn exited(code: Option<i32>, signal: Option<i32>) -> Self {
        Self {
            code,
            signal,
            reason: CloseReason::Exited,
        }
    }

    /// Exit descriptor for a cancelled invocation.
    pub const fn cancelled(code: Option<i32>, signal: Option<i32>) -> Self {
        Self {
            code,
            signal,
            reason: CloseReason::Cancelled,
        }
    }

    /// True for an uncancelled exit with code 0.
    pub fn success(&self) -> bool {
        self.reason == CloseReason::Exited && self.code == Some(0)
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.reason, self.code, self.signal) {
            (CloseReason::Cancelled, _, _) => write!(f, "cancelled"),
            (CloseReason::Exited, Some(code), _) => write!(f, "exit code {code}"),
            (CloseReason::Exited, None, Some(signal)) => write!(f, "killed by signal {signal}"),
            (CloseReason::Exited, None, None) => write!(f, "exited"),
        }
    }
}

/// Classification of a process failure event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProcessFailureKind {
    /// No candidate executable could be found.
    LaunchNotFound,
    /// The last candidate exists but could not be started.
    LaunchFailed,
    /// A launched process failed while it was being supervised.
    Runtime,
}

/// Error descriptor carried by an error event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessFailure {
    /// Failure classification.
    pub kind: ProcessFailureKind,
    /// Candidate executable the failure refers to.
    pub candidate: String,
    /// Human-readable failure text.
    pub message: String,
}

impl fmt::Display for ProcessFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Payload of a process event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProcessEventKind {
    /// One line of standard output.
    Stdout { line: String },
    /// One line of standard error.
    Stderr { line: String },
    /// The launched process is gone.
    Close(ExitInfo),
    /// Launch or runtime failure.
    Error(ProcessFailure),
}

/// Process event tagged with the invocation that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEvent {
    /// Producing invocation.
    pub invocation: InvocationId,
    /// Event payload.
    #[serde(flatten)]
    pub kind: ProcessEventKind,
}

impl ProcessEvent {
    /// Create a tagged process event.
    pub const fn new(invocation: InvocationId, kind: ProcessEventKind) -> Self {
        Self { invocation, kind }
    }

    /// True for close and error events, after which the invocation emits
    /// nothing further.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            ProcessEventKind::Close(_) | ProcessEventKind::Error(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_info_display() {
        assert_eq!(ExitInfo::exited(Some(2), None).to_string(), "exit code 2");
        assert_eq!(ExitInfo::exited(None, Some(9)).to_string(), "killed by signal 9");
        assert_eq!(ExitInfo::cancelled(None, Some(15)).to_string(), "cancelled");
        assert!(ExitInfo::exited(Some(0), None).success());
        assert!(!ExitInfo::cancelled(Some(0), None).success());
    }

    #[test]
    fn test_close_event_serialization() {
        let event = ProcessEvent::new(
            InvocationId::new(),
            ProcessEventKind::Close(ExitInfo::exited(Some(1), None)),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"close\""));
        assert!(json.contains("\"code\":1"));
        assert!(json.contains("\"reason\":\"exited\""));
        assert!(event.is_terminal());
    }

    #[test]
    fn test_error_event_serialization() {
        let event = ProcessEvent::new(
            InvocationId::new(),
            ProcessEventKind::Error(ProcessFailure {
                kind: ProcessFailureKind::LaunchNotFound,
                candidate: "missing-tool".to_string(),
                message: "failed to launch missing-tool: not found".to_string(),
            }),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"error\""));
        assert!(json.contains("launchNotFound"));
    }
}
