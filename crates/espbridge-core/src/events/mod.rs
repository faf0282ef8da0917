//! Event envelope shared by the spawner and the serial session.
//!
//! Both components publish onto one process-wide bus. Every event carries
//! the identifier of the invocation or serial session that produced it, so
//! subscribers can demultiplex concurrent producers instead of guessing.

mod process;
mod serial;

pub use process::{
    CloseReason, ExitInfo, InvocationId, ProcessEvent, ProcessEventKind, ProcessFailure,
    ProcessFailureKind,
};
pub use serial::{SerialEvent, SerialEventKind, SessionId, hex_encode};

use serde::{Deserialize, Serialize};

/// A tagged notification delivered to every bus subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "event", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Output or lifecycle notification from a tool invocation.
    Process(ProcessEvent),
    /// Status, error or inbound data from the serial session.
    Serial(SerialEvent),
}

impl StreamEvent {
    /// The process event, if this is one.
    pub const fn as_process(&self) -> Option<&ProcessEvent> {
        match self {
            Self::Process(event) => Some(event),
            Self::Serial(_) => None,
        }
    }

    /// The serial event, if this is one.
    pub const fn as_serial(&self) -> Option<&SerialEvent> {
        match self {
            Self::Serial(event) => Some(event),
            Self::Process(_) => None,
        }
    }

    /// True when the event belongs to the given invocation.
    pub fn is_from_invocation(&self, id: InvocationId) -> bool {
        self.as_process().is_some_and(|event| event.invocation == id)
    }
}

impl From<ProcessEvent> for StreamEvent {
    fn from(event: ProcessEvent) -> Self {
        Self::Process(event)
    }
}

impl From<SerialEvent> for StreamEvent {
    fn from(event: SerialEvent) -> Self {
        Self::Serial(event)
    }
}
