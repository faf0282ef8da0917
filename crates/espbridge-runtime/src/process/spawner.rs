//! Fallback spawner: run a logical tool name through its candidate list.
//!
//! `execute` returns immediately with an `InvocationHandle`; the work runs on
//! a tokio task. Candidates are tried in order. A candidate that cannot be
//! started is skipped silently. The first one that starts owns the
//! invocation: its output is streamed line by line and its exit ends the
//! invocation, whatever the exit code.

use chrono::{DateTime, Utc};
use espbridge_core::settings::BridgeSettings;
use espbridge_core::{
    Attempt, AttemptOutcome, CandidateTable, EventSink, ExitInfo, Invocation, InvocationId,
    InvocationOutcome, Platform, ProcessEvent, ProcessEventKind, ProcessFailure,
    ProcessFailureKind,
};
use serde::Serialize;
use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::shutdown::shutdown_child;
use super::stream::{InvocationEmitter, StreamKind, spawn_line_forwarder};
use crate::broadcaster::{EventBus, get_event_bus};
use crate::env::settings_from_env;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Diagnostic summary of a finished invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationReport {
    pub id: InvocationId,
    pub logical_name: String,
    pub outcome: InvocationOutcome,
    pub attempts: Vec<Attempt>,
}

impl InvocationReport {
    /// Exit descriptor of the launched candidate, if one launched and exited
    /// or was cancelled.
    pub fn exit(&self) -> Option<&ExitInfo> {
        self.attempts.iter().rev().find_map(|attempt| match &attempt.outcome {
            AttemptOutcome::Exited(info) | AttemptOutcome::Cancelled(info) => Some(info),
            _ => None,
        })
    }

    /// Candidate that actually launched.
    pub fn launched_candidate(&self) -> Option<&str> {
        self.attempts
            .iter()
            .find(|attempt| !attempt.outcome.should_try_next())
            .map(|attempt| attempt.candidate.as_str())
    }
}

/// A running invocation, as listed by `FallbackSpawner::active_invocations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationSummary {
    pub id: InvocationId,
    pub logical_name: String,
    pub args: Vec<String>,
    pub started_at: DateTime<Utc>,
}

struct ActiveInvocation {
    summary: InvocationSummary,
    token: CancellationToken,
}

type ActiveMap = Arc<Mutex<HashMap<InvocationId, ActiveInvocation>>>;

/// Caller's handle on one invocation.
///
/// Events arrive on a private, lossless channel in addition to the shared
/// bus. Dropping the handle does not cancel the invocation.
pub struct InvocationHandle {
    id: InvocationId,
    events: mpsc::UnboundedReceiver<ProcessEvent>,
    token: CancellationToken,
    task: JoinHandle<InvocationReport>,
}

impl InvocationHandle {
    pub const fn id(&self) -> InvocationId {
        self.id
    }

    /// Request cancellation. A running child is terminated and a `Close`
    /// event with reason `Cancelled` follows.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Next event of this invocation, or `None` once it has finished and
    /// every event was received.
    pub async fn next_event(&mut self) -> Option<ProcessEvent> {
        self.events.recv().await
    }

    /// Wait for the invocation to finish.
    ///
    /// Events not yet received with `next_event` are discarded.
    pub async fn wait(self) -> Result<InvocationReport, tokio::task::JoinError> {
        self.task.await
    }
}

impl std::fmt::Debug for InvocationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationHandle")
            .field("id", &self.id)
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Launches tool invocations with per-platform candidate fallback.
#[derive(Clone)]
pub struct FallbackSpawner {
    table: Arc<CandidateTable>,
    platform: Platform,
    sink: Arc<dyn EventSink>,
    bus: Arc<EventBus>,
    cancel_grace: Duration,
    drain_timeout: Duration,
    active: ActiveMap,
}

impl FallbackSpawner {
    /// Spawner using the built-in table, the host platform, the global bus
    /// and timings from `ESPBRIDGE_*` overrides (defaults when unset).
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        let settings = settings_from_env("spawner");
        Self {
            table: Arc::new(CandidateTable::builtin().clone()),
            platform: Platform::current(),
            sink,
            bus: get_event_bus(),
            cancel_grace: settings.cancel_grace(),
            drain_timeout: settings.drain_timeout(),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Replace the candidate table.
    #[must_use]
    pub fn with_table(mut self, table: CandidateTable) -> Self {
        self.table = Arc::new(table);
        self
    }

    /// Resolve candidates for `platform` instead of the host.
    #[must_use]
    pub const fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Publish to `bus` instead of the global bus.
    #[must_use]
    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = bus;
        self
    }

    /// Take cancellation and drain timings from `settings`.
    #[must_use]
    pub const fn with_settings(mut self, settings: &BridgeSettings) -> Self {
        self.cancel_grace = settings.cancel_grace();
        self.drain_timeout = settings.drain_timeout();
        self
    }

    pub fn table(&self) -> &CandidateTable {
        &self.table
    }

    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// Start an invocation. Must be called within a tokio runtime.
    ///
    /// Empty-string arguments are dropped before launching.
    pub fn execute<I, S>(&self, logical_name: &str, args: I) -> InvocationHandle
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let candidates = self.table.resolve(logical_name, self.platform);
        let invocation = Invocation::new(logical_name, args, candidates);
        let id = invocation.id();
        let token = CancellationToken::new();
        let (private_tx, events) = mpsc::unbounded_channel();

        let summary = InvocationSummary {
            id,
            logical_name: logical_name.to_string(),
            args: invocation.args().to_vec(),
            started_at: Utc::now(),
        };
        self.active_map().insert(
            id,
            ActiveInvocation {
                summary,
                token: token.clone(),
            },
        );

        info!(
            invocation = %id,
            tool = %logical_name,
            candidates = %invocation.candidates(),
            "Starting tool invocation"
        );

        let runner = InvocationRunner {
            emitter: InvocationEmitter::new(
                id,
                Arc::clone(&self.bus),
                private_tx,
                Arc::clone(&self.sink),
            ),
            token: token.clone(),
            cancel_grace: self.cancel_grace,
            drain_timeout: self.drain_timeout,
        };
        let active = Arc::clone(&self.active);
        let task = tokio::spawn(async move {
            let report = runner.run(invocation).await;
            active
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&report.id);
            report
        });

        InvocationHandle {
            id,
            events,
            token,
            task,
        }
    }

    /// Cancel a running invocation by id. Returns `false` if it is unknown
    /// or already finished.
    pub fn cancel(&self, id: InvocationId) -> bool {
        match self.active_map().get(&id) {
            Some(active) => {
                active.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Invocations that have not finished yet.
    pub fn active_invocations(&self) -> Vec<InvocationSummary> {
        let mut list: Vec<_> = self
            .active_map()
            .values()
            .map(|active| active.summary.clone())
            .collect();
        list.sort_by_key(|summary| summary.started_at);
        list
    }

    fn active_map(&self) -> std::sync::MutexGuard<'_, HashMap<InvocationId, ActiveInvocation>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for FallbackSpawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackSpawner")
            .field("platform", &self.platform)
            .field("cancel_grace", &self.cancel_grace)
            .field("drain_timeout", &self.drain_timeout)
            .finish_non_exhaustive()
    }
}

/// State moved into the invocation task.
struct InvocationRunner {
    emitter: InvocationEmitter,
    token: CancellationToken,
    cancel_grace: Duration,
    drain_timeout: Duration,
}

impl InvocationRunner {
    async fn run(self, mut invocation: Invocation) -> InvocationReport {
        let id = invocation.id();

        while let Some(candidate) = invocation.current_candidate().map(str::to_owned) {
            // Only launch failures loop back here, so nothing has launched yet
            if self.token.is_cancelled() {
                info!(invocation = %id, "Invocation cancelled before launch");
                invocation.mark_cancelled();
                self.emitter
                    .emit(ProcessEventKind::Close(ExitInfo::cancelled(None, None)));
                break;
            }

            let outcome = self.attempt(id, &candidate, invocation.args()).await;
            let failure = match &outcome {
                AttemptOutcome::LaunchFailed { not_found, message } => {
                    Some((*not_found, message.clone()))
                }
                _ => None,
            };

            if invocation.record(outcome) {
                debug!(invocation = %id, %candidate, "Launch failed, trying next candidate");
                continue;
            }

            if let Some((not_found, message)) = failure {
                warn!(invocation = %id, %candidate, "{message}");
                self.emitter.append_line(&message);
                self.emitter.emit(ProcessEventKind::Error(ProcessFailure {
                    kind: if not_found {
                        ProcessFailureKind::LaunchNotFound
                    } else {
                        ProcessFailureKind::LaunchFailed
                    },
                    candidate,
                    message,
                }));
            }
            break;
        }

        InvocationReport {
            id,
            logical_name: invocation.logical_name().to_string(),
            outcome: invocation.outcome(),
            attempts: invocation.attempts().to_vec(),
        }
    }

    /// Run one candidate to completion and emit its terminal event.
    async fn attempt(&self, id: InvocationId, candidate: &str, args: &[String]) -> AttemptOutcome {
        let mut cmd = Command::new(candidate);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return AttemptOutcome::LaunchFailed {
                    not_found: e.kind() == std::io::ErrorKind::NotFound,
                    message: format!("failed to launch {candidate}: {e}"),
                };
            }
        };
        info!(invocation = %id, %candidate, pid = ?child.id(), "Tool launched");

        let readers: Vec<JoinHandle<()>> = [
            child
                .stdout
                .take()
                .map(|out| spawn_line_forwarder(out, StreamKind::Stdout, self.emitter.clone())),
            child
                .stderr
                .take()
                .map(|err| spawn_line_forwarder(err, StreamKind::Stderr, self.emitter.clone())),
        ]
        .into_iter()
        .flatten()
        .collect();

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            () = self.token.cancelled() => None,
        };

        let outcome = match waited {
            Some(Ok(status)) => AttemptOutcome::Exited(exit_info(status, false)),
            Some(Err(e)) => AttemptOutcome::RuntimeError {
                message: format!("failed while running {candidate}: {e}"),
            },
            None => {
                info!(invocation = %id, %candidate, "Cancelling tool");
                match shutdown_child(&mut child, self.cancel_grace).await {
                    Ok(status) => AttemptOutcome::Cancelled(exit_info(status, true)),
                    Err(e) => {
                        warn!(invocation = %id, %candidate, error = %e, "Failed to stop cancelled tool");
                        AttemptOutcome::Cancelled(ExitInfo::cancelled(None, None))
                    }
                }
            }
        };

        self.drain(id, readers).await;

        match &outcome {
            AttemptOutcome::Exited(info) | AttemptOutcome::Cancelled(info) => {
                info!(invocation = %id, %candidate, "Tool finished: {info}");
                self.emitter.emit(ProcessEventKind::Close(info.clone()));
            }
            AttemptOutcome::RuntimeError { message } => {
                warn!(invocation = %id, %candidate, "{message}");
                self.emitter.append_line(message);
                self.emitter.emit(ProcessEventKind::Error(ProcessFailure {
                    kind: ProcessFailureKind::Runtime,
                    candidate: candidate.to_string(),
                    message: message.clone(),
                }));
            }
            AttemptOutcome::LaunchFailed { .. } => {}
        }
        outcome
    }

    /// Wait for the output readers so every line precedes the terminal
    /// event. Readers still blocked after the drain timeout (e.g. a
    /// grandchild holding the pipe open) are aborted.
    async fn drain(&self, id: InvocationId, readers: Vec<JoinHandle<()>>) {
        let deadline = tokio::time::Instant::now() + self.drain_timeout;
        for mut reader in readers {
            if tokio::time::timeout_at(deadline, &mut reader).await.is_err() {
                debug!(invocation = %id, "Output reader did not finish in time, aborting");
                reader.abort();
            }
        }
    }
}

fn exit_info(status: ExitStatus, cancelled: bool) -> ExitInfo {
    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    };
    #[cfg(not(unix))]
    let signal = None;

    if cancelled {
        ExitInfo::cancelled(status.code(), signal)
    } else {
        ExitInfo::exited(status.code(), signal)
    }
}
