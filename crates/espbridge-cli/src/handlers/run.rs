//! Run command handler.
//!
//! Executes a tool through the fallback spawner. Output lines reach the
//! terminal through the context's sink; this handler only watches the
//! invocation's events and turns the report into an exit code.

use anyhow::Result;
use espbridge_core::{InvocationOutcome, ProcessEventKind};
use espbridge_runtime::InvocationReport;
use tokio::signal;
use tracing::{debug, info};

use crate::bootstrap::CliContext;
use crate::error::{EXIT_INTERRUPTED, EXIT_NOT_LAUNCHED};

/// Execute the run command and return the process exit code.
///
/// Ctrl-C cancels the invocation; the handler still waits for the child to
/// be terminated before returning.
pub async fn execute(ctx: &CliContext, tool: &str, args: &[String]) -> Result<i32> {
    let mut handle = ctx.spawner.execute(tool, args.iter().cloned());
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = handle.next_event() => {
                let Some(event) = event else { break };
                if let ProcessEventKind::Close(info) = &event.kind {
                    debug!(invocation = %event.invocation, status = %info, "Tool finished");
                }
            }
            result = &mut ctrl_c, if !interrupted => {
                result?;
                info!(invocation = %handle.id(), "Interrupted, cancelling");
                interrupted = true;
                handle.cancel();
            }
        }
    }

    let report = handle.wait().await?;
    Ok(exit_code(&report, interrupted))
}

/// Exit code for a finished invocation.
///
/// The tool's own code when it exited, `128 + signal` when a signal killed
/// it, 127 when no candidate started, 130 after Ctrl-C.
pub fn exit_code(report: &InvocationReport, interrupted: bool) -> i32 {
    if interrupted {
        return EXIT_INTERRUPTED;
    }
    match report.outcome {
        InvocationOutcome::Exhausted => EXIT_NOT_LAUNCHED,
        InvocationOutcome::Cancelled => EXIT_INTERRUPTED,
        InvocationOutcome::Succeeded | InvocationOutcome::Pending => report
            .exit()
            .and_then(|info| info.code.or_else(|| info.signal.map(|signal| 128 + signal)))
            .unwrap_or(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use espbridge_core::{Attempt, AttemptOutcome, ExitInfo, InvocationId};

    fn report(outcome: InvocationOutcome, attempts: Vec<Attempt>) -> InvocationReport {
        InvocationReport {
            id: InvocationId::new(),
            logical_name: "esptool".to_string(),
            outcome,
            attempts,
        }
    }

    fn attempt(outcome: AttemptOutcome) -> Attempt {
        Attempt {
            candidate: "esptool.py".to_string(),
            outcome,
        }
    }

    #[test]
    fn test_exit_code_is_tool_code() {
        let finished = report(
            InvocationOutcome::Succeeded,
            vec![attempt(AttemptOutcome::Exited(ExitInfo::exited(Some(2), None)))],
        );
        assert_eq!(exit_code(&finished, false), 2);
    }

    #[test]
    fn test_exit_code_for_signal() {
        let killed = report(
            InvocationOutcome::Succeeded,
            vec![attempt(AttemptOutcome::Exited(ExitInfo::exited(None, Some(9))))],
        );
        assert_eq!(exit_code(&killed, false), 137);
    }

    #[test]
    fn test_exit_code_when_nothing_launched() {
        let exhausted = report(
            InvocationOutcome::Exhausted,
            vec![attempt(AttemptOutcome::LaunchFailed {
                not_found: true,
                message: "not found".to_string(),
            })],
        );
        assert_eq!(exit_code(&exhausted, false), EXIT_NOT_LAUNCHED);
    }

    #[test]
    fn test_exit_code_after_interrupt() {
        let cancelled = report(
            InvocationOutcome::Succeeded,
            vec![attempt(AttemptOutcome::Cancelled(ExitInfo::cancelled(
                None,
                Some(15),
            )))],
        );
        assert_eq!(exit_code(&cancelled, true), EXIT_INTERRUPTED);
    }

    #[test]
    fn test_runtime_failure_is_generic_error() {
        let failed = report(
            InvocationOutcome::Succeeded,
            vec![attempt(AttemptOutcome::RuntimeError {
                message: "wait failed".to_string(),
            })],
        );
        assert_eq!(exit_code(&failed, false), 1);
    }
}
