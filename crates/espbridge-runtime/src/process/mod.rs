//! Tool invocation runtime.
//!
//! # Structure
//!
//! - `FallbackSpawner` - resolves a logical tool name and tries each
//!   candidate until one launches, streaming its output as events
//! - `InvocationHandle` - private event channel, cancellation and report
//!   for a single invocation
//! - `shutdown_child` - SIGTERM then kill, with reaping
//! - line forwarders that turn child stdout/stderr into events

mod shutdown;
mod spawner;
mod stream;

pub use shutdown::shutdown_child;
pub use spawner::{FallbackSpawner, InvocationHandle, InvocationReport, InvocationSummary};
