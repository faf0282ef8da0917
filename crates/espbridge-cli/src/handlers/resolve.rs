//! Resolve command handler.

use espbridge_core::{CandidateList, Platform};

use crate::bootstrap::CliContext;
use crate::presentation::format_candidates;

/// Candidates tried for `tool` on `platform` (the host when `None`).
pub fn candidates(ctx: &CliContext, tool: &str, platform: Option<Platform>) -> CandidateList {
    let platform = platform.unwrap_or_else(|| ctx.spawner.platform());
    ctx.spawner.table().resolve(tool, platform)
}

/// Execute the resolve command.
pub fn execute(ctx: &CliContext, tool: &str, platform: Option<Platform>) {
    let target = platform.unwrap_or_else(|| ctx.spawner.platform());
    println!("{tool} on {target}:");
    for line in format_candidates(&candidates(ctx, tool, Some(target))) {
        println!("{line}");
    }
}
