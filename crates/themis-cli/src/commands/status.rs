//! /status command - request state and stream diagnostics

use super::CommandResult;
use themis_engine::{Phase, Snapshot};

pub struct StatusCommand;

impl StatusCommand {
    pub fn execute(snapshot: &Snapshot, backend: &str) -> CommandResult {
        let running = snapshot
            .turns
            .iter()
            .filter_map(|t| t.as_subagent())
            .filter(|sa| !sa.is_complete)
            .count();
        let d = &snapshot.diagnostics;

        let mut out = format!(
            "Backend:    {}\nState:      {}\nTurns:      {}\nSub-agents: {} running\n",
            backend,
            phase_name(snapshot.phase),
            snapshot.turns.len(),
            running
        );
        if d.total() > 0 {
            out.push_str(&format!(
                "\nStream diagnostics:\n  dropped tokens:          {}\n  unmatched agent events:  {}\n  unmatched tool ends:     {}\n  ignored events:          {}",
                d.dropped_tokens, d.unmatched_agent_events, d.unmatched_tool_ends, d.ignored_events
            ));
        }
        CommandResult::Message(out.trim_end().to_string())
    }
}

fn phase_name(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "idle",
        Phase::Sending => "sending",
        Phase::Streaming => "streaming",
        Phase::Completed => "completed",
        Phase::Failed => "failed",
    }
}
