//! Line-oriented transcript renderer
//!
//! Diffs consecutive snapshots and prints only what changed: assistant text
//! deltas inline, sub-agent lifecycle and tool calls as tagged lines.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use themis_engine::{Snapshot, SnapshotConsumer, SubAgentTurn, Turn};

use crate::utils::preview;

/// Turns a pair of snapshots into terminal output
pub struct Renderer {
    tool_timeout_secs: u64,
    /// Last write did not end in a newline
    mid_line: bool,
}

impl Renderer {
    pub fn new(tool_timeout_secs: u64) -> Self {
        Self {
            tool_timeout_secs,
            mid_line: false,
        }
    }

    /// Render everything in `next` that is not already in `prev`
    pub fn render(&mut self, prev: &Snapshot, next: &Snapshot) -> String {
        let mut out = String::new();

        for (i, turn) in next.turns.iter().enumerate() {
            let old = prev.turns.get(i);
            if old.is_some_and(|o| Arc::ptr_eq(o, turn) || o == turn) {
                continue;
            }
            let old = old.map(Arc::as_ref);

            match turn.as_ref() {
                // Already on screen: the user typed it
                Turn::User { .. } => {}
                Turn::Assistant { text } => {
                    let seen = match old {
                        Some(Turn::Assistant { text }) => text.as_str(),
                        _ => "",
                    };
                    self.write_inline(&mut out, text.strip_prefix(seen).unwrap_or(text));
                }
                Turn::SubAgent(sa) => {
                    let old = match old {
                        Some(Turn::SubAgent(o)) if o.agent_id == sa.agent_id => Some(o),
                        _ => None,
                    };
                    self.render_subagent(&mut out, old, sa);
                }
                Turn::Error { message } => self.write_line(&mut out, message),
            }
        }

        if next.phase.is_terminal() && prev.phase != next.phase {
            self.break_line(&mut out);
        }
        out
    }

    fn render_subagent(&mut self, out: &mut String, old: Option<&SubAgentTurn>, sa: &SubAgentTurn) {
        let id = &sa.agent_id;
        if old.is_none() {
            let line = if sa.instructions.is_empty() {
                format!("[{}] started", id)
            } else {
                format!("[{}] started: {}", id, preview(&sa.instructions, 100))
            };
            self.write_line(out, &line);
        }

        for (j, call) in sa.tool_calls.iter().enumerate() {
            let before = old.and_then(|o| o.tool_calls.get(j));
            if before.is_none() {
                self.write_line(
                    out,
                    &format!("[{}]   -> {} {}", id, call.name, preview(&call.input_summary, 80)),
                );
            }
            let newly_resolved = before.is_none_or(|b| b.is_open());
            if let Some(output) = call.output_summary.as_deref().filter(|_| newly_resolved) {
                self.write_line(
                    out,
                    &format!("[{}]   <- {} {}", id, call.name, preview(output, 80)),
                );
                if call.timed_out {
                    self.write_line(
                        out,
                        &format!(
                            "[{}]   ! {} took longer than {} seconds",
                            id, call.name, self.tool_timeout_secs
                        ),
                    );
                }
            }
        }

        if sa.is_complete && !old.is_some_and(|o| o.is_complete) {
            let line = if sa.result_text.is_empty() {
                format!("[{}] done", id)
            } else {
                format!("[{}] done: {}", id, preview(&sa.result_text, 200))
            };
            self.write_line(out, &line);
        }
    }

    fn write_inline(&mut self, out: &mut String, text: &str) {
        if text.is_empty() {
            return;
        }
        out.push_str(text);
        self.mid_line = !text.ends_with('\n');
    }

    fn write_line(&mut self, out: &mut String, line: &str) {
        self.break_line(out);
        out.push_str(line);
        out.push('\n');
    }

    fn break_line(&mut self, out: &mut String) {
        if self.mid_line {
            out.push('\n');
            self.mid_line = false;
        }
    }
}

/// Prints each snapshot's changes to stdout
pub struct TranscriptPrinter {
    state: Mutex<(Renderer, Snapshot)>,
}

impl TranscriptPrinter {
    pub fn new(renderer: Renderer) -> Self {
        Self {
            state: Mutex::new((renderer, Snapshot::default())),
        }
    }
}

impl SnapshotConsumer for TranscriptPrinter {
    fn on_snapshot(&self, snapshot: &Snapshot) {
        let mut state = self.state.lock();
        let (renderer, prev) = &mut *state;
        let out = renderer.render(prev, snapshot);
        *prev = snapshot.clone();

        if !out.is_empty() {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = stdout.write_all(out.as_bytes()).and_then(|_| stdout.flush()) {
                tracing::debug!("Failed to write transcript: {}", e);
            }
        }
    }
}
