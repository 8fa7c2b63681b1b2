//! Conversation reducer
//!
//! `(conversation, event, now) -> conversation`. The reducer never fails:
//! events it cannot place (unknown types, unknown agents, tokens with nowhere
//! to go) leave the turns untouched and bump a [`Diagnostics`] counter.
//!
//! [`Diagnostics`]: crate::conversation::Diagnostics

use std::time::Duration;

use themis_wire::{NestedEvent, StreamEvent, summary};

use crate::conversation::{Conversation, SubAgentTurn, ToolCall, Turn};

/// A tool call resolved more than this long after it started is flagged
pub const TOOL_TIMEOUT: Duration = Duration::from_secs(20);

/// Feature switches for the reducer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducerConfig {
    /// Track sub-agent blocks. When off, only `token` events have an effect.
    pub subagents: bool,
    /// Threshold for [`ToolCall::timed_out`]
    pub tool_timeout: Duration,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            subagents: true,
            tool_timeout: TOOL_TIMEOUT,
        }
    }
}

/// Applies stream events to a conversation
#[derive(Debug, Clone, Default)]
pub struct Reducer {
    config: ReducerConfig,
}

impl Reducer {
    pub fn new(config: ReducerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReducerConfig {
        &self.config
    }

    /// Fold one event into the conversation. `now` is Unix millis.
    pub fn apply(&self, mut state: Conversation, event: &StreamEvent, now: i64) -> Conversation {
        match event {
            StreamEvent::Token { content } => {
                if !state.append_assistant_text(content) {
                    tracing::debug!("Dropping token: no active assistant turn");
                    state.diagnostics_mut().dropped_tokens += 1;
                }
            }
            StreamEvent::SubagentStart {
                agent_id,
                instructions,
            } if self.config.subagents => {
                tracing::debug!("Sub-agent {} started", agent_id);
                state.push(Turn::SubAgent(SubAgentTurn::new(
                    agent_id.as_str(),
                    instructions.as_str(),
                )));
            }
            StreamEvent::SubagentEvent { agent_id, event } if self.config.subagents => {
                self.apply_nested(&mut state, agent_id, event, now);
            }
            StreamEvent::SubagentEnd { agent_id, result } if self.config.subagents => {
                self.apply_end(&mut state, agent_id, result.as_deref());
            }
            StreamEvent::Done => {
                tracing::debug!("Backend signalled done");
            }
            other => {
                tracing::debug!("Ignoring {} event", other.kind());
                state.diagnostics_mut().ignored_events += 1;
            }
        }
        state
    }

    fn apply_nested(&self, state: &mut Conversation, agent_id: &str, event: &NestedEvent, now: i64) {
        let Some(index) = state.owner_of(agent_id) else {
            tracing::warn!("Event for unknown or finished sub-agent {}", agent_id);
            state.diagnostics_mut().unmatched_agent_events += 1;
            return;
        };

        match event {
            NestedEvent::ToolStart { name, input } => {
                if let Some(sa) = state.running_subagent_mut(index) {
                    sa.tool_calls
                        .push(ToolCall::start(name.as_str(), summary::input_summary(input), now));
                }
            }
            NestedEvent::ToolEnd { output } => {
                let timeout = self.timeout_millis();
                match state
                    .running_subagent_mut(index)
                    .and_then(SubAgentTurn::open_call_mut)
                {
                    Some(call) => call.resolve(summary::output_summary(output), now, timeout),
                    None => {
                        tracing::warn!("tool_end for sub-agent {} with no open tool call", agent_id);
                        state.diagnostics_mut().unmatched_tool_ends += 1;
                    }
                }
            }
            NestedEvent::Token { content } => {
                if let Some(sa) = state.running_subagent_mut(index) {
                    sa.result_text.push_str(content);
                }
            }
            NestedEvent::Unknown => {
                tracing::debug!("Ignoring unknown nested event for sub-agent {}", agent_id);
                state.diagnostics_mut().ignored_events += 1;
            }
        }
    }

    fn apply_end(&self, state: &mut Conversation, agent_id: &str, result: Option<&str>) {
        let completed = state
            .owner_of(agent_id)
            .is_some_and(|index| state.complete_subagent(index, result));
        if !completed {
            tracing::warn!("subagent_end for unknown or finished sub-agent {}", agent_id);
            state.diagnostics_mut().unmatched_agent_events += 1;
            return;
        }

        tracing::debug!(
            "Sub-agent {} complete, {} still running",
            agent_id,
            state.running_subagents()
        );

        // The planner resumes once every sub-agent has reported back
        if state.all_subagents_complete() && !state.last().is_some_and(Turn::is_assistant) {
            state.push(Turn::assistant(""));
        }
    }

    fn timeout_millis(&self) -> i64 {
        i64::try_from(self.config.tool_timeout.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Fold one event with the default configuration
pub fn apply(state: Conversation, event: &StreamEvent, now: i64) -> Conversation {
    Reducer::default().apply(state, event, now)
}
