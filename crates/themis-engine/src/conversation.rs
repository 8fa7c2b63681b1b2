//! Conversation state: turns, sub-agent ownership index, and diagnostics.

use std::{collections::HashMap, sync::Arc};

use serde::Serialize;

/// One tool invocation made by a sub-agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCall {
    pub name: String,
    pub input_summary: String,
    /// `None` while the call is still open
    pub output_summary: Option<String>,
    /// Unix millis at which the `tool_start` was applied
    pub started_at: i64,
    /// Fixed when the call is resolved, never recomputed
    pub timed_out: bool,
}

impl ToolCall {
    pub fn start(name: impl Into<String>, input_summary: impl Into<String>, started_at: i64) -> Self {
        Self {
            name: name.into(),
            input_summary: input_summary.into(),
            output_summary: None,
            started_at,
            timed_out: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.output_summary.is_none()
    }

    pub fn is_complete(&self) -> bool {
        !self.is_open()
    }

    /// Close the call. `timed_out` is strictly greater-than: resolving exactly
    /// at the limit is not a timeout.
    pub(crate) fn resolve(&mut self, output_summary: String, now: i64, timeout_millis: i64) {
        self.output_summary = Some(output_summary);
        self.timed_out = now.saturating_sub(self.started_at) > timeout_millis;
    }
}

/// A sub-agent block in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubAgentTurn {
    pub agent_id: String,
    pub instructions: String,
    pub tool_calls: Vec<ToolCall>,
    pub result_text: String,
    pub is_complete: bool,
}

impl SubAgentTurn {
    pub fn new(agent_id: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            instructions: instructions.into(),
            tool_calls: Vec::new(),
            result_text: String::new(),
            is_complete: false,
        }
    }

    /// Newest call that has not been resolved yet
    pub fn open_call(&self) -> Option<&ToolCall> {
        self.tool_calls.iter().rev().find(|c| c.is_open())
    }

    pub(crate) fn open_call_mut(&mut self) -> Option<&mut ToolCall> {
        self.tool_calls.iter_mut().rev().find(|c| c.is_open())
    }
}

/// One displayed unit of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    User { text: String },
    Assistant { text: String },
    SubAgent(SubAgentTurn),
    /// Shown in place of the assistant reply when a request fails
    Error { message: String },
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Turn::User { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Turn::Assistant { text: text.into() }
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Turn::Assistant { .. })
    }

    pub fn as_subagent(&self) -> Option<&SubAgentTurn> {
        match self {
            Turn::SubAgent(sa) => Some(sa),
            _ => None,
        }
    }

    /// Main display text of the turn
    pub fn text(&self) -> &str {
        match self {
            Turn::User { text } | Turn::Assistant { text } => text,
            Turn::SubAgent(sa) => &sa.result_text,
            Turn::Error { message } => message,
        }
    }
}

/// Counters for events the reducer could not place. None of these change the
/// conversation; they exist so backend desyncs are visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// `token` with no active assistant turn
    pub dropped_tokens: u64,
    /// Sub-agent event for an agent with no running turn
    pub unmatched_agent_events: u64,
    /// `tool_end` when the owning turn has no open call
    pub unmatched_tool_ends: u64,
    /// Unknown or disabled event types
    pub ignored_events: u64,
}

impl Diagnostics {
    pub fn total(&self) -> u64 {
        self.dropped_tokens + self.unmatched_agent_events + self.unmatched_tool_ends + self.ignored_events
    }
}

/// Ordered turns plus an index from agent id to the positions of its turns.
///
/// Turns are stored behind `Arc` so cloning a conversation (for a snapshot)
/// copies pointers, and mutating one turn only copies that turn.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Arc<Turn>>,
    /// Positions in ascending order; ids may repeat across the conversation
    agents: HashMap<String, Vec<usize>>,
    running: usize,
    diagnostics: Diagnostics,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Arc<Turn>] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Turn> {
        self.turns.get(index).map(|t| t.as_ref())
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last().map(|t| t.as_ref())
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub(crate) fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Number of sub-agent turns still running
    pub fn running_subagents(&self) -> usize {
        self.running
    }

    pub fn all_subagents_complete(&self) -> bool {
        self.running == 0
    }

    pub fn subagents(&self) -> impl Iterator<Item = &SubAgentTurn> {
        self.turns.iter().filter_map(|t| t.as_subagent())
    }

    /// Append a turn and return its index
    pub fn push(&mut self, turn: Turn) -> usize {
        let index = self.turns.len();
        self.track(&turn, index);
        self.turns.push(Arc::new(turn));
        index
    }

    /// Replace the last turn, or append if the conversation is empty
    pub fn replace_last(&mut self, turn: Turn) {
        let Some(old) = self.turns.pop() else {
            self.push(turn);
            return;
        };
        let index = self.turns.len();
        if let Turn::SubAgent(sa) = old.as_ref() {
            if !sa.is_complete {
                self.running -= 1;
            }
            if let Some(positions) = self.agents.get_mut(&sa.agent_id) {
                positions.retain(|&p| p != index);
                if positions.is_empty() {
                    self.agents.remove(&sa.agent_id);
                }
            }
        }
        self.push(turn);
    }

    /// Append to the last turn's text if it is an assistant turn
    pub(crate) fn append_assistant_text(&mut self, content: &str) -> bool {
        let Some(last) = self.turns.last_mut() else {
            return false;
        };
        if !last.is_assistant() {
            return false;
        }
        if let Turn::Assistant { text } = Arc::make_mut(last) {
            text.push_str(content);
        }
        true
    }

    /// Index of the turn that owns events for `agent_id`: the newest matching
    /// turn that is still running.
    pub fn owner_of(&self, agent_id: &str) -> Option<usize> {
        self.agents.get(agent_id)?.iter().rev().copied().find(|&i| {
            self.turns[i]
                .as_subagent()
                .is_some_and(|sa| !sa.is_complete)
        })
    }

    /// Mutable access to a running sub-agent turn
    pub(crate) fn running_subagent_mut(&mut self, index: usize) -> Option<&mut SubAgentTurn> {
        let slot = self.turns.get_mut(index)?;
        match slot.as_ref() {
            Turn::SubAgent(sa) if !sa.is_complete => {}
            _ => return None,
        }
        match Arc::make_mut(slot) {
            Turn::SubAgent(sa) => Some(sa),
            _ => None,
        }
    }

    /// Mark a running sub-agent complete. Returns false if it was not running.
    pub(crate) fn complete_subagent(&mut self, index: usize, result: Option<&str>) -> bool {
        let Some(sa) = self.running_subagent_mut(index) else {
            return false;
        };
        sa.is_complete = true;
        if let Some(result) = result {
            sa.result_text = result.to_string();
        }
        self.running -= 1;
        true
    }

    fn track(&mut self, turn: &Turn, index: usize) {
        if let Turn::SubAgent(sa) = turn {
            self.agents.entry(sa.agent_id.clone()).or_default().push(index);
            if !sa.is_complete {
                self.running += 1;
            }
        }
    }
}
