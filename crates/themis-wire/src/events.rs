//! Event records emitted by the backend

use serde::{Deserialize, Serialize};

/// One decoded record from the backend stream.
///
/// Discriminated by the `type` field. Types this client does not know about
/// decode to [`StreamEvent::Unknown`] so newer backends keep working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Planner text fragment
    Token { content: String },

    /// A sub-agent was spawned
    SubagentStart {
        agent_id: String,
        #[serde(default)]
        instructions: String,
    },

    /// Something happened inside a running sub-agent
    SubagentEvent { agent_id: String, event: NestedEvent },

    /// A sub-agent finished
    SubagentEnd {
        agent_id: String,
        #[serde(default)]
        result: Option<String>,
    },

    /// Backend finished writing; sent as the last record of every stream
    Done,

    /// Any `type` this client does not recognize
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// The sub-agent this event is addressed to, if any
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            StreamEvent::SubagentStart { agent_id, .. }
            | StreamEvent::SubagentEvent { agent_id, .. }
            | StreamEvent::SubagentEnd { agent_id, .. } => Some(agent_id),
            _ => None,
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Token { .. } => "token",
            StreamEvent::SubagentStart { .. } => "subagent_start",
            StreamEvent::SubagentEvent { .. } => "subagent_event",
            StreamEvent::SubagentEnd { .. } => "subagent_end",
            StreamEvent::Done => "done",
            StreamEvent::Unknown => "unknown",
        }
    }
}

/// Event nested inside a `subagent_event` record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NestedEvent {
    /// Tool invocation started; `input` is free-form
    ToolStart {
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    /// Most recent open tool invocation finished; `output` is free-form
    ToolEnd {
        #[serde(default)]
        output: serde_json::Value,
    },

    /// Sub-agent text fragment
    Token { content: String },

    /// Any nested `type` this client does not recognize
    #[serde(other)]
    Unknown,
}
