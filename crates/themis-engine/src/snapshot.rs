//! Immutable view handed to renderers after every applied event

use std::sync::Arc;

use crate::{
    conversation::{Conversation, Diagnostics, Turn},
    session::Phase,
};

/// What a renderer sees. Turns are shared with the engine; nothing here can
/// be mutated through a snapshot.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub turns: Vec<Arc<Turn>>,
    /// A request is in flight; new submissions will be rejected
    pub in_flight: bool,
    pub phase: Phase,
    pub diagnostics: Diagnostics,
}

/// Stable identity for diffing turns between snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnKey<'a> {
    Agent(&'a str),
    Index(usize),
}

impl Snapshot {
    pub(crate) fn capture(conversation: &Conversation, phase: Phase, in_flight: bool) -> Self {
        Self {
            turns: conversation.turns().to_vec(),
            in_flight,
            phase,
            diagnostics: *conversation.diagnostics(),
        }
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last().map(|t| t.as_ref())
    }

    /// Identity of each turn: the agent id for sub-agent blocks, the position
    /// otherwise.
    pub fn keys(&self) -> impl Iterator<Item = TurnKey<'_>> {
        self.turns.iter().enumerate().map(|(i, turn)| match turn.as_subagent() {
            Some(sa) => TurnKey::Agent(&sa.agent_id),
            None => TurnKey::Index(i),
        })
    }
}

/// Anything that wants to be told about every new snapshot
pub trait SnapshotConsumer: Send + Sync {
    fn on_snapshot(&self, snapshot: &Snapshot);
}

impl<F> SnapshotConsumer for F
where
    F: Fn(&Snapshot) + Send + Sync,
{
    fn on_snapshot(&self, snapshot: &Snapshot) {
        self(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::SubAgentTurn;

    #[test]
    fn test_keys() {
        let mut conv = Conversation::new();
        conv.push(Turn::user("q"));
        conv.push(Turn::SubAgent(SubAgentTurn::new("a1", "")));
        conv.push(Turn::assistant(""));
        let snapshot = Snapshot::capture(&conv, Phase::Streaming, true);
        let keys: Vec<_> = snapshot.keys().collect();
        assert_eq!(
            keys,
            vec![TurnKey::Index(0), TurnKey::Agent("a1"), TurnKey::Index(2)]
        );
    }

    #[test]
    fn test_snapshot_is_detached_from_later_changes() {
        let mut conv = Conversation::new();
        conv.push(Turn::assistant("a"));
        let snapshot = Snapshot::capture(&conv, Phase::Streaming, true);
        conv.append_assistant_text("b");
        assert_eq!(snapshot.last().unwrap().text(), "a");
        assert!(snapshot.in_flight);
    }

    #[test]
    fn test_closure_consumer() {
        let mut conv = Conversation::new();
        conv.push(Turn::user("q"));
        conv.push(Turn::assistant(""));
        let snapshot = Snapshot::capture(&conv, Phase::Sending, true);

        let seen = std::sync::Mutex::new(0usize);
        let consumer = |s: &Snapshot| *seen.lock().unwrap() += s.turns.len();
        consumer.on_snapshot(&snapshot);
        consumer.on_snapshot(&snapshot);
        assert_eq!(*seen.lock().unwrap(), 4);
    }
}
