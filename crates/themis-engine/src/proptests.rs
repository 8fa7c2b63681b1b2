//! Property-based tests for the reducer
//!
//! - Tokens into an active assistant turn concatenate in order
//! - A tool call is flagged timed out iff it resolved strictly after the limit
//! - Completing every sub-agent appends exactly one assistant turn, whatever
//!   the end order and however many duplicate ends arrive
//! - The reducer never removes or reorders turns

use crate::{
    conversation::{Conversation, Turn},
    reducer::{Reducer, ReducerConfig, TOOL_TIMEOUT},
};
use proptest::prelude::*;
use serde_json::json;
use themis_wire::{NestedEvent, StreamEvent};

// ============================================================================
// Strategies
// ============================================================================

fn arb_agent() -> impl Strategy<Value = String> {
    prop_oneof![Just("a1"), Just("a2"), Just("a3")].prop_map(String::from)
}

fn arb_nested() -> impl Strategy<Value = NestedEvent> {
    prop_oneof![
        "[a-z]{1,6}".prop_map(|name| NestedEvent::ToolStart {
            name,
            input: json!({"command": "ls"}),
        }),
        Just(NestedEvent::ToolEnd {
            output: json!({"output": "ok"}),
        }),
        "[a-z ]{0,8}".prop_map(|content| NestedEvent::Token { content }),
        Just(NestedEvent::Unknown),
    ]
}

fn arb_event() -> impl Strategy<Value = StreamEvent> {
    prop_oneof![
        "[a-z ]{0,8}".prop_map(|content| StreamEvent::Token { content }),
        arb_agent().prop_map(|agent_id| StreamEvent::SubagentStart {
            agent_id,
            instructions: String::new(),
        }),
        (arb_agent(), arb_nested())
            .prop_map(|(agent_id, event)| StreamEvent::SubagentEvent { agent_id, event }),
        (arb_agent(), proptest::option::of("[a-z]{0,4}"))
            .prop_map(|(agent_id, result)| StreamEvent::SubagentEnd { agent_id, result }),
        Just(StreamEvent::Done),
        Just(StreamEvent::Unknown),
    ]
}

fn seeded() -> Conversation {
    let mut conv = Conversation::new();
    conv.push(Turn::user("q"));
    conv.push(Turn::assistant(""));
    conv
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn tokens_concatenate(tokens in proptest::collection::vec("[a-zA-Z \u{4e2d}]{0,6}", 0..20)) {
        let reducer = Reducer::default();
        let mut conv = seeded();
        for content in &tokens {
            conv = reducer.apply(conv, &StreamEvent::Token { content: content.clone() }, 0);
        }
        prop_assert_eq!(conv.len(), 2);
        prop_assert_eq!(conv.last().unwrap().text(), tokens.concat());
        prop_assert_eq!(conv.diagnostics().dropped_tokens, 0);
    }

    #[test]
    fn timeout_is_strictly_greater_than_limit(
        started in 0i64..1_000_000,
        elapsed in 0i64..60_000,
    ) {
        let reducer = Reducer::new(ReducerConfig::default());
        let mut conv = seeded();
        let start = StreamEvent::SubagentStart { agent_id: "a1".into(), instructions: String::new() };
        conv = reducer.apply(conv, &start, started);
        let tool_start = StreamEvent::SubagentEvent {
            agent_id: "a1".into(),
            event: NestedEvent::ToolStart { name: "t".into(), input: json!(null) },
        };
        conv = reducer.apply(conv, &tool_start, started);
        let tool_end = StreamEvent::SubagentEvent {
            agent_id: "a1".into(),
            event: NestedEvent::ToolEnd { output: json!({"output": "x"}) },
        };
        conv = reducer.apply(conv, &tool_end, started + elapsed);

        let call = &conv.get(2).unwrap().as_subagent().unwrap().tool_calls[0];
        prop_assert!(call.is_complete());
        let limit = TOOL_TIMEOUT.as_millis() as i64;
        prop_assert_eq!(call.timed_out, elapsed > limit);
    }

    #[test]
    fn completing_all_subagents_appends_one_assistant(
        order in Just(vec!["a1", "a2", "a3"]).prop_shuffle(),
        duplicates in proptest::collection::vec(0usize..3, 0..4),
    ) {
        let reducer = Reducer::default();
        let mut conv = seeded();
        for id in ["a1", "a2", "a3"] {
            let start = StreamEvent::SubagentStart { agent_id: id.into(), instructions: String::new() };
            conv = reducer.apply(conv, &start, 0);
        }
        for id in &order {
            let end = StreamEvent::SubagentEnd { agent_id: (*id).into(), result: None };
            conv = reducer.apply(conv, &end, 0);
        }
        for i in &duplicates {
            let end = StreamEvent::SubagentEnd { agent_id: order[*i].into(), result: Some("late".into()) };
            conv = reducer.apply(conv, &end, 0);
        }

        prop_assert_eq!(conv.len(), 6);
        prop_assert!(conv.all_subagents_complete());
        prop_assert_eq!(conv.last(), Some(&Turn::assistant("")));
        prop_assert!(conv.subagents().all(|sa| sa.result_text.is_empty()));
        prop_assert_eq!(conv.diagnostics().unmatched_agent_events, duplicates.len() as u64);
    }

    #[test]
    fn turns_are_never_removed_or_reordered(
        events in proptest::collection::vec(arb_event(), 0..40),
        subagents in any::<bool>(),
    ) {
        let reducer = Reducer::new(ReducerConfig { subagents, ..Default::default() });
        let mut conv = seeded();
        for (now, event) in events.iter().enumerate() {
            let before: Vec<Turn> = conv.turns().iter().map(|t| t.as_ref().clone()).collect();
            conv = reducer.apply(conv, event, now as i64);

            prop_assert!(conv.len() >= before.len());
            for (old, new) in before.iter().zip(conv.turns()) {
                // Same kind in the same slot
                prop_assert_eq!(std::mem::discriminant(old), std::mem::discriminant(new.as_ref()));
                if let (Turn::SubAgent(a), Turn::SubAgent(b)) = (old, new.as_ref()) {
                    prop_assert_eq!(&a.agent_id, &b.agent_id);
                    prop_assert!(b.tool_calls.len() >= a.tool_calls.len());
                    if a.is_complete {
                        prop_assert_eq!(a, b);
                    }
                }
            }
            if !subagents {
                prop_assert_eq!(conv.len(), 2);
            }
        }
    }
}
