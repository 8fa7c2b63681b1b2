//! Property-based tests for the frame decoder
//!
//! - Splitting a byte stream at arbitrary offsets never changes the decoded
//!   event sequence
//! - A malformed significant line stops decoding; nothing after it is yielded

use crate::{decode::FrameDecoder, events::StreamEvent};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Text including multi-byte characters, quotes and escapes
fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 _.!?,]{0,40}",
        "[\u{00a7}\u{0939}\u{4e2d}\u{1f600}\"\\\\ a-z]{0,20}",
    ]
}

fn arb_event() -> impl Strategy<Value = StreamEvent> {
    prop_oneof![
        arb_text().prop_map(|content| StreamEvent::Token { content }),
        ("[a-z0-9]{1,6}", arb_text()).prop_map(|(agent_id, instructions)| {
            StreamEvent::SubagentStart {
                agent_id,
                instructions,
            }
        }),
        ("[a-z0-9]{1,6}", proptest::option::of(arb_text()))
            .prop_map(|(agent_id, result)| StreamEvent::SubagentEnd { agent_id, result }),
        Just(StreamEvent::Done),
    ]
}

/// Noise lines the decoder must skip
fn arb_noise() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just(": ping".to_string()),
        Just("event: message".to_string()),
        "[a-z ]{1,10}",
    ]
}

/// A record stream plus the events it should decode to
fn arb_stream() -> impl Strategy<Value = (Vec<u8>, Vec<StreamEvent>)> {
    proptest::collection::vec((arb_event(), arb_noise(), any::<bool>()), 0..12).prop_map(
        |items| {
            let mut bytes = Vec::new();
            let mut events = Vec::new();
            for (event, noise, crlf) in items {
                let newline: &[u8] = if crlf { b"\r\n" } else { b"\n" };
                bytes.extend_from_slice(b"data: ");
                bytes.extend_from_slice(serde_json::to_string(&event).unwrap().as_bytes());
                bytes.extend_from_slice(newline);
                bytes.extend_from_slice(noise.as_bytes());
                bytes.extend_from_slice(newline);
                events.push(event);
            }
            (bytes, events)
        },
    )
}

fn decode_chunks(bytes: &[u8], cuts: &[usize]) -> (Vec<StreamEvent>, bool) {
    let mut decoder = FrameDecoder::new();
    let mut out = Vec::new();
    let mut start = 0;
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
    points.sort_unstable();
    points.push(bytes.len());

    for end in points {
        decoder.push(&bytes[start..end]);
        start = end;
        loop {
            match decoder.next_frame() {
                Ok(Some(event)) => out.push(event),
                Ok(None) => break,
                Err(_) => return (out, true),
            }
        }
    }
    (out, false)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn chunk_boundaries_do_not_change_events(
        (bytes, expected) in arb_stream(),
        cuts in proptest::collection::vec(any::<usize>(), 0..16),
    ) {
        let (whole, whole_failed) = decode_chunks(&bytes, &[]);
        let (split, split_failed) = decode_chunks(&bytes, &cuts);
        prop_assert!(!whole_failed);
        prop_assert!(!split_failed);
        prop_assert_eq!(&whole, &expected);
        prop_assert_eq!(&split, &expected);
    }

    #[test]
    fn byte_at_a_time_matches_whole((bytes, expected) in arb_stream()) {
        let cuts: Vec<usize> = (0..bytes.len()).collect();
        let (split, failed) = decode_chunks(&bytes, &cuts);
        prop_assert!(!failed);
        prop_assert_eq!(split, expected);
    }

    #[test]
    fn malformed_line_halts_decoding(
        (before, before_events) in arb_stream(),
        (after, _) in arb_stream(),
        cuts in proptest::collection::vec(any::<usize>(), 0..8),
    ) {
        let mut bytes = before;
        bytes.extend_from_slice(b"data: {\"type\":\"token\",\"content\":\n");
        bytes.extend_from_slice(&after);

        let (events, failed) = decode_chunks(&bytes, &cuts);
        prop_assert!(failed);
        prop_assert_eq!(events, before_events);
    }
}
