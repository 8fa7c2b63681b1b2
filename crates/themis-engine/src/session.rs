//! Stream orchestration
//!
//! A [`Session`] owns the conversation. Each submission moves it through
//! `Idle -> Sending -> Streaming -> Completed | Failed`, folding every decoded
//! event through the reducer and publishing a fresh [`Snapshot`] after each
//! one. Only one request may be in flight at a time.

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    clock::{Clock, SystemClock},
    conversation::{Conversation, Turn},
    error::{Error, Result},
    handle::{InFlightGuard, SessionHandle},
    reducer::{Reducer, ReducerConfig},
    snapshot::{Snapshot, SnapshotConsumer},
    transport::Transport,
};

/// Shown in place of the assistant reply when a request fails
pub const FALLBACK_ERROR_MESSAGE: &str = "Error: could not reach backend.";

/// Lifecycle of the most recent request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Sending,
    Streaming,
    Completed,
    Failed,
}

impl Phase {
    /// Request in progress
    pub fn is_active(&self) -> bool {
        matches!(self, Phase::Sending | Phase::Streaming)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Reducer feature switches
    pub reducer: ReducerConfig,
    /// Text of the error turn shown when a request fails
    pub error_message: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reducer: ReducerConfig::default(),
            error_message: FALLBACK_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Why a submission was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Input was empty or whitespace
    Empty,
    /// Another request is still running
    InFlight,
}

/// Result of [`Session::submit`]
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Nothing was sent; the conversation is unchanged
    Rejected(RejectReason),
    /// Stream ended normally
    Completed,
    /// Request failed; the error turn is already in the conversation
    Failed(Error),
}

impl SubmitOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SubmitOutcome::Completed)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, SubmitOutcome::Rejected(_))
    }
}

/// The conversation and the single request that may be feeding it.
///
/// Cloning is cheap and clones share everything.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
    handle: SessionHandle,
}

struct Shared {
    reducer: Reducer,
    error_message: String,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
    snapshots: watch::Sender<Snapshot>,
    consumers: Mutex<Vec<Arc<dyn SnapshotConsumer>>>,
}

#[derive(Default)]
struct State {
    conversation: Conversation,
    phase: Phase,
}

impl Session {
    /// Create a session using the system clock
    pub fn new(config: SessionConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_clock(config, transport, Arc::new(SystemClock))
    }

    /// Create a session with an explicit clock
    pub fn with_clock(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (snapshots, _) = watch::channel(Snapshot::default());
        Self {
            shared: Arc::new(Shared {
                reducer: Reducer::new(config.reducer),
                error_message: config.error_message,
                transport,
                clock,
                state: Mutex::new(State::default()),
                snapshots,
                consumers: Mutex::new(Vec::new()),
            }),
            handle: SessionHandle::new(),
        }
    }

    /// Get a cloneable handle for aborting or awaiting requests
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Watch the latest snapshot
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.shared.snapshots.subscribe()
    }

    /// Register a consumer called synchronously after every applied event
    pub fn add_consumer(&self, consumer: Arc<dyn SnapshotConsumer>) {
        self.shared.consumers.lock().push(consumer);
    }

    pub fn phase(&self) -> Phase {
        self.shared.state.lock().phase
    }

    pub fn is_in_flight(&self) -> bool {
        self.handle.is_in_flight()
    }

    /// Current snapshot of the conversation
    pub fn snapshot(&self) -> Snapshot {
        let state = self.shared.state.lock();
        Snapshot::capture(&state.conversation, state.phase, state.phase.is_active())
    }

    /// Submit user text and stream the reply into the conversation.
    ///
    /// Returns once the stream has ended, failed or been aborted. Empty input
    /// and submissions while another request is in flight are rejected
    /// without touching the conversation.
    pub async fn submit(&self, input: &str) -> SubmitOutcome {
        let text = input.trim();
        if text.is_empty() {
            return SubmitOutcome::Rejected(RejectReason::Empty);
        }
        let Some((guard, cancel)) = self.handle.try_begin() else {
            tracing::debug!("Rejecting submission: request already in flight");
            return SubmitOutcome::Rejected(RejectReason::InFlight);
        };

        self.update(|state| {
            state.phase = Phase::Sending;
            state.conversation.push(Turn::user(text));
            state.conversation.push(Turn::assistant(""));
        });

        let scope = RequestScope {
            session: self,
            guard: Some(guard),
        };
        let result = self.stream(text, &cancel).await;
        scope.finish(result)
    }

    /// Apply the terminal transition and release the in-flight slot.
    /// `failure` is `None` on success.
    fn conclude(&self, failure: Option<String>, guard: InFlightGuard) {
        let snapshot = {
            let mut state = self.shared.state.lock();
            state.phase = match failure {
                None => Phase::Completed,
                Some(reason) => {
                    tracing::warn!("Request failed: {}", reason);
                    show_error(&mut state.conversation, &self.shared.error_message);
                    Phase::Failed
                }
            };
            Snapshot::capture(&state.conversation, state.phase, false)
        };
        // Release the slot before publishing so a consumer reacting to the
        // terminal snapshot can submit again.
        drop(guard);
        self.publish(snapshot);
    }

    async fn stream(&self, text: &str, cancel: &CancellationToken) -> Result<()> {
        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(themis_wire::Error::Aborted.into()),
            opened = self.shared.transport.open(text) => opened?,
        };

        self.update(|state| state.phase = Phase::Streaming);

        let events = themis_wire::decode_stream(bytes);
        tokio::pin!(events);

        let mut applied = 0usize;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(themis_wire::Error::Aborted.into()),
                next = events.next() => next,
            };

            match next {
                Some(Ok(event)) => {
                    let now = self.shared.clock.now_millis();
                    let reducer = &self.shared.reducer;
                    self.update(|state| {
                        let conversation = std::mem::take(&mut state.conversation);
                        state.conversation = reducer.apply(conversation, &event, now);
                    });
                    applied += 1;
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    tracing::debug!("Stream ended after {} events", applied);
                    return Ok(());
                }
            }
        }
    }

    fn update(&self, f: impl FnOnce(&mut State)) {
        let snapshot = {
            let mut state = self.shared.state.lock();
            f(&mut state);
            Snapshot::capture(&state.conversation, state.phase, state.phase.is_active())
        };
        self.publish(snapshot);
    }

    fn publish(&self, snapshot: Snapshot) {
        let consumers = self.shared.consumers.lock().clone();
        for consumer in &consumers {
            consumer.on_snapshot(&snapshot);
        }
        self.shared.snapshots.send_replace(snapshot);
    }
}

/// Ends a request exactly once. If the `submit` future is dropped before the
/// stream finishes, the request fails on drop.
struct RequestScope<'a> {
    session: &'a Session,
    guard: Option<InFlightGuard>,
}

impl RequestScope<'_> {
    fn finish(mut self, result: Result<()>) -> SubmitOutcome {
        if let Some(guard) = self.guard.take() {
            let failure = result.as_ref().err().map(ToString::to_string);
            self.session.conclude(failure, guard);
        }
        match result {
            Ok(()) => SubmitOutcome::Completed,
            Err(e) => SubmitOutcome::Failed(e),
        }
    }
}

impl Drop for RequestScope<'_> {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            self.session
                .conclude(Some("request dropped before it finished".into()), guard);
        }
    }
}

/// Put the error turn where the assistant reply would have gone
fn show_error(conversation: &mut Conversation, message: &str) {
    let turn = Turn::Error {
        message: message.to_string(),
    };
    if conversation.last().is_some_and(Turn::is_assistant) {
        conversation.replace_last(turn);
    } else {
        conversation.push(turn);
    }
}
