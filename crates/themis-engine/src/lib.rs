//! themis-engine: streaming conversation engine
//!
//! Folds the backend's interleaved event stream into a conversation that any
//! renderer can display. The reducer is a pure function; the [`Session`]
//! drives it from a [`Transport`] and publishes a [`Snapshot`] after every
//! applied event.

pub mod clock;
pub mod conversation;
pub mod error;
pub mod handle;
pub mod reducer;
pub mod session;
pub mod snapshot;
pub mod transport;

#[cfg(test)]
mod proptests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use conversation::{Conversation, Diagnostics, SubAgentTurn, ToolCall, Turn};
pub use error::Error;
pub use handle::SessionHandle;
pub use reducer::{Reducer, ReducerConfig, TOOL_TIMEOUT, apply};
pub use session::{FALLBACK_ERROR_MESSAGE, Phase, RejectReason, Session, SessionConfig, SubmitOutcome};
pub use snapshot::{Snapshot, SnapshotConsumer, TurnKey};
pub use transport::{HttpTransport, Transport};
