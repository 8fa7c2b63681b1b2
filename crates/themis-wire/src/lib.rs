//! themis-wire: wire protocol for the research backend
//!
//! This crate turns the raw byte stream returned by `POST /query` into typed
//! [`StreamEvent`]s. It knows nothing about conversation state.

pub mod client;
pub mod decode;
pub mod error;
pub mod events;
pub mod summary;

#[cfg(test)]
mod proptests;

pub use client::{BackendClient, ByteStream, DEFAULT_BACKEND_URL, validate_base_url};
pub use decode::{DATA_PREFIX, FrameDecoder, decode_stream};
pub use error::{Error, Result};
pub use events::{NestedEvent, StreamEvent};
