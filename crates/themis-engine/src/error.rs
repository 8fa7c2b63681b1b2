//! Error types for themis-engine

use thiserror::Error;

/// Result type alias using themis-engine Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can end a request
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the wire layer (transport or decode)
    #[error(transparent)]
    Wire(#[from] themis_wire::Error),
}

impl Error {
    /// Whether the stream carried a malformed record
    pub fn is_decode(&self) -> bool {
        let Error::Wire(e) = self;
        e.is_decode()
    }

    /// Whether the request was aborted by the caller
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Wire(themis_wire::Error::Aborted))
    }
}
