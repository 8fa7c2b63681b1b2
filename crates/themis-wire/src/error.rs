//! Error types for themis-wire

use thiserror::Error;

/// Result type alias using themis-wire Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the backend or decoding its stream
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request or body read failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A `data: ` line carried a payload that is not a valid event record
    #[error("Malformed frame on line {line}: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A record line was not valid UTF-8
    #[error("Frame on line {line} is not valid UTF-8")]
    InvalidUtf8 { line: usize },

    /// Backend answered with a non-success status
    #[error("Backend error: {message} (status: {status})")]
    Api { status: u16, message: String },

    /// Backend answered, but not with an event stream
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Request was aborted by the caller
    #[error("Request aborted")]
    Aborted,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an API error from a status code and body text
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether the stream itself was corrupt (as opposed to unreachable)
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode { .. } | Error::InvalidUtf8 { .. })
    }

    /// Whether the failure came from the network or the shape of the response
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::Api { .. } | Error::UnexpectedResponse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_error() -> serde_json::Error {
        serde_json::from_str::<serde_json::Value>("{not json").unwrap_err()
    }

    #[test]
    fn test_decode_classification() {
        let e = Error::Decode {
            line: 3,
            source: json_error(),
        };
        assert!(e.is_decode());
        assert!(!e.is_transport());
        assert!(Error::InvalidUtf8 { line: 1 }.is_decode());
    }

    #[test]
    fn test_transport_classification() {
        assert!(Error::api(502, "bad gateway").is_transport());
        assert!(Error::UnexpectedResponse("text/html".into()).is_transport());
        assert!(!Error::api(500, "boom").is_decode());
    }

    #[test]
    fn test_aborted_is_neither() {
        assert!(!Error::Aborted.is_decode());
        assert!(!Error::Aborted.is_transport());
        assert!(!Error::InvalidConfig("x".into()).is_transport());
    }

    #[test]
    fn test_decode_message_names_line() {
        let e = Error::Decode {
            line: 7,
            source: json_error(),
        };
        assert!(e.to_string().starts_with("Malformed frame on line 7"));
    }
}
