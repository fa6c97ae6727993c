//! Error types shared across the bot core, the mesh transport and the social adapters.
//!
//! Errors at the command boundary are always recovered and turned into reply text by
//! [`crate::bot::Bot`]. Errors from the chunked sink are returned to the caller so it can
//! decide what to log or report.
use thiserror::Error;

/// Failure writing a frame to the mesh transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Wrapper around IO errors from the serial link.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The protobuf envelope could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] prost::EncodeError),

    /// The frame exceeds what the stream framing can carry.
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),

    /// A multi-chunk send aborted part way through.
    #[error("chunk {index}/{total} failed: {source}")]
    Chunk {
        index: usize,
        total: usize,
        #[source]
        source: Box<TransportError>,
    },
}

/// Outcome of looking up and running a registered command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// No command is registered under this name.
    #[error("Command '{0}' not found.")]
    NotFound(String),

    /// Command names must be non-empty.
    #[error("invalid command name: {0:?}")]
    InvalidName(String),

    /// The handler returned an error or panicked.
    #[error("Error executing '{name}': {reason}")]
    Execution { name: String, reason: String },
}

/// Errors raised by a social network adapter.
#[derive(Debug, Error)]
pub enum SocialError {
    /// No usable access token; the user must run the login flow first.
    #[error("not logged in")]
    NotAuthenticated,

    /// `complete_login` was called without a preceding `login`.
    #[error("no login in progress")]
    NoPendingLogin,

    /// The instance argument is not a plausible host name.
    #[error("invalid instance: {0}")]
    InvalidInstance(String),

    /// Wrapper around reqwest's error type.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("api error: {0}")]
    Api(String),

    /// Wrapper around IO errors (credential files).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapper around serde_json errors (credential files, API payloads).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The request did not complete within the configured timeout.
    #[error("request timed out after {0}s")]
    Timeout(u64),
}

/// Raised when the radio cannot be opened and the configuration requires it.
#[derive(Debug, Error)]
#[error("failed to open Meshtastic device on {port}: {reason}")]
pub struct StartupError {
    pub port: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_the_command() {
        let err = CommandError::NotFound("xyz".into());
        assert_eq!(err.to_string(), "Command 'xyz' not found.");
    }

    #[test]
    fn chunk_error_keeps_position() {
        let err = TransportError::Chunk {
            index: 2,
            total: 4,
            source: Box::new(TransportError::FrameTooLarge(600)),
        };
        assert!(err.to_string().starts_with("chunk 2/4 failed"));
    }
}
