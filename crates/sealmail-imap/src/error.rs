//! Error types for the IMAP library.
//!
//! `Error` is `Clone` so a single connection failure can be delivered to every
//! command still waiting on the queue.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(String),

    /// Protocol parsing error.
    #[error("Protocol error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Server returned a tagged NO response.
    #[error("Server returned NO: {text}")]
    No {
        /// Human-readable text from the server.
        text: String,
        /// Response code, if one was present (e.g. `ALREADYEXISTS`).
        code: Option<String>,
    },

    /// Server returned a tagged BAD response.
    #[error("Server returned BAD: {text}")]
    Bad {
        /// Human-readable text from the server.
        text: String,
        /// Response code, if one was present.
        code: Option<String>,
    },

    /// Server sent BYE (disconnecting).
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// DEFLATE stream failure.
    #[error("Compression error: {0}")]
    Compression(String),

    /// The connection was torn down before the command completed.
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// A command's precheck failed, so the command was never sent.
    #[error("Precheck for {command} failed: {source}")]
    PrecheckFailed {
        /// Verb of the command that was dropped.
        command: String,
        /// Why the precheck failed.
        source: Box<Error>,
    },
}

impl Error {
    /// Returns the response code carried by a NO/BAD error.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::No { code, .. } | Self::Bad { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Returns `true` if the error only affects a single command and the
    /// connection stays usable.
    #[must_use]
    pub const fn is_command_error(&self) -> bool {
        matches!(self, Self::No { .. } | Self::Bad { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<rustls::pki_types::InvalidDnsNameError> for Error {
    fn from(err: rustls::pki_types::InvalidDnsNameError) -> Self {
        Self::InvalidDnsName(err.to_string())
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_code() {
        let err = Error::No {
            text: "Mailbox exists".to_string(),
            code: Some("ALREADYEXISTS".to_string()),
        };
        assert_eq!(err.code(), Some("ALREADYEXISTS"));
        assert!(err.is_command_error());
        assert_eq!(err.to_string(), "Server returned NO: Mailbox exists");
    }

    #[test]
    fn test_io_error_is_clone() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone").into();
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
        assert!(!copy.is_command_error());
        assert!(copy.code().is_none());
    }
}
