//! Error types for the IMAP engine.

use std::time::Duration;

use thiserror::Error;

use crate::types::ResponseCode;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Protocol parsing error. Fatal to the session.
    #[error("Protocol error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Protocol violation (UIDVALIDITY decrement, tag mismatch, unexpected
    /// data). Fatal to the session.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// Server refused the operation with a tagged NO. The session continues.
    #[error("Server returned NO: {text}")]
    No {
        /// Human-readable server text.
        text: String,
        /// Response code attached to the refusal, if any.
        code: Option<ResponseCode>,
    },

    /// Server rejected the command as malformed with a tagged BAD.
    /// Treated as a client-side bug; fatal to the session.
    #[error("Server returned BAD: {0}")]
    Bad(String),

    /// Server sent BYE (disconnecting). Fatal but expected.
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// Operation timed out. A read timeout is terminal for the session.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The operation was cancelled locally. The session disconnects unless
    /// the cancelled command was IDLE.
    #[error("Operation cancelled")]
    Cancelled,

    /// The requested operation needs a capability the server does not
    /// advertise. Fails before any wire traffic.
    #[error("Capability not available: {0}")]
    CapabilityUnavailable(String),

    /// Invalid caller input. Fails before any wire traffic.
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Invalid session state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Returns true if retrying on a fresh connection may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout(_) | Self::Bye(_))
    }

    /// Returns true if this error tears down the session.
    ///
    /// A tagged NO, a capability gate and an argument error leave the
    /// session usable; everything else does not.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::No { .. }
                | Self::CapabilityUnavailable(_)
                | Self::Argument(_)
                | Self::InvalidState(_)
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let io = Error::Io(std::io::Error::other("reset"));
        assert!(io.is_transient());
        assert!(Error::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!Error::Bad("oops".to_string()).is_transient());
        assert!(!Error::Cancelled.is_transient());
    }

    #[test]
    fn fatal_classification() {
        let no = Error::No {
            text: "denied".to_string(),
            code: None,
        };
        assert!(!no.is_fatal());
        assert!(!Error::Argument("empty name".to_string()).is_fatal());
        assert!(!Error::CapabilityUnavailable("MOVE".to_string()).is_fatal());
        assert!(Error::Bad("syntax".to_string()).is_fatal());
        assert!(Error::Protocol("tag mismatch".to_string()).is_fatal());
        assert!(Error::Cancelled.is_fatal());
    }
}
