//! Error types for rdlink-core.

use thiserror::Error;

/// Main error type for rdlink operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from underlying system calls.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol violation or malformed message.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Codec error during encoding/decoding.
    #[error("codec error: {message}")]
    Codec { message: String },

    /// Gateway rejected the handshake credentials.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Protocol version negotiation failed.
    #[error("version mismatch: gateway offered {offered}, minimum supported {minimum}")]
    VersionMismatch { offered: u8, minimum: u8 },

    /// Connection was closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Session is in the wrong state for the requested operation.
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// Control arbitration refusal (non-owner release, grant with no
    /// pending request, duplicate request, missing override reason).
    #[error("control refused: {reason}")]
    Control { reason: String },

    /// A single input event could not be translated.
    #[error("input translation failed: {message}")]
    InputTranslation { message: String },

    /// Transport layer error.
    #[error("transport error: {message}")]
    Transport { message: String },
}

impl Error {
    /// Returns true if this error is transient and reconnection may help.
    ///
    /// Transient errors include network/transport failures where the gateway
    /// session may still be alive and reconnection could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. } | Error::ConnectionClosed | Error::Timeout | Error::Io(_)
        )
    }

    /// Returns true if this error is fatal and reconnection won't help.
    ///
    /// Fatal errors indicate the gateway rejected the session outright or
    /// there is a protocol-level incompatibility.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::AuthenticationFailed | Error::VersionMismatch { .. } | Error::Protocol { .. }
        )
    }

    /// Convenience constructor for control refusals.
    pub fn control(reason: impl Into<String>) -> Self {
        Error::Control {
            reason: reason.into(),
        }
    }
}

/// Convenience result type for rdlink operations.
pub type Result<T> = std::result::Result<T, Error>;
