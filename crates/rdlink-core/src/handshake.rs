//! Connection handshake.
//!
//! Sends `Hello`, awaits `HelloAck` within the handshake timeout, and
//! classifies rejections: version mismatch and refused credentials are fatal,
//! timeouts and transport failures are transient and feed the reconnect path.

use tokio::time::timeout;

use crate::constants::{MAX_FRAME_HEIGHT, MAX_FRAME_WIDTH, MIN_PROTOCOL_VERSION, PROTOCOL_VERSION};
use crate::error::{Error, Result};
use crate::protocol::{HelloPayload, Message, SessionId};
use crate::session::SessionConfig;
use crate::transport::Channel;

/// Result of a successful handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeOutcome {
    /// Session identity assigned (or confirmed, on resume) by the gateway.
    pub session_id: SessionId,
    /// Negotiated protocol version.
    pub protocol_version: u8,
    /// Remote framebuffer width in pixels.
    pub width: u16,
    /// Remote framebuffer height in pixels.
    pub height: u16,
    /// Human-readable workspace name.
    pub name: String,
}

/// Drive the handshake on a freshly connected channel.
///
/// `resume` carries the previous session id on reconnect so the gateway can
/// reattach rather than allocate a fresh workspace.
pub async fn perform_handshake<C: Channel>(
    channel: &mut C,
    config: &SessionConfig,
    resume: Option<SessionId>,
) -> Result<HandshakeOutcome> {
    let hello = HelloPayload {
        protocol_version: PROTOCOL_VERSION,
        auth_token: config.auth_token,
        capabilities: config.capabilities.clone(),
        resume_session: resume,
    };
    channel.send(&Message::Hello(hello)).await?;

    let reply = timeout(config.handshake_timeout, channel.recv())
        .await
        .map_err(|_| Error::Timeout)??;

    let ack = match reply {
        Message::HelloAck(ack) => ack,
        Message::Shutdown(payload) => {
            return Err(Error::Protocol {
                message: format!("gateway shut down during handshake: {}", payload.reason),
            });
        }
        other => {
            return Err(Error::Protocol {
                message: format!("expected HelloAck, got {}", other.name()),
            });
        }
    };

    if ack.protocol_version < MIN_PROTOCOL_VERSION {
        return Err(Error::VersionMismatch {
            offered: ack.protocol_version,
            minimum: MIN_PROTOCOL_VERSION,
        });
    }

    if !ack.accepted {
        tracing::warn!(reason = ?ack.reject_reason, "gateway rejected hello");
        return Err(Error::AuthenticationFailed);
    }

    let session_id = ack.session_id.ok_or_else(|| Error::Protocol {
        message: "accepted HelloAck without a session id".to_string(),
    })?;

    if ack.width == 0 || ack.height == 0 || ack.width > MAX_FRAME_WIDTH || ack.height > MAX_FRAME_HEIGHT
    {
        return Err(Error::Protocol {
            message: format!("implausible framebuffer size {}x{}", ack.width, ack.height),
        });
    }

    tracing::info!(
        session_id = %session_id,
        version = ack.protocol_version,
        width = ack.width,
        height = ack.height,
        name = %ack.name,
        "handshake complete"
    );

    Ok(HandshakeOutcome {
        session_id,
        protocol_version: ack.protocol_version,
        width: ack.width,
        height: ack.height,
        name: ack.name,
    })
}

// =============================================================================
// Tests
// =============================================================================
