//! Protocol message payloads and the top-level Message enum.

use serde::{Deserialize, Serialize};

use crate::constants::AUTH_TOKEN_LEN;

// =============================================================================
// Session Identification
// =============================================================================

/// Opaque identifier for a logical workspace session (across reconnects).
///
/// The gateway generates this on first connection; the client provides it
/// on reconnect to resume an existing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub [u8; 16]);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        let mut bytes = [0u8; 16];
        getrandom::fill(&mut bytes).expect("failed to generate random session ID");
        Self(bytes)
    }

    /// Create a session ID from bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the bytes of this session ID.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display first 8 bytes as hex for brevity
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

// =============================================================================
// Handshake Payloads
// =============================================================================

/// Client capabilities announced in Hello.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Client understands incremental frame encodings.
    pub incremental_frames: bool,
    /// Client will send SetQuality adjustments.
    pub quality_control: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            incremental_frames: true,
            quality_control: true,
        }
    }
}

/// Client hello with credentials and capabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Highest protocol version the client speaks.
    pub protocol_version: u8,
    /// Opaque credential token supplied by the host application.
    pub auth_token: [u8; AUTH_TOKEN_LEN],
    /// Client capabilities.
    pub capabilities: Capabilities,
    /// Session to resume, if reconnecting.
    pub resume_session: Option<SessionId>,
}

/// Gateway acknowledgment of Hello.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloAckPayload {
    /// Negotiated protocol version (min of both sides).
    pub protocol_version: u8,
    /// Whether the connection was accepted.
    pub accepted: bool,
    /// Reason for rejection (if not accepted).
    pub reject_reason: Option<String>,
    /// Session ID assigned (or resumed) by the gateway. Absent on rejection.
    pub session_id: Option<SessionId>,
    /// Remote desktop width in pixels.
    pub width: u16,
    /// Remote desktop height in pixels.
    pub height: u16,
    /// Human-readable desktop name.
    pub name: String,
}

// =============================================================================
// Input Payloads
// =============================================================================

/// Pointer position and button state.
///
/// `button_mask` bit layout follows the remote-framebuffer convention:
/// bit 0 = left, bit 1 = middle, bit 2 = right, bits 3-6 = scroll
/// up/down/left/right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerEventPayload {
    pub x: u16,
    pub y: u16,
    pub button_mask: u8,
}

/// Key press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEventPayload {
    /// X11-style keysym.
    pub keysym: u32,
    /// True for press, false for release.
    pub down: bool,
}

// =============================================================================
// Quality Payload
// =============================================================================

/// Requested encoder tuning, sent when quality settings change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetQualityPayload {
    /// 0 = best fidelity, 9 = best performance.
    pub quality_level: u8,
    /// 0 = no compression, 9 = maximum compression.
    pub compression_level: u8,
}

// =============================================================================
// Frame Payload
// =============================================================================

/// Frame encoding identifier. Opaque to this subsystem beyond accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameEncoding {
    Raw,
    Tight,
    Zrle,
}

/// One framebuffer update from the gateway.
///
/// The pixel payload is opaque to this subsystem; only size and rate are
/// accounted for metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameData {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub encoding: FrameEncoding,
    pub payload: Vec<u8>,
}

// =============================================================================
// Shutdown Payload
// =============================================================================

/// Reason for graceful shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownReason {
    UserRequested,
    IdleTimeout,
    GatewayShutdown,
    ProtocolError,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::UserRequested => write!(f, "user requested"),
            ShutdownReason::IdleTimeout => write!(f, "idle timeout"),
            ShutdownReason::GatewayShutdown => write!(f, "gateway shutdown"),
            ShutdownReason::ProtocolError => write!(f, "protocol error"),
        }
    }
}

/// Graceful shutdown notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShutdownPayload {
    pub reason: ShutdownReason,
    pub message: Option<String>,
}

// =============================================================================
// Top-level Message Enum
// =============================================================================

/// Top-level protocol message type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    // =========================================================================
    // Handshake
    // =========================================================================
    /// Client hello with auth token and capabilities.
    Hello(HelloPayload),
    /// Gateway acknowledgment of hello.
    HelloAck(HelloAckPayload),

    // =========================================================================
    // Upstream (client -> gateway)
    // =========================================================================
    /// Pointer move/button state.
    PointerEvent(PointerEventPayload),
    /// Key press or release.
    KeyEvent(KeyEventPayload),
    /// Encoder tuning request.
    SetQuality(SetQualityPayload),

    // =========================================================================
    // Downstream (gateway -> client)
    // =========================================================================
    /// Framebuffer update (opaque payload, accounted for metrics).
    FrameUpdate(FrameData),

    // =========================================================================
    // Either direction
    // =========================================================================
    /// Latency probe (timestamp echo).
    Ping { timestamp_ms: u64 },
    /// Probe reply carrying the original timestamp.
    Pong { timestamp_ms: u64 },
    /// Graceful shutdown notification.
    Shutdown(ShutdownPayload),
}

impl Message {
    /// Short variant name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Message::Hello(_) => "Hello",
            Message::HelloAck(_) => "HelloAck",
            Message::PointerEvent(_) => "PointerEvent",
            Message::KeyEvent(_) => "KeyEvent",
            Message::SetQuality(_) => "SetQuality",
            Message::FrameUpdate(_) => "FrameUpdate",
            Message::Ping { .. } => "Ping",
            Message::Pong { .. } => "Pong",
            Message::Shutdown(_) => "Shutdown",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_random_and_from_bytes() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();
        assert_ne!(id1, id2);

        let bytes = [1u8; 16];
        let id = SessionId::from_bytes(bytes);
        assert_eq!(id.as_bytes(), &bytes);
    }

    #[test]
    fn session_id_display() {
        let id = SessionId::from_bytes([
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0, 0, 0, 0, 0, 0, 0, 0,
        ]);
        assert_eq!(format!("{}", id), "0102030405060708");
    }

    #[test]
    fn message_variants_exist() {
        let _hello = Message::Hello(HelloPayload {
            protocol_version: 1,
            auth_token: [0u8; 32],
            capabilities: Capabilities::default(),
            resume_session: None,
        });

        let _ack = Message::HelloAck(HelloAckPayload {
            protocol_version: 1,
            accepted: true,
            reject_reason: None,
            session_id: Some(SessionId::from_bytes([0; 16])),
            width: 1920,
            height: 1080,
            name: "workspace".into(),
        });

        let _pointer = Message::PointerEvent(PointerEventPayload {
            x: 100,
            y: 200,
            button_mask: 0x01,
        });

        let _key = Message::KeyEvent(KeyEventPayload {
            keysym: 0xff0d,
            down: true,
        });

        let _shutdown = Message::Shutdown(ShutdownPayload {
            reason: ShutdownReason::UserRequested,
            message: None,
        });
    }

    #[test]
    fn shutdown_reason_display() {
        assert_eq!(format!("{}", ShutdownReason::UserRequested), "user requested");
        assert_eq!(format!("{}", ShutdownReason::IdleTimeout), "idle timeout");
    }

    #[test]
    fn message_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Message>();
    }
}
