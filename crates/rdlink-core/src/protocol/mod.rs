//! Wire protocol for the workspace gateway connection.
//!
//! The gateway speaks a remote-framebuffer-style protocol: framebuffer
//! updates flow downstream, pointer/keyboard/quality/control messages flow
//! upstream, all framed as length-prefixed bincode over one persistent
//! bidirectional channel.

mod codec;
mod types;

#[cfg(test)]
mod proptest;

pub use codec::{Codec, FRAME_HEADER_LEN};
pub use types::{
    Capabilities, FrameData, FrameEncoding, HelloAckPayload, HelloPayload, KeyEventPayload,
    Message, PointerEventPayload, SessionId, SetQualityPayload, ShutdownPayload, ShutdownReason,
};
