//! Property-based tests for the protocol codec.
//!
//! These tests use proptest to verify:
//! - Codec roundtrip for arbitrary messages
//! - Codec never panics on arbitrary input
//! - Length prefix correctness

#![cfg(test)]

use bytes::BytesMut;
use proptest::prelude::*;

use crate::protocol::{
    Capabilities, Codec, FrameData, FrameEncoding, HelloAckPayload, HelloPayload,
    KeyEventPayload, Message, PointerEventPayload, SessionId, SetQualityPayload, ShutdownPayload,
    ShutdownReason,
};

// =============================================================================
// Arbitrary Generators
// =============================================================================

prop_compose! {
    fn arb_capabilities()(
        incremental_frames in any::<bool>(),
        quality_control in any::<bool>(),
    ) -> Capabilities {
        Capabilities {
            incremental_frames,
            quality_control,
        }
    }
}

prop_compose! {
    fn arb_hello()(
        protocol_version in any::<u8>(),
        auth_token in any::<[u8; 32]>(),
        capabilities in arb_capabilities(),
        resume in prop::option::of(any::<[u8; 16]>()),
    ) -> HelloPayload {
        HelloPayload {
            protocol_version,
            auth_token,
            capabilities,
            resume_session: resume.map(SessionId::from_bytes),
        }
    }
}

prop_compose! {
    fn arb_hello_ack()(
        protocol_version in any::<u8>(),
        accepted in any::<bool>(),
        reject_reason in prop::option::of("[a-z ]{0,32}"),
        session_id in prop::option::of(any::<[u8; 16]>()),
        width in 1u16..=8192,
        height in 1u16..=8192,
        name in "[a-zA-Z0-9 -]{0,64}",
    ) -> HelloAckPayload {
        HelloAckPayload {
            protocol_version,
            accepted,
            reject_reason,
            session_id: session_id.map(SessionId::from_bytes),
            width,
            height,
            name,
        }
    }
}

fn arb_frame_encoding() -> impl Strategy<Value = FrameEncoding> {
    prop_oneof![
        Just(FrameEncoding::Raw),
        Just(FrameEncoding::Tight),
        Just(FrameEncoding::Zrle),
    ]
}

prop_compose! {
    fn arb_frame()(
        x in any::<u16>(),
        y in any::<u16>(),
        width in 1u16..=8192,
        height in 1u16..=8192,
        encoding in arb_frame_encoding(),
        payload in prop::collection::vec(any::<u8>(), 0..2048),
    ) -> FrameData {
        FrameData { x, y, width, height, encoding, payload }
    }
}

fn arb_shutdown_reason() -> impl Strategy<Value = ShutdownReason> {
    prop_oneof![
        Just(ShutdownReason::UserRequested),
        Just(ShutdownReason::IdleTimeout),
        Just(ShutdownReason::GatewayShutdown),
        Just(ShutdownReason::ProtocolError),
    ]
}

fn arb_message() -> impl Strategy<Value = Message> {
    prop_oneof![
        arb_hello().prop_map(Message::Hello),
        arb_hello_ack().prop_map(Message::HelloAck),
        (any::<u16>(), any::<u16>(), any::<u8>()).prop_map(|(x, y, button_mask)| {
            Message::PointerEvent(PointerEventPayload { x, y, button_mask })
        }),
        (any::<u32>(), any::<bool>())
            .prop_map(|(keysym, down)| Message::KeyEvent(KeyEventPayload { keysym, down })),
        (0u8..=9, 0u8..=9).prop_map(|(quality_level, compression_level)| {
            Message::SetQuality(SetQualityPayload {
                quality_level,
                compression_level,
            })
        }),
        arb_frame().prop_map(Message::FrameUpdate),
        any::<u64>().prop_map(|timestamp_ms| Message::Ping { timestamp_ms }),
        any::<u64>().prop_map(|timestamp_ms| Message::Pong { timestamp_ms }),
        (arb_shutdown_reason(), prop::option::of("[a-z ]{0,32}")).prop_map(
            |(reason, message)| Message::Shutdown(ShutdownPayload { reason, message })
        ),
    ]
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn roundtrip_arbitrary_message(msg in arb_message()) {
        let encoded = Codec::encode(&msg).unwrap();
        let decoded = Codec::decode_slice(&encoded).unwrap().unwrap();
        prop_assert_eq!(msg, decoded);
    }

    #[test]
    fn decode_never_panics(data in prop::collection::vec(any::<u8>(), 0..4096)) {
        let mut buf = BytesMut::from(&data[..]);
        // Any outcome is fine as long as it doesn't panic
        let _ = Codec::decode(&mut buf);
    }

    #[test]
    fn length_prefix_matches_payload(msg in arb_message()) {
        let encoded = Codec::encode(&msg).unwrap();
        let len = u32::from_le_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]) as usize;
        prop_assert_eq!(len, encoded.len() - crate::protocol::FRAME_HEADER_LEN);
    }

    #[test]
    fn truncated_message_returns_none(msg in arb_message(), cut in 0.0f64..1.0) {
        let encoded = Codec::encode(&msg).unwrap();
        let cut_at = ((encoded.len() - 1) as f64 * cut) as usize;
        let mut buf = BytesMut::from(&encoded[..cut_at]);
        let before = buf.len();
        let result = Codec::decode(&mut buf).unwrap();
        prop_assert!(result.is_none());
        prop_assert_eq!(buf.len(), before);
    }
}
