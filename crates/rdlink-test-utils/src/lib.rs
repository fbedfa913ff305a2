//! rdlink-test-utils: Test infrastructure for rdlink.
//!
//! Provides:
//! - MockChannel / MockConnector: in-memory transport without a network
//! - MockGateway: the gateway side of the mock transport, with scripted
//!   handshake helpers for lifecycle tests
//! - AutoGateway: a spawned gateway that accepts handshakes, answers pings,
//!   and records everything else the client sends

mod mock_gateway;

pub use mock_gateway::{
    mock_gateway, AutoGateway, GatewayLink, MockChannel, MockConnector, MockGateway,
};
