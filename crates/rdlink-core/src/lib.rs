//! rdlink-core: Shared library for the rdlink workspace-control protocol.
//!
//! This crate provides:
//! - Wire message definitions and length-prefixed codec
//! - Handshake negotiation with the workspace gateway
//! - Control arbitration (human/agent ownership state machine)
//! - Input translation (pointer/keyboard -> wire events)
//! - Quality settings and connection metrics
//! - Session state types and reconnect backoff policy
//! - Transport abstractions
//! - Logging setup

pub mod constants;
pub mod control;
pub mod error;
pub mod handshake;
pub mod input;
pub mod logging;
pub mod metrics;
pub mod protocol;
pub mod quality;
pub mod session;
pub mod transport;

pub use control::{ControlActor, ControlArbitrator, ControlOwner, PendingControlRequest, RequestOutcome};
pub use error::{Error, Result};
pub use input::{InputEvent, InputTranslator, ShortcutAction, Translation};
pub use logging::{init_logging, LogFormat};
pub use metrics::{ConnectionQuality, SessionMetrics};
pub use quality::QualitySettings;
pub use session::{BackoffPolicy, ConnectionState, SessionConfig};
