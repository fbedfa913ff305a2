//! Session configuration.

use std::time::Duration;

use crate::constants::{
    AUTH_TOKEN_LEN, HANDSHAKE_TIMEOUT, METRICS_INTERVAL, PING_INTERVAL,
};
use crate::protocol::Capabilities;
use crate::quality::QualitySettings;

/// Configuration for a workspace session.
///
/// Constructed by the embedding application and handed to the session at
/// creation time; nothing here is read from ambient global state.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Gateway address, scheme and authority as the transport expects it.
    pub gateway_addr: String,
    /// Pre-shared token presented during the handshake.
    pub auth_token: [u8; AUTH_TOKEN_LEN],
    /// Capabilities offered in the hello.
    pub capabilities: Capabilities,
    /// Handshake must complete within this window.
    pub handshake_timeout: Duration,
    /// Keepalive / latency-probe interval while connected.
    pub ping_interval: Duration,
    /// How often metrics windows are folded and published.
    pub metrics_interval: Duration,
    /// Initial quality settings.
    pub quality: QualitySettings,
    /// Whether the adaptive quality policy may adjust levels on its own.
    pub auto_adapt: bool,
}

impl SessionConfig {
    /// Create a config for the given gateway with default tuning.
    pub fn new(gateway_addr: impl Into<String>, auth_token: [u8; AUTH_TOKEN_LEN]) -> Self {
        Self {
            gateway_addr: gateway_addr.into(),
            auth_token,
            capabilities: Capabilities::default(),
            handshake_timeout: HANDSHAKE_TIMEOUT,
            ping_interval: PING_INTERVAL,
            metrics_interval: METRICS_INTERVAL,
            quality: QualitySettings::default(),
            auto_adapt: false,
        }
    }

    /// Set the offered capabilities.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set the handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the ping interval.
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set the metrics publishing interval.
    pub fn with_metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = interval;
        self
    }

    /// Set the initial quality settings.
    pub fn with_quality(mut self, quality: QualitySettings) -> Self {
        self.quality = quality;
        self
    }

    /// Enable or disable the adaptive quality policy.
    pub fn with_auto_adapt(mut self, enabled: bool) -> Self {
        self.auto_adapt = enabled;
        self
    }
}
