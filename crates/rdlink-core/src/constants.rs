//! Protocol and policy constants for rdlink.

use std::time::Duration;

// =============================================================================
// Protocol Constants
// =============================================================================

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Minimum protocol version this client will accept from a gateway.
pub const MIN_PROTOCOL_VERSION: u8 = 1;

/// Maximum message payload size (16 MiB; a full frame update fits well under).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Auth token length in bytes.
pub const AUTH_TOKEN_LEN: usize = 32;

/// Maximum framebuffer width accepted from the gateway.
pub const MAX_FRAME_WIDTH: u16 = 8192;

/// Maximum framebuffer height accepted from the gateway.
pub const MAX_FRAME_HEIGHT: u16 = 8192;

// =============================================================================
// Timing Constants
// =============================================================================

/// Handshake timeout (Hello -> HelloAck).
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Initial reconnect delay, doubled each attempt.
pub const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// Cap on the reconnect delay.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(15);

/// Reconnect attempts before the session transitions to Error.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 8;

/// Interval between latency probes while connected.
pub const PING_INTERVAL: Duration = Duration::from_secs(2);

/// Interval between metrics window folds / observer notifications.
pub const METRICS_INTERVAL: Duration = Duration::from_secs(1);

/// Auto-release countdown tick.
pub const AUTO_RELEASE_TICK: Duration = Duration::from_secs(1);

// =============================================================================
// Quality Policy
// =============================================================================

/// Latency thresholds (ms) classifying connection quality.
///
/// Smoothed latency below `excellent` is Excellent, below `good` is Good,
/// below `poor` is Poor, anything above is Critical. Policy constants, not
/// per-call-site literals.
pub struct QualityThresholds {
    pub excellent: u64,
    pub good: u64,
    pub poor: u64,
}

/// The single quality-classification policy for the subsystem.
pub const QUALITY_THRESHOLDS: QualityThresholds = QualityThresholds {
    excellent: 100,
    good: 300,
    poor: 800,
};

/// Lowest (best fidelity) quality/compression level.
pub const QUALITY_LEVEL_MIN: u8 = 0;

/// Highest (best performance) quality/compression level.
pub const QUALITY_LEVEL_MAX: u8 = 9;

/// Consecutive degraded/excellent samples before the adaptive policy steps.
pub const ADAPT_SAMPLE_THRESHOLD: u32 = 5;

// =============================================================================
// Metrics Windows
// =============================================================================

/// Window length for frame-rate and bandwidth averaging.
pub const METRICS_WINDOW: Duration = Duration::from_secs(2);

/// Maximum frame timestamps retained in the rolling window.
pub const MAX_FRAME_SAMPLES: usize = 512;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_delays_are_ordered() {
        assert!(INITIAL_RECONNECT_DELAY < MAX_RECONNECT_DELAY);
        assert!(MAX_RECONNECT_ATTEMPTS > 0);
    }

    #[test]
    fn quality_thresholds_are_ordered() {
        assert!(QUALITY_THRESHOLDS.excellent < QUALITY_THRESHOLDS.good);
        assert!(QUALITY_THRESHOLDS.good < QUALITY_THRESHOLDS.poor);
    }

    #[test]
    fn quality_level_bounds() {
        assert!(QUALITY_LEVEL_MIN < QUALITY_LEVEL_MAX);
        assert_eq!(QUALITY_LEVEL_MAX, 9);
    }

    #[test]
    fn auth_token_length() {
        // 256-bit opaque token from the host application
        assert_eq!(AUTH_TOKEN_LEN, 32);
    }
}
