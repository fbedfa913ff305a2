//! Connection metrics for a workspace session.
//!
//! Provides metrics tracking including:
//! - Latency measurement with smoothing
//! - Frame-rate over a rolling window
//! - Bandwidth accounting
//! - Derived connection-quality classification

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_FRAME_SAMPLES, METRICS_WINDOW, QUALITY_THRESHOLDS};

/// Measured connection quality, derived from smoothed latency.
///
/// Recomputed from metrics; never stored independently of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Poor,
    Critical,
}

impl ConnectionQuality {
    /// Classify a smoothed latency sample against the policy thresholds.
    pub fn from_latency_ms(latency_ms: u64) -> Self {
        if latency_ms < QUALITY_THRESHOLDS.excellent {
            ConnectionQuality::Excellent
        } else if latency_ms < QUALITY_THRESHOLDS.good {
            ConnectionQuality::Good
        } else if latency_ms < QUALITY_THRESHOLDS.poor {
            ConnectionQuality::Poor
        } else {
            ConnectionQuality::Critical
        }
    }

    /// True for Poor or Critical.
    pub fn is_degraded(&self) -> bool {
        matches!(self, ConnectionQuality::Poor | ConnectionQuality::Critical)
    }
}

impl std::fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionQuality::Excellent => write!(f, "excellent"),
            ConnectionQuality::Good => write!(f, "good"),
            ConnectionQuality::Poor => write!(f, "poor"),
            ConnectionQuality::Critical => write!(f, "critical"),
        }
    }
}

/// Session metrics tracking.
///
/// Tracks latency with exponential smoothing, frame rate and bandwidth over
/// a rolling window. Reset on every successful (re)connect; quality settings
/// are deliberately not part of this struct and survive reconnects.
#[derive(Debug, Clone)]
pub struct SessionMetrics {
    /// Most recent latency sample.
    latency: Option<Duration>,
    /// Smoothed latency estimate (EWMA).
    latency_smoothed: Option<Duration>,
    /// Frame arrival timestamps within the rolling window.
    frame_times: VecDeque<Instant>,
    /// (timestamp, bytes) samples within the rolling window.
    byte_samples: VecDeque<(Instant, usize)>,
    /// Total frames received since last reset.
    pub frames_received: u64,
    /// Total bytes received since last reset.
    pub bytes_received: u64,
    /// Total messages sent since last reset.
    pub messages_sent: u64,
    /// Number of reconnections performed on this session object.
    pub reconnect_count: u32,
    /// When this metrics epoch started.
    epoch_start: Instant,
}

/// A serializable point-in-time snapshot for observers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Smoothed latency in milliseconds (None before first sample).
    pub latency_ms: Option<u64>,
    /// Frames per second over the rolling window.
    pub frame_rate: f64,
    /// Inbound bandwidth in kilobits per second over the rolling window.
    pub bandwidth_kbps: f64,
    /// Derived quality classification.
    pub quality: ConnectionQuality,
    /// Reconnections performed on this session object.
    pub reconnect_count: u32,
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self {
            latency_ms: None,
            frame_rate: 0.0,
            bandwidth_kbps: 0.0,
            quality: ConnectionQuality::Excellent,
            reconnect_count: 0,
        }
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMetrics {
    /// Create a fresh metrics tracker.
    pub fn new() -> Self {
        Self {
            latency: None,
            latency_smoothed: None,
            frame_times: VecDeque::new(),
            byte_samples: VecDeque::new(),
            frames_received: 0,
            bytes_received: 0,
            messages_sent: 0,
            reconnect_count: 0,
            epoch_start: Instant::now(),
        }
    }

    /// Update latency with a new sample.
    ///
    /// Uses exponential weighted moving average (RFC 6298 style):
    /// SRTT = 7/8 * SRTT + 1/8 * sample
    pub fn update_latency(&mut self, sample: Duration) {
        self.latency = Some(sample);

        self.latency_smoothed = Some(match self.latency_smoothed {
            Some(srtt) => {
                let srtt_nanos = srtt.as_nanos() as u64;
                let sample_nanos = sample.as_nanos() as u64;
                Duration::from_nanos((srtt_nanos * 7 + sample_nanos) / 8)
            }
            None => sample,
        });
    }

    /// Record one inbound framebuffer update.
    pub fn record_frame(&mut self, bytes: usize) {
        self.record_frame_at(Instant::now(), bytes);
    }

    /// Record a frame at an explicit timestamp (testable form).
    pub fn record_frame_at(&mut self, at: Instant, bytes: usize) {
        self.frames_received = self.frames_received.saturating_add(1);
        self.bytes_received = self.bytes_received.saturating_add(bytes as u64);

        self.frame_times.push_back(at);
        self.byte_samples.push_back((at, bytes));
        while self.frame_times.len() > MAX_FRAME_SAMPLES {
            self.frame_times.pop_front();
        }
        while self.byte_samples.len() > MAX_FRAME_SAMPLES {
            self.byte_samples.pop_front();
        }
        self.expire_window(at);
    }

    /// Record one outbound message.
    pub fn record_send(&mut self) {
        self.messages_sent = self.messages_sent.saturating_add(1);
    }

    /// Record a successful reconnection.
    pub fn record_reconnect(&mut self) {
        self.reconnect_count = self.reconnect_count.saturating_add(1);
    }

    /// Drop window samples older than METRICS_WINDOW.
    fn expire_window(&mut self, now: Instant) {
        while let Some(front) = self.frame_times.front() {
            if now.duration_since(*front) > METRICS_WINDOW {
                self.frame_times.pop_front();
            } else {
                break;
            }
        }
        while let Some((t, _)) = self.byte_samples.front() {
            if now.duration_since(*t) > METRICS_WINDOW {
                self.byte_samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Smoothed latency in milliseconds, if any sample has arrived.
    pub fn latency_ms(&self) -> Option<u64> {
        self.latency_smoothed
            .or(self.latency)
            .map(|d| d.as_millis() as u64)
    }

    /// Frames per second over the rolling window.
    pub fn frame_rate(&self) -> f64 {
        if self.frame_times.len() < 2 {
            return 0.0;
        }
        let span = self
            .frame_times
            .back()
            .unwrap()
            .duration_since(*self.frame_times.front().unwrap());
        if span.is_zero() {
            return 0.0;
        }
        (self.frame_times.len() - 1) as f64 / span.as_secs_f64()
    }

    /// Inbound bandwidth in kilobits per second over the rolling window.
    pub fn bandwidth_kbps(&self) -> f64 {
        if self.byte_samples.len() < 2 {
            return 0.0;
        }
        let span = self
            .byte_samples
            .back()
            .unwrap()
            .0
            .duration_since(self.byte_samples.front().unwrap().0);
        if span.is_zero() {
            return 0.0;
        }
        let total: usize = self.byte_samples.iter().map(|(_, b)| b).sum();
        (total as f64 * 8.0 / 1000.0) / span.as_secs_f64()
    }

    /// Derive the connection-quality classification.
    ///
    /// Before the first latency sample the connection is treated as Excellent
    /// rather than unknown; the first Pong corrects it within one probe
    /// interval.
    pub fn quality(&self) -> ConnectionQuality {
        match self.latency_ms() {
            Some(ms) => ConnectionQuality::from_latency_ms(ms),
            None => ConnectionQuality::Excellent,
        }
    }

    /// Duration since this metrics epoch started.
    pub fn epoch_duration(&self) -> Duration {
        self.epoch_start.elapsed()
    }

    /// Take a point-in-time snapshot for observers.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            latency_ms: self.latency_ms(),
            frame_rate: self.frame_rate(),
            bandwidth_kbps: self.bandwidth_kbps(),
            quality: self.quality(),
            reconnect_count: self.reconnect_count,
        }
    }

    /// Reset all counters and samples, preserving the reconnect count.
    ///
    /// Called on every successful (re)connect: metrics from the previous
    /// transport do not describe the new one.
    pub fn reset(&mut self) {
        let reconnects = self.reconnect_count;
        *self = Self::new();
        self.reconnect_count = reconnects;
    }
}

// =============================================================================
// Tests
// =============================================================================
