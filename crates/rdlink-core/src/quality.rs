//! Tunable quality/compression settings.
//!
//! A pure value holder with bounds-checked mutators. The session layer owns
//! pushing changes to the gateway; this type has no transport knowledge and
//! never blocks.

use serde::{Deserialize, Serialize};

use crate::constants::{QUALITY_LEVEL_MAX, QUALITY_LEVEL_MIN};

/// Encoder tuning pair: lower is better fidelity, higher is better
/// performance. Both levels stay within 0..=9; adjustments past the bounds
/// clamp silently.
///
/// Settings persist for the lifetime of the session object and survive
/// reconnects (only connection metrics reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitySettings {
    quality_level: u8,
    compression_level: u8,
}

impl Default for QualitySettings {
    fn default() -> Self {
        // Middle of the range: neither fidelity- nor performance-biased
        Self {
            quality_level: 5,
            compression_level: 5,
        }
    }
}

impl QualitySettings {
    /// Create settings at explicit levels, clamped to the valid range.
    pub fn new(quality_level: u8, compression_level: u8) -> Self {
        Self {
            quality_level: quality_level.clamp(QUALITY_LEVEL_MIN, QUALITY_LEVEL_MAX),
            compression_level: compression_level.clamp(QUALITY_LEVEL_MIN, QUALITY_LEVEL_MAX),
        }
    }

    /// Current quality level (0 = best fidelity).
    pub fn quality_level(&self) -> u8 {
        self.quality_level
    }

    /// Current compression level (0 = none).
    pub fn compression_level(&self) -> u8 {
        self.compression_level
    }

    /// Step both levels toward fidelity (floored at 0).
    ///
    /// Returns true if either level actually changed.
    pub fn improve_quality(&mut self) -> bool {
        let before = *self;
        self.quality_level = self.quality_level.saturating_sub(1);
        self.compression_level = self.compression_level.saturating_sub(1);
        *self != before
    }

    /// Step both levels toward performance (capped at 9).
    ///
    /// Returns true if either level actually changed.
    pub fn improve_performance(&mut self) -> bool {
        let before = *self;
        if self.quality_level < QUALITY_LEVEL_MAX {
            self.quality_level += 1;
        }
        if self.compression_level < QUALITY_LEVEL_MAX {
            self.compression_level += 1;
        }
        *self != before
    }
}
