//! Tracker configuration.
//!
//! The sampling parameters and the noise threshold are policy choices carried
//! over from field use, not verified physical constants, so every one of them
//! is overridable.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Default minimum interval between position updates (1 Hz).
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 1_000;

/// Default minimum movement before the platform reports a new fix.
pub const DEFAULT_MIN_DISTANCE_M: f64 = 1.0;

/// Default upper bound (exclusive) for a single accepted increment.
/// At 1 Hz a jump of 100 m or more is treated as a GPS glitch.
pub const DEFAULT_MAX_INCREMENT_M: f64 = 100.0;

/// Requested accuracy class for the platform location service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum LocationAccuracy {
    Low,
    Balanced,
    High,
    #[default]
    BestForNavigation,
}

/// Parameters handed to a [`PositionSource`](crate::source::PositionSource) on subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionConfig {
    pub accuracy: LocationAccuracy,
    pub min_interval_ms: u64,
    pub min_distance_m: f64,
}

/// Configuration for a [`Tracker`](crate::Tracker).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    /// Accuracy requested from the location service.
    /// Default: BestForNavigation
    pub accuracy: LocationAccuracy,

    /// Minimum time between fixes.
    /// Default: 1000 ms
    pub min_interval_ms: u64,

    /// Minimum movement between fixes.
    /// Default: 1.0 meters
    pub min_distance_m: f64,

    /// Increments at or above this are rejected as noise.
    /// Default: 100.0 meters
    pub max_increment_m: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            accuracy: LocationAccuracy::default(),
            min_interval_ms: DEFAULT_MIN_INTERVAL_MS,
            min_distance_m: DEFAULT_MIN_DISTANCE_M,
            max_increment_m: DEFAULT_MAX_INCREMENT_M,
        }
    }
}

impl TrackerConfig {
    /// Parse a (possibly partial) JSON config. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TrackerConfig =
            serde_json::from_str(json).map_err(|e| TrackerError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.min_distance_m.is_finite() || self.min_distance_m < 0.0 {
            return Err(TrackerError::config(format!(
                "minDistanceM must be a non-negative number, got {}",
                self.min_distance_m
            )));
        }
        if !self.max_increment_m.is_finite() || self.max_increment_m <= 0.0 {
            return Err(TrackerError::config(format!(
                "maxIncrementM must be a positive number, got {}",
                self.max_increment_m
            )));
        }
        Ok(())
    }

    pub fn subscription(&self) -> SubscriptionConfig {
        SubscriptionConfig {
            accuracy: self.accuracy,
            min_interval_ms: self.min_interval_ms,
            min_distance_m: self.min_distance_m,
        }
    }
}
