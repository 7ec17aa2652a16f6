//! # Session Tracker
//!
//! Live GPS distance tracking for outdoor sport sessions (surfing, kiting).
//!
//! This library provides:
//! - Great-circle (haversine) distance between GPS fixes
//! - A configurable noise filter that discards GPS jumps
//! - A session tracker that accrues distance from a live position stream
//! - Session summaries (duration, distance, average speed)
//!
//! ## Features
//!
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//!
//! ## Quick Start
//!
//! ```rust
//! use session_tracker::{great_circle_distance, accept, GeoPoint};
//!
//! let a = GeoPoint::new(0.0, 0.0);
//! let b = GeoPoint::new(0.0, 1.0);
//! let meters = great_circle_distance(&a, &b);
//! assert!((meters - 111_195.0).abs() < 50.0);
//!
//! // A 111 km jump between two 1 Hz fixes is noise, not movement
//! assert!(!accept(meters));
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{ErrorKind, Result, TrackerError};

// Geographic utilities (haversine distance, geo conversions)
pub mod geo_utils;
pub use geo_utils::great_circle_distance;

// Noise filter for distance increments
pub mod policy;
pub use policy::{accept, AcceptancePolicy};

// Tracker and subscription configuration
pub mod config;
pub use config::{LocationAccuracy, SubscriptionConfig, TrackerConfig};

// Position sources (platform location service abstraction)
pub mod source;
pub use source::{
    ChannelSource, ManualSource, PermissionStatus, PositionCallback, PositionEvent,
    PositionSender, PositionSource, SubscriptionHandle,
};

// Live distance tracker
pub mod tracker;
pub use tracker::{Tracker, TrackerSnapshot, TrackingState};

// Session summaries and duration clock
pub mod summary;
pub use summary::{SessionClock, SessionSummary};

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("SessionTrackerRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate in degrees (WGS84).
///
/// # Example
/// ```
/// use session_tracker::GeoPoint;
/// let point = GeoPoint::new(51.5007, -0.1246); // London
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gps_point_validity() {
        assert!(GeoPoint::new(51.5, -0.12).is_valid());
        assert!(GeoPoint::new(-90.0, 180.0).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -180.5).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, f64::INFINITY).is_valid());
    }
}
