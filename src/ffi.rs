//! FFI bindings for mobile platforms (iOS/Android).
//!
//! The platform owns the location service: it resolves the permission
//! prompt, then forwards each fix into the tracker through a
//! [`ManualSource`]. All FFI functions log through `init_logging()`.

use std::sync::Arc;

use futures::executor::block_on;
use log::info;

use crate::source::{ManualSource, PermissionStatus};
use crate::{init_logging, GeoPoint, Tracker, TrackerConfig, TrackerError, TrackingState};

/// Snapshot record exposed to Kotlin/Swift.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTrackerSnapshot {
    pub total_distance_m: f64,
    pub state: TrackingState,
    /// User-facing message for the last error, if any
    pub last_error: Option<String>,
}

/// Distance tracker object for mobile hosts.
#[derive(uniffi::Object)]
pub struct FfiDistanceTracker {
    tracker: Tracker<ManualSource>,
}

#[uniffi::export]
impl FfiDistanceTracker {
    #[uniffi::constructor]
    pub fn new() -> Arc<Self> {
        init_logging();
        Arc::new(Self {
            tracker: Tracker::new(ManualSource::new()),
        })
    }

    /// Create with a (possibly partial) JSON `TrackerConfig`.
    #[uniffi::constructor]
    pub fn with_config_json(json: String) -> Result<Arc<Self>, TrackerError> {
        init_logging();
        let config = TrackerConfig::from_json(&json)?;
        info!("[SessionTrackerRust] Tracker created with config {:?}", config);
        Ok(Arc::new(Self {
            tracker: Tracker::with_config(ManualSource::new(), config),
        }))
    }

    /// Start a session once the platform has resolved the permission prompt.
    pub fn start_tracking(&self, permission_granted: bool) -> Result<(), TrackerError> {
        let permission = if permission_granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };
        self.tracker.source().set_permission(permission);
        block_on(self.tracker.start_tracking())
    }

    pub fn push_position(&self, latitude: f64, longitude: f64) {
        self.tracker.source().push(GeoPoint::new(latitude, longitude));
    }

    pub fn report_source_error(&self, message: String) {
        self.tracker.source().push_error(message);
    }

    pub fn stop_tracking(&self) {
        self.tracker.stop_tracking();
    }

    pub fn reset_distance(&self) {
        self.tracker.reset_distance();
    }

    pub fn reset(&self) {
        self.tracker.reset();
    }

    pub fn snapshot(&self) -> FfiTrackerSnapshot {
        let snapshot = self.tracker.snapshot();
        FfiTrackerSnapshot {
            total_distance_m: snapshot.total_distance_m,
            state: snapshot.state,
            last_error: snapshot.last_error.map(|e| e.to_string()),
        }
    }

    /// JSON `SessionSummary` of a stopped session, `None` otherwise.
    pub fn summary_json(&self, duration_seconds: u32) -> Option<String> {
        let summary = self.tracker.summary(duration_seconds)?;
        info!(
            "[SessionTrackerRust] Session summary: {} in {}",
            summary.formatted_distance(),
            summary.formatted_duration()
        );
        Some(summary.to_json())
    }
}

/// Great-circle distance in meters between two coordinates.
#[uniffi::export]
pub fn great_circle_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    crate::geo_utils::great_circle_distance(&GeoPoint::new(lat1, lon1), &GeoPoint::new(lat2, lon2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffi_session() {
        let tracker = FfiDistanceTracker::new();
        tracker.start_tracking(true).unwrap();
        tracker.push_position(51.5, -0.1246);
        tracker.push_position(51.50009, -0.1246);
        tracker.stop_tracking();

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, TrackingState::Stopped);
        assert!((snapshot.total_distance_m - 10.0).abs() < 0.1);
        assert!(tracker.summary_json(10).unwrap().contains("durationSeconds"));
    }

    #[test]
    fn test_ffi_permission_denied() {
        let tracker = FfiDistanceTracker::new();
        assert!(tracker.start_tracking(false).is_err());
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, TrackingState::Idle);
        assert!(snapshot.last_error.unwrap().contains("denied"));
    }

    #[test]
    fn test_ffi_config_json() {
        assert!(FfiDistanceTracker::with_config_json(r#"{"maxIncrementM": 0}"#.to_string()).is_err());
        assert!(FfiDistanceTracker::with_config_json("{}".to_string()).is_ok());
    }
}
