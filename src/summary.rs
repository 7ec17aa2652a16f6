//! Session summaries and the wall-clock duration counter.
//!
//! Duration is measured independently of the tracker: the clock keeps
//! ticking even when GPS samples stall.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final `(duration, distance)` record of a finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Wall-clock duration in seconds
    pub duration_seconds: u32,
    /// Distance in kilometers
    pub distance_km: f64,
    pub started_at: DateTime<Utc>,
}

impl SessionSummary {
    pub fn new(duration_seconds: u32, distance_m: f64, started_at: DateTime<Utc>) -> Self {
        Self {
            duration_seconds,
            distance_km: distance_m.max(0.0) / 1000.0,
            started_at,
        }
    }

    /// Average speed in km/h, 0 for a zero-length session.
    pub fn average_speed_kmh(&self) -> f64 {
        if self.duration_seconds == 0 {
            return 0.0;
        }
        self.distance_km / (self.duration_seconds as f64 / 3600.0)
    }

    /// `m:ss`, minutes unbounded.
    pub fn formatted_duration(&self) -> String {
        format!(
            "{}:{:02}",
            self.duration_seconds / 60,
            self.duration_seconds % 60
        )
    }

    pub fn formatted_distance(&self) -> String {
        format!("{:.2} km", self.distance_km)
    }

    pub fn formatted_speed(&self) -> String {
        format!("{:.1} km/h", self.average_speed_kmh())
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Monotonic duration counter for a session.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    started: Instant,
    started_at: DateTime<Utc>,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed_seconds(&self) -> u32 {
        u32::try_from(self.started.elapsed().as_secs()).unwrap_or(u32::MAX)
    }

    /// Close the session with the distance read from the tracker.
    pub fn finish(&self, distance_m: f64) -> SessionSummary {
        SessionSummary::new(self.elapsed_seconds(), distance_m, self.started_at)
    }
}
