//! # Distance Tracker
//!
//! Owns the lifecycle of one tracking session and the distance accumulated
//! during it.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --start_tracking--> Tracking --stop_tracking--> Stopped
//!   ^                                                     |
//!   +------------------------- reset ---------------------+
//! ```
//!
//! All mutable state lives in a single mutex-guarded `Session`. Position
//! callbacks, the control operations and `snapshot` all go through that
//! lock, so an update never interleaves with a transition and readers never
//! see a torn distance.
//!
//! Every subscription is tagged with an epoch. Callbacks from a subscription
//! that belongs to an earlier epoch, or that arrive once the session has left
//! `Tracking`, are dropped before touching any state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::geo_utils::great_circle_distance;
use crate::policy::AcceptancePolicy;
use crate::source::{PermissionStatus, PositionCallback, PositionEvent, PositionSource, SubscriptionHandle};
use crate::summary::SessionSummary;
use crate::{GeoPoint, TrackerConfig};

// ============================================================================
// Core Types
// ============================================================================

/// Lifecycle state of a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum TrackingState {
    Idle,
    Tracking,
    Stopped,
}

/// Point-in-time read of the tracker's observable state.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSnapshot {
    /// Accumulated distance in meters (never negative)
    pub total_distance_m: f64,
    pub state: TrackingState,
    /// Most recent permission or source error, if any
    pub last_error: Option<TrackerError>,
}

impl TrackerSnapshot {
    pub fn distance_km(&self) -> f64 {
        self.total_distance_m / 1000.0
    }
}

/// What happened to a single fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum FixOutcome {
    /// Not tracking, or from a stale subscription
    Ignored,
    /// Non-finite or out-of-range coordinates
    Invalid,
    /// Became the first reference point
    Reference,
    Accepted(f64),
    Rejected(f64),
}

// ============================================================================
// Session State
// ============================================================================

struct Session {
    state: TrackingState,
    total_distance_m: f64,
    reference: Option<GeoPoint>,
    last_error: Option<TrackerError>,
    started_at: Option<DateTime<Utc>>,
    epoch: u64,
    subscription: Option<Box<dyn SubscriptionHandle>>,
}

impl Session {
    fn new() -> Self {
        Self {
            state: TrackingState::Idle,
            total_distance_m: 0.0,
            reference: None,
            last_error: None,
            started_at: None,
            epoch: 0,
            subscription: None,
        }
    }

    /// Enter `Tracking` with a clean accumulator. Returns the new epoch.
    fn begin(&mut self, now: DateTime<Utc>) -> u64 {
        self.epoch += 1;
        self.state = TrackingState::Tracking;
        self.total_distance_m = 0.0;
        self.reference = None;
        self.last_error = None;
        self.started_at = Some(now);
        self.epoch
    }

    /// Back to `Idle`, handing out any live subscription for cancellation.
    fn clear(&mut self) -> Option<Box<dyn SubscriptionHandle>> {
        self.epoch += 1;
        self.state = TrackingState::Idle;
        self.total_distance_m = 0.0;
        self.reference = None;
        self.last_error = None;
        self.started_at = None;
        self.subscription.take()
    }

    fn apply_fix(&mut self, point: GeoPoint, policy: &AcceptancePolicy) -> FixOutcome {
        if self.state != TrackingState::Tracking {
            return FixOutcome::Ignored;
        }
        if !point.is_valid() {
            return FixOutcome::Invalid;
        }
        let Some(reference) = self.reference else {
            self.reference = Some(point);
            return FixOutcome::Reference;
        };

        let distance = great_circle_distance(&reference, &point);
        if policy.accepts(distance) {
            self.total_distance_m += distance;
            self.reference = Some(point);
            FixOutcome::Accepted(distance)
        } else {
            // Keep the old reference so a single spike can't shift the baseline
            FixOutcome::Rejected(distance)
        }
    }

    fn record_source_error(&mut self, message: String) -> bool {
        if self.state != TrackingState::Tracking {
            return false;
        }
        self.last_error = Some(TrackerError::SourceUnavailable { message });
        true
    }

    fn handle_event(&mut self, epoch: u64, event: PositionEvent, policy: &AcceptancePolicy) {
        if epoch != self.epoch {
            return;
        }
        match event {
            PositionEvent::Fix(point) => log_outcome(point, self.apply_fix(point, policy)),
            PositionEvent::Error(message) => {
                warn!("[DistanceTracker] Location service error: {}", message);
                self.record_source_error(message);
            }
        }
    }

    fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            total_distance_m: self.total_distance_m,
            state: self.state,
            last_error: self.last_error.clone(),
        }
    }
}

fn log_outcome(point: GeoPoint, outcome: FixOutcome) {
    match outcome {
        FixOutcome::Ignored => {}
        FixOutcome::Invalid => debug!(
            "[DistanceTracker] Dropped invalid sample ({}, {})",
            point.latitude, point.longitude
        ),
        FixOutcome::Reference => debug!(
            "[DistanceTracker] Reference set at ({:.6}, {:.6})",
            point.latitude, point.longitude
        ),
        FixOutcome::Accepted(d) => debug!("[DistanceTracker] +{:.1}m", d),
        FixOutcome::Rejected(d) => debug!("[DistanceTracker] Rejected {:.1}m increment as noise", d),
    }
}

fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Tracker
// ============================================================================

/// Live session distance tracker.
///
/// Construct one per session; `reset` returns it to `Idle` for reuse.
/// Instances share nothing with each other.
///
/// # Example
/// ```
/// use session_tracker::{GeoPoint, ManualSource, Tracker, TrackingState};
///
/// # block_on(async {
/// let source = ManualSource::new();
/// let tracker = Tracker::new(source.clone());
/// tracker.start_tracking().await.unwrap();
///
/// source.push(GeoPoint::new(51.50000, -0.12460));
/// source.push(GeoPoint::new(51.50009, -0.12460));
///
/// tracker.stop_tracking();
/// let snapshot = tracker.snapshot();
/// assert_eq!(snapshot.state, TrackingState::Stopped);
/// assert!((snapshot.total_distance_m - 10.0).abs() < 0.1);
/// # });
/// # fn block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct Tracker<S: PositionSource> {
    source: S,
    config: TrackerConfig,
    policy: AcceptancePolicy,
    session: Arc<Mutex<Session>>,
}

impl<S: PositionSource> Tracker<S> {
    /// Create a tracker with default configuration.
    pub fn new(source: S) -> Self {
        Self::with_config(source, TrackerConfig::default())
    }

    /// Create a tracker with custom configuration.
    pub fn with_config(source: S, config: TrackerConfig) -> Self {
        Self {
            source,
            policy: AcceptancePolicy::new(config.max_increment_m),
            config,
            session: Arc::new(Mutex::new(Session::new())),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Request location access and begin a session.
    ///
    /// No-op when already tracking. On denial the tracker stays `Idle`,
    /// records `PermissionDenied` and returns it. A `Stopped` tracker must be
    /// `reset` first.
    pub async fn start_tracking(&self) -> Result<()> {
        let state = lock(&self.session).state;
        match state {
            TrackingState::Tracking => {
                debug!("[DistanceTracker] start_tracking ignored: already tracking");
                return Ok(());
            }
            TrackingState::Stopped => return Err(TrackerError::SessionEnded),
            TrackingState::Idle => {}
        }

        if self.source.request_permission().await == PermissionStatus::Denied {
            warn!("[DistanceTracker] Location permission denied");
            let mut session = lock(&self.session);
            if session.state == TrackingState::Idle {
                session.last_error = Some(TrackerError::PermissionDenied);
            }
            return Err(TrackerError::PermissionDenied);
        }

        // The session may have moved on while we were waiting for permission
        let epoch = {
            let mut session = lock(&self.session);
            match session.state {
                TrackingState::Tracking => return Ok(()),
                TrackingState::Stopped => return Err(TrackerError::SessionEnded),
                TrackingState::Idle => session.begin(Utc::now()),
            }
        };

        match self
            .source
            .subscribe(self.config.subscription(), self.callback(epoch))
        {
            Ok(handle) => {
                let stale = {
                    let mut session = lock(&self.session);
                    if session.epoch == epoch && session.state == TrackingState::Tracking {
                        session.subscription = Some(handle);
                        None
                    } else {
                        Some(handle)
                    }
                };
                if let Some(mut handle) = stale {
                    handle.cancel();
                    debug!("[DistanceTracker] Session ended during subscribe");
                    return Ok(());
                }
                info!(
                    "[DistanceTracker] Tracking started ({:?}, {}ms, {}m)",
                    self.config.accuracy, self.config.min_interval_ms, self.config.min_distance_m
                );
                Ok(())
            }
            Err(err) => {
                warn!("[DistanceTracker] Subscribe failed: {}", err);
                let mut session = lock(&self.session);
                if session.epoch == epoch {
                    session.clear();
                    session.last_error = Some(err.clone());
                }
                Err(err)
            }
        }
    }

    /// End the session. Distance stays readable; no update applies after this returns.
    pub fn stop_tracking(&self) {
        let handle = {
            let mut session = lock(&self.session);
            if session.state != TrackingState::Tracking {
                return;
            }
            session.state = TrackingState::Stopped;
            session.subscription.take()
        };
        if let Some(mut handle) = handle {
            handle.cancel();
        }
        info!(
            "[DistanceTracker] Tracking stopped at {:.0}m",
            self.snapshot().total_distance_m
        );
    }

    /// Zero the distance and forget the reference point. State is unchanged.
    pub fn reset_distance(&self) {
        let mut session = lock(&self.session);
        session.total_distance_m = 0.0;
        session.reference = None;
        debug!("[DistanceTracker] Distance reset");
    }

    /// Cancel any subscription and return to `Idle` with a clean slate.
    pub fn reset(&self) {
        let handle = lock(&self.session).clear();
        if let Some(mut handle) = handle {
            handle.cancel();
        }
        info!("[DistanceTracker] Reset to idle");
    }

    // ========================================================================
    // Position Stream
    // ========================================================================

    /// Apply a fix directly. Ignored unless tracking.
    pub fn on_position_update(&self, point: GeoPoint) {
        let outcome = lock(&self.session).apply_fix(point, &self.policy);
        log_outcome(point, outcome);
    }

    /// Record a location service failure. Tracking continues without new samples.
    pub fn on_source_error(&self, message: impl Into<String>) {
        let message = message.into();
        if lock(&self.session).record_source_error(message.clone()) {
            warn!("[DistanceTracker] Location service error: {}", message);
        }
    }

    fn callback(&self, epoch: u64) -> PositionCallback {
        let session = Arc::downgrade(&self.session);
        let policy = self.policy;
        Arc::new(move |event| {
            if let Some(session) = session.upgrade() {
                lock(&session).handle_event(epoch, event, &policy);
            }
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn snapshot(&self) -> TrackerSnapshot {
        lock(&self.session).snapshot()
    }

    pub fn state(&self) -> TrackingState {
        lock(&self.session).state
    }

    pub fn is_tracking(&self) -> bool {
        self.state() == TrackingState::Tracking
    }

    /// When the current session entered `Tracking`.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        lock(&self.session).started_at
    }

    /// Summary of a stopped session, with the duration measured by the caller.
    pub fn summary(&self, duration_seconds: u32) -> Option<SessionSummary> {
        let session = lock(&self.session);
        if session.state != TrackingState::Stopped {
            return None;
        }
        let started_at = session.started_at?;
        Some(SessionSummary::new(
            duration_seconds,
            session.total_distance_m,
            started_at,
        ))
    }
}
