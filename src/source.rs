//! Position sources.
//!
//! A [`PositionSource`] is the tracker's view of the platform location
//! service: it answers the permission request and delivers fixes to a
//! callback until the returned [`SubscriptionHandle`] is cancelled.
//!
//! Two sources ship with the crate:
//! - [`ManualSource`] - the host pushes fixes synchronously (mobile FFI, tests)
//! - [`ChannelSource`] - fixes arrive on a tokio channel and are forwarded by a task

use std::future::{poll_fn, Future};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::Poll;

use log::debug;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::SubscriptionConfig;
use crate::error::{Result, TrackerError};
use crate::GeoPoint;

/// Outcome of a location permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// A single delivery from the location service.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionEvent {
    Fix(GeoPoint),
    Error(String),
}

/// Callback invoked for each delivered event, in platform order.
pub type PositionCallback = Arc<dyn Fn(PositionEvent) + Send + Sync>;

/// Live subscription. Dropping it cancels it.
pub trait SubscriptionHandle: Send {
    /// Stop delivery. Safe to call any number of times.
    fn cancel(&mut self);
}

/// Platform location capability consumed by the tracker.
pub trait PositionSource: Send + Sync {
    /// Ask for location access. May suspend awaiting the user.
    fn request_permission(&self) -> impl Future<Output = PermissionStatus> + Send;

    /// Start delivering events to `callback`.
    fn subscribe(
        &self,
        config: SubscriptionConfig,
        callback: PositionCallback,
    ) -> Result<Box<dyn SubscriptionHandle>>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Manual Source
// ============================================================================

struct ManualState {
    permission: PermissionStatus,
    unavailable: Option<String>,
    subscriber: Option<(u64, PositionCallback)>,
    next_id: u64,
    last_config: Option<SubscriptionConfig>,
}

/// Source driven directly by the host.
///
/// Clones share the same state, so the host can keep one clone for pushing
/// fixes while the tracker owns another.
#[derive(Clone)]
pub struct ManualSource {
    state: Arc<Mutex<ManualState>>,
}

impl ManualSource {
    /// New source that grants permission.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                permission: PermissionStatus::Granted,
                unavailable: None,
                subscriber: None,
                next_id: 0,
                last_config: None,
            })),
        }
    }

    pub fn set_permission(&self, permission: PermissionStatus) {
        lock(&self.state).permission = permission;
    }

    /// Make subsequent `subscribe` calls fail with `message`, or succeed again with `None`.
    pub fn set_unavailable(&self, message: Option<String>) {
        lock(&self.state).unavailable = message;
    }

    pub fn is_subscribed(&self) -> bool {
        lock(&self.state).subscriber.is_some()
    }

    /// Config passed to the most recent `subscribe`.
    pub fn last_config(&self) -> Option<SubscriptionConfig> {
        lock(&self.state).last_config
    }

    /// Deliver a fix. Returns false when nobody is subscribed.
    pub fn push(&self, point: GeoPoint) -> bool {
        self.deliver(PositionEvent::Fix(point))
    }

    /// Deliver a service error. Returns false when nobody is subscribed.
    pub fn push_error(&self, message: impl Into<String>) -> bool {
        self.deliver(PositionEvent::Error(message.into()))
    }

    fn deliver(&self, event: PositionEvent) -> bool {
        // Invoke outside our lock: the callback takes the tracker's lock,
        // and the tracker cancels us after releasing its own.
        let callback = lock(&self.state).subscriber.as_ref().map(|(_, cb)| cb.clone());
        match callback {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }
}

impl Default for ManualSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionSource for ManualSource {
    fn request_permission(&self) -> impl Future<Output = PermissionStatus> + Send {
        std::future::ready(lock(&self.state).permission)
    }

    fn subscribe(
        &self,
        config: SubscriptionConfig,
        callback: PositionCallback,
    ) -> Result<Box<dyn SubscriptionHandle>> {
        let mut state = lock(&self.state);
        if let Some(message) = &state.unavailable {
            return Err(TrackerError::source_unavailable(message.clone()));
        }
        state.next_id += 1;
        let id = state.next_id;
        state.subscriber = Some((id, callback));
        state.last_config = Some(config);
        Ok(Box::new(ManualSubscription {
            state: Arc::clone(&self.state),
            id,
            cancelled: false,
        }))
    }
}

struct ManualSubscription {
    state: Arc<Mutex<ManualState>>,
    id: u64,
    cancelled: bool,
}

impl SubscriptionHandle for ManualSubscription {
    fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        let mut state = lock(&self.state);
        // A newer subscription may have replaced ours; leave it alone.
        if matches!(state.subscriber, Some((id, _)) if id == self.id) {
            state.subscriber = None;
        }
    }
}

impl Drop for ManualSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ============================================================================
// Channel Source
// ============================================================================

/// Sending half handed to whatever produces fixes.
pub type PositionSender = mpsc::UnboundedSender<PositionEvent>;

/// Source fed through an unbounded tokio channel.
///
/// Each subscription spawns a forwarding task on `runtime` that drains the
/// channel in order. If every sender is dropped mid-session the task reports
/// a source error and exits.
///
/// Events sent while nobody is subscribed are discarded when the next
/// subscription starts, so a new session never sees fixes from a stopped one.
pub struct ChannelSource {
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<PositionEvent>>>,
    runtime: Handle,
    permission: PermissionStatus,
    last_config: Mutex<Option<SubscriptionConfig>>,
}

impl ChannelSource {
    pub fn new(runtime: Handle) -> (Self, PositionSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Self {
            receiver: Arc::new(Mutex::new(rx)),
            runtime,
            permission: PermissionStatus::Granted,
            last_config: Mutex::new(None),
        };
        (source, tx)
    }

    pub fn with_permission(mut self, permission: PermissionStatus) -> Self {
        self.permission = permission;
        self
    }

    /// Config passed to the most recent `subscribe`.
    pub fn last_config(&self) -> Option<SubscriptionConfig> {
        *lock(&self.last_config)
    }
}

enum Forwarded {
    Event(PositionEvent),
    Cancelled,
    Closed,
}

impl PositionSource for ChannelSource {
    fn request_permission(&self) -> impl Future<Output = PermissionStatus> + Send {
        std::future::ready(self.permission)
    }

    fn subscribe(
        &self,
        config: SubscriptionConfig,
        callback: PositionCallback,
    ) -> Result<Box<dyn SubscriptionHandle>> {
        debug!(
            "[ChannelSource] Subscribing ({:?}, {}ms, {}m)",
            config.accuracy, config.min_interval_ms, config.min_distance_m
        );
        *lock(&self.last_config) = Some(config);

        // Previous forwarders were flagged on cancel, so once we hold the
        // lock nothing else can pull from the queue.
        let mut discarded = 0usize;
        {
            let mut rx = lock(&self.receiver);
            while rx.try_recv().is_ok() {
                discarded += 1;
            }
        }
        if discarded > 0 {
            debug!("[ChannelSource] Discarded {} queued events", discarded);
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let receiver = Arc::clone(&self.receiver);
        let flag = Arc::clone(&cancelled);
        let task = self.runtime.spawn(async move {
            loop {
                // The lock is only held inside a single poll, never across an await
                let next = poll_fn(|cx| {
                    let mut rx = lock(&receiver);
                    if flag.load(Ordering::Acquire) {
                        return Poll::Ready(Forwarded::Cancelled);
                    }
                    rx.poll_recv(cx).map(|event| match event {
                        Some(event) => Forwarded::Event(event),
                        None => Forwarded::Closed,
                    })
                })
                .await;

                match next {
                    Forwarded::Event(event) => callback(event),
                    Forwarded::Cancelled => return,
                    Forwarded::Closed => {
                        debug!("[ChannelSource] All senders dropped");
                        callback(PositionEvent::Error("position stream closed".to_string()));
                        return;
                    }
                }
            }
        });
        Ok(Box::new(ChannelSubscription {
            task: Some(task),
            cancelled,
        }))
    }
}

struct ChannelSubscription {
    task: Option<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
}

impl SubscriptionHandle for ChannelSubscription {
    fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrackerConfig;

    fn recording_callback() -> (PositionCallback, Arc<Mutex<Vec<PositionEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let callback: PositionCallback = Arc::new(move |event| sink.lock().unwrap().push(event));
        (callback, events)
    }

    #[test]
    fn test_manual_push_without_subscriber() {
        let source = ManualSource::new();
        assert!(!source.push(GeoPoint::new(0.0, 0.0)));
        assert!(!source.is_subscribed());
    }

    #[test]
    fn test_manual_delivery_and_cancel() {
        let source = ManualSource::new();
        let (callback, events) = recording_callback();
        let mut handle = source
            .subscribe(TrackerConfig::default().subscription(), callback)
            .unwrap();

        assert!(source.push(GeoPoint::new(1.0, 2.0)));
        assert!(source.push_error("lost fix"));
        handle.cancel();
        handle.cancel();
        assert!(!source.push(GeoPoint::new(3.0, 4.0)));

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                PositionEvent::Fix(GeoPoint::new(1.0, 2.0)),
                PositionEvent::Error("lost fix".to_string()),
            ]
        );
    }

    #[test]
    fn test_stale_handle_does_not_cancel_newer_subscription() {
        let source = ManualSource::new();
        let config = TrackerConfig::default().subscription();
        let (first, _) = recording_callback();
        let (second, _) = recording_callback();

        let mut old = source.subscribe(config, first).unwrap();
        let _new = source.subscribe(config, second).unwrap();
        old.cancel();
        assert!(source.is_subscribed());
    }

    #[test]
    fn test_drop_cancels() {
        let source = ManualSource::new();
        let (callback, _) = recording_callback();
        {
            let _handle = source
                .subscribe(TrackerConfig::default().subscription(), callback)
                .unwrap();
            assert!(source.is_subscribed());
        }
        assert!(!source.is_subscribed());
    }

    #[test]
    fn test_manual_unavailable() {
        let source = ManualSource::new();
        source.set_unavailable(Some("no GPS hardware".to_string()));
        let (callback, _) = recording_callback();
        let result = source.subscribe(TrackerConfig::default().subscription(), callback);
        assert!(matches!(result, Err(TrackerError::SourceUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_channel_records_config() {
        let (source, _tx) = ChannelSource::new(Handle::current());
        assert!(source.last_config().is_none());

        let (callback, _) = recording_callback();
        let config = TrackerConfig::default().subscription();
        let _handle = source.subscribe(config, callback).unwrap();
        assert_eq!(source.last_config(), Some(config));
    }

    #[tokio::test]
    async fn test_channel_discards_events_queued_before_subscribe() {
        let (source, tx) = ChannelSource::new(Handle::current());
        tx.send(PositionEvent::Fix(GeoPoint::new(1.0, 1.0))).unwrap();
        tx.send(PositionEvent::Error("stale".to_string())).unwrap();

        let (callback, events) = recording_callback();
        let _handle = source
            .subscribe(TrackerConfig::default().subscription(), callback)
            .unwrap();
        tx.send(PositionEvent::Fix(GeoPoint::new(2.0, 2.0))).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(
            *events.lock().unwrap(),
            vec![PositionEvent::Fix(GeoPoint::new(2.0, 2.0))]
        );
    }

    #[tokio::test]
    async fn test_channel_cancelled_forwarder_delivers_nothing() {
        let (source, tx) = ChannelSource::new(Handle::current());
        let config = TrackerConfig::default().subscription();

        let (old_callback, old_events) = recording_callback();
        let mut old = source.subscribe(config, old_callback).unwrap();
        old.cancel();
        old.cancel();

        tx.send(PositionEvent::Fix(GeoPoint::new(3.0, 3.0))).unwrap();
        let (callback, events) = recording_callback();
        let _handle = source.subscribe(config, callback).unwrap();
        tx.send(PositionEvent::Fix(GeoPoint::new(4.0, 4.0))).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(old_events.lock().unwrap().is_empty());
        assert_eq!(
            *events.lock().unwrap(),
            vec![PositionEvent::Fix(GeoPoint::new(4.0, 4.0))]
        );
    }
}
