//! Notifications
//!
//! Discrete state changes (sequencer position, recording state, hardware
//! errors) are reported to interested parties through a `Notifier`.
//!
//! ```text
//!  render thread                      control thread
//!  NotificationProducer ──rtrb SPSC──▶ NotificationPump ──▶ Notifier<S>
//!      (never blocks)                    dispatch()           │
//!                                                    ┌────────┴────────┐
//!                                             ObserverRegistry   BridgeSink<B>
//! ```
//!
//! Delivery to observers is synchronous, in registration order, on the
//! thread that calls `dispatch` or `broadcast`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Vocabulary of engine notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum NotificationKind {
    SequencerPositionUpdated = 0,
    MarkerPositionReached = 1,
    SequencerTempoUpdated = 2,
    RecordingStateUpdated = 3,
    RecordedSnippetReady = 4,
    RecordedSnippetSaved = 5,
    BounceComplete = 6,
    StatusBridgeConnected = 7,
    ErrorHardwareUnavailable = 8,
    ErrorThreadStart = 9,
}

impl NotificationKind {
    /// Integer code understood by host bridges
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            NotificationKind::ErrorHardwareUnavailable | NotificationKind::ErrorThreadStart
        )
    }
}

/// A notification with its optional payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub value: Option<i32>,
}

impl Notification {
    pub fn new(kind: NotificationKind) -> Self {
        Self { kind, value: None }
    }

    pub fn with_value(kind: NotificationKind, value: i32) -> Self {
        Self {
            kind,
            value: Some(value),
        }
    }
}

/// Receiver of notifications inside the process
///
/// Implementations run on the delivering thread and must not block.
pub trait Observer: Send + Sync {
    fn handle_notification(&self, kind: NotificationKind);

    fn handle_notification_with_value(&self, kind: NotificationKind, value: i32);
}

/// Receiver of notifications outside the process (a UI host runtime)
pub trait HostBridge: Send + Sync {
    fn handle_notification(&self, kind: NotificationKind);

    fn handle_notification_with_value(&self, kind: NotificationKind, value: i32);
}

/// Backend a `Notifier` delivers to
pub trait NotificationSink {
    fn deliver(&self, notification: Notification);
}

/// In-process observer lists keyed by notification kind
#[derive(Default)]
pub struct ObserverRegistry {
    observers: HashMap<NotificationKind, Vec<Arc<dyn Observer>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_observer(&mut self, kind: NotificationKind, observer: Arc<dyn Observer>) {
        self.observers.entry(kind).or_default().push(observer);
    }

    /// Remove `observer` from the list of `kind`
    ///
    /// Returns whether it was registered.
    pub fn unregister_observer(&mut self, kind: NotificationKind, observer: &Arc<dyn Observer>) -> bool {
        let Some(list) = self.observers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|registered| !Arc::ptr_eq(registered, observer));
        before != list.len()
    }

    pub fn observer_count(&self, kind: NotificationKind) -> usize {
        self.observers.get(&kind).map_or(0, Vec::len)
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }
}

impl NotificationSink for ObserverRegistry {
    fn deliver(&self, notification: Notification) {
        let Some(list) = self.observers.get(&notification.kind) else {
            return;
        };
        for observer in list {
            match notification.value {
                Some(value) => observer.handle_notification_with_value(notification.kind, value),
                None => observer.handle_notification(notification.kind),
            }
        }
    }
}

/// Forwards every notification across a host bridge
pub struct BridgeSink<B: HostBridge> {
    bridge: B,
}

impl<B: HostBridge> BridgeSink<B> {
    /// Wrap `bridge`, signalling `StatusBridgeConnected` once
    pub fn new(bridge: B) -> Self {
        bridge.handle_notification(NotificationKind::StatusBridgeConnected);
        debug!("Host bridge connected");
        Self { bridge }
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }
}

impl<B: HostBridge> NotificationSink for BridgeSink<B> {
    fn deliver(&self, notification: Notification) {
        match notification.value {
            Some(value) => self
                .bridge
                .handle_notification_with_value(notification.kind, value),
            None => self.bridge.handle_notification(notification.kind),
        }
    }
}

/// Entry point for broadcasting notifications
///
/// Created by the control layer and passed by reference to whatever needs
/// to broadcast. There is no process-wide instance.
pub struct Notifier<S: NotificationSink> {
    sink: S,
}

impl<S: NotificationSink> Notifier<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn broadcast(&self, kind: NotificationKind) {
        self.sink.deliver(Notification::new(kind));
    }

    pub fn broadcast_value(&self, kind: NotificationKind, value: i32) {
        self.sink.deliver(Notification::with_value(kind, value));
    }

    pub fn deliver(&self, notification: Notification) {
        self.sink.deliver(notification);
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

impl Notifier<ObserverRegistry> {
    /// Notifier backed by an empty in-process registry
    pub fn with_registry() -> Self {
        Self::new(ObserverRegistry::new())
    }

    pub fn register_observer(&mut self, kind: NotificationKind, observer: Arc<dyn Observer>) {
        self.sink.register_observer(kind, observer);
    }

    pub fn unregister_observer(&mut self, kind: NotificationKind, observer: &Arc<dyn Observer>) -> bool {
        self.sink.unregister_observer(kind, observer)
    }
}

impl<B: HostBridge> Notifier<BridgeSink<B>> {
    /// Notifier forwarding to a host bridge
    pub fn with_bridge(bridge: B) -> Self {
        Self::new(BridgeSink::new(bridge))
    }
}

/// Create the lock-free queue carrying notifications off the render thread
pub fn notification_queue(capacity: usize) -> (NotificationProducer, NotificationPump) {
    let (producer, consumer) = RingBuffer::<Notification>::new(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));

    (
        NotificationProducer {
            producer,
            dropped: Arc::clone(&dropped),
        },
        NotificationPump {
            consumer,
            dropped,
            reported_drops: 0,
        },
    )
}

/// Render-side end of the notification queue
///
/// Posting never blocks or allocates. A full queue drops the notification
/// and counts the drop.
pub struct NotificationProducer {
    producer: Producer<Notification>,
    dropped: Arc<AtomicU64>,
}

impl NotificationProducer {
    #[inline]
    pub fn post(&mut self, kind: NotificationKind) -> bool {
        self.push(Notification::new(kind))
    }

    #[inline]
    pub fn post_value(&mut self, kind: NotificationKind, value: i32) -> bool {
        self.push(Notification::with_value(kind, value))
    }

    #[inline]
    pub fn push(&mut self, notification: Notification) -> bool {
        if self.producer.push(notification).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Total notifications dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Control-side end of the notification queue
pub struct NotificationPump {
    consumer: Consumer<Notification>,
    dropped: Arc<AtomicU64>,
    reported_drops: u64,
}

impl NotificationPump {
    /// Deliver every queued notification through `notifier`
    ///
    /// Returns the amount delivered.
    pub fn dispatch<S: NotificationSink>(&mut self, notifier: &Notifier<S>) -> usize {
        let mut delivered = 0;
        while let Ok(notification) = self.consumer.pop() {
            notifier.deliver(notification);
            delivered += 1;
        }

        let dropped = self.dropped.load(Ordering::Relaxed);
        if dropped > self.reported_drops {
            warn!(
                "Notification queue full - dropped {} notifications",
                dropped - self.reported_drops
            );
            self.reported_drops = dropped;
        }
        delivered
    }

    /// Take the next queued notification without delivering it
    pub fn try_next(&mut self) -> Option<Notification> {
        self.consumer.pop().ok()
    }

    pub fn pending(&self) -> usize {
        self.consumer.slots()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread;

    /// Observer appending every notification, tagged, to a shared log
    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<(&'static str, NotificationKind, Option<i32>)>>>,
    }

    impl Observer for Recorder {
        fn handle_notification(&self, kind: NotificationKind) {
            self.log.lock().unwrap().push((self.tag, kind, None));
        }

        fn handle_notification_with_value(&self, kind: NotificationKind, value: i32) {
            self.log.lock().unwrap().push((self.tag, kind, Some(value)));
        }
    }

    #[derive(Default)]
    struct RecordingBridge {
        received: Mutex<Vec<Notification>>,
    }

    impl HostBridge for RecordingBridge {
        fn handle_notification(&self, kind: NotificationKind) {
            self.received.lock().unwrap().push(Notification::new(kind));
        }

        fn handle_notification_with_value(&self, kind: NotificationKind, value: i32) {
            self.received
                .lock()
                .unwrap()
                .push(Notification::with_value(kind, value));
        }
    }

    #[test]
    fn test_observers_called_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let first: Arc<dyn Observer> = Arc::new(Recorder { tag: "first", log: Arc::clone(&log) });
        let second: Arc<dyn Observer> = Arc::new(Recorder { tag: "second", log: Arc::clone(&log) });

        let mut notifier = Notifier::with_registry();
        let kind = NotificationKind::SequencerPositionUpdated;
        notifier.register_observer(kind, Arc::clone(&first));
        notifier.register_observer(kind, Arc::clone(&second));

        notifier.broadcast_value(kind, 3);
        assert_eq!(
            *log.lock().unwrap(),
            vec![("first", kind, Some(3)), ("second", kind, Some(3))]
        );

        log.lock().unwrap().clear();
        assert!(notifier.unregister_observer(kind, &first));
        assert!(!notifier.unregister_observer(kind, &first));

        notifier.broadcast(kind);
        assert_eq!(*log.lock().unwrap(), vec![("second", kind, None)]);
    }

    #[test]
    fn test_broadcast_only_reaches_matching_kind() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let observer: Arc<dyn Observer> = Arc::new(Recorder { tag: "tempo", log: Arc::clone(&log) });

        let mut notifier = Notifier::with_registry();
        notifier.register_observer(NotificationKind::SequencerTempoUpdated, observer);
        notifier.broadcast(NotificationKind::BounceComplete);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(
            notifier.sink().observer_count(NotificationKind::SequencerTempoUpdated),
            1
        );
    }

    #[test]
    fn test_bridge_sink_signals_connection_once() {
        let notifier = Notifier::with_bridge(RecordingBridge::default());
        notifier.broadcast_value(NotificationKind::RecordedSnippetReady, 7);

        let received = notifier.sink().bridge().received.lock().unwrap().clone();
        assert_eq!(
            received,
            vec![
                Notification::new(NotificationKind::StatusBridgeConnected),
                Notification::with_value(NotificationKind::RecordedSnippetReady, 7),
            ]
        );
    }

    #[test]
    fn test_queue_drops_when_full() {
        let (mut producer, mut pump) = notification_queue(2);
        assert!(producer.post(NotificationKind::BounceComplete));
        assert!(producer.post(NotificationKind::BounceComplete));
        assert!(!producer.post(NotificationKind::BounceComplete));
        assert_eq!(producer.dropped(), 1);
        assert_eq!(pump.pending(), 2);

        let notifier = Notifier::with_registry();
        assert_eq!(pump.dispatch(&notifier), 2);
        assert_eq!(pump.dropped(), 1);
    }

    #[test]
    fn test_queue_delivers_in_order_across_threads() {
        let (mut producer, mut pump) = notification_queue(1024);

        let render = thread::spawn(move || {
            for step in 0..100 {
                producer.post_value(NotificationKind::SequencerPositionUpdated, step);
            }
        });
        render.join().unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let observer: Arc<dyn Observer> = Arc::new(Recorder { tag: "ui", log: Arc::clone(&log) });
        let mut notifier = Notifier::with_registry();
        notifier.register_observer(NotificationKind::SequencerPositionUpdated, observer);

        assert_eq!(pump.dispatch(&notifier), 100);
        let values: Vec<i32> = log.lock().unwrap().iter().filter_map(|(_, _, v)| *v).collect();
        assert_eq!(values, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_notification_serialization() {
        let notification = Notification::with_value(NotificationKind::MarkerPositionReached, 12);
        let json = serde_json::to_string(&notification).unwrap();
        assert!(json.contains("MarkerPositionReached"));

        let deserialized: Notification = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, notification);
        assert_eq!(NotificationKind::ErrorThreadStart.code(), 9);
        assert!(NotificationKind::ErrorHardwareUnavailable.is_error());
    }
}
