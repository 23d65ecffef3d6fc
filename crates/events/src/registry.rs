//! In-process event registry: registration, subscription, synchronous fan-out.
//!
//! ## Model
//!
//! Each registered event owns three things, created and destroyed together:
//!
//! ```text
//! EventName ─┬─ payload shapes   (set, never empty while registered)
//!            ├─ subscribers      (insertion ordered, ids from one global counter)
//!            └─ history          (bounded ring of delivered payloads)
//! ```
//!
//! An event exists exactly as long as at least one shape is registered for it.
//! Withdrawing the last shape drops its subscribers and history as well.
//!
//! ## Concurrency
//!
//! One `RwLock` guards the whole registry. `publish` validates the payload and
//! snapshots the subscriber list under a read lock, then releases it before
//! invoking any callback. Subscribers may therefore subscribe, unsubscribe or
//! publish from inside a callback; such changes apply to the next publish.
//!
//! No subscriber code runs while the lock is held, so the lock can only be
//! poisoned by a bug in the registry itself. Poisoned guards are recovered.
//!
//! Payload validators (see [`PayloadShape`]) do run under the read lock and
//! must not call back into the registry.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, warn};

use eventbroker_core::{EventName, SubscriberId};

use crate::bus::EventPublisher;
use crate::config::{FailurePolicy, RegistryConfig};
use crate::error::{EventError, EventResult};
use crate::history::{HistoryBuffer, HistoryEntry};
use crate::shape::PayloadShape;
use crate::subscriber::{RegistrationHandle, Subscriber, SubscriptionHandle};

/// Event history keyed by event name.
pub type EventHistory<P> = BTreeMap<EventName, Vec<HistoryEntry<P>>>;

struct EventEntry<P> {
    name: EventName,
    /// Registration order, used to list events deterministically. Unique per
    /// event creation, so it also tells a re-registered event from its
    /// predecessor.
    order: u64,
    shapes: Vec<PayloadShape<P>>,
    subscribers: Vec<(SubscriberId, Subscriber<P>)>,
    history: HistoryBuffer<P>,
}

struct RegistryState<P> {
    events: HashMap<EventName, EventEntry<P>>,
    next_order: u64,
}

/// Process-local publish/subscribe registry for payloads of type `P`.
///
/// Construct one at startup and share it (`Arc<EventRegistry<P>>`) with every
/// component that registers, subscribes or publishes. Independent registries
/// never share state, including the subscriber id counter.
pub struct EventRegistry<P> {
    state: RwLock<RegistryState<P>>,
    next_subscriber: AtomicU64,
    config: RegistryConfig,
}

impl<P> EventRegistry<P> {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            state: RwLock::new(RegistryState {
                events: HashMap::new(),
                next_order: 0,
            }),
            next_subscriber: AtomicU64::new(1),
            config,
        }
    }

    /// Registry configured from `EVENTBROKER_*` environment variables.
    pub fn from_env() -> Self {
        Self::with_config(RegistryConfig::from_env())
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState<P>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState<P>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `shape` as an accepted payload for `event`.
    ///
    /// Creates the event on first registration. Registering a shape name that
    /// is already present is a no-op.
    ///
    /// Event names must be non-empty, so `""` is refused with
    /// [`EventError::InvalidEventName`] and nothing is registered. Any other
    /// name always succeeds.
    pub fn register_event(
        &self,
        event: impl AsRef<str>,
        shape: PayloadShape<P>,
    ) -> EventResult<RegistrationHandle> {
        let event = event.as_ref();
        let name =
            EventName::new(event).map_err(|_| EventError::InvalidEventName(event.to_string()))?;
        let handle = RegistrationHandle::new(name.clone(), shape.name());

        let mut guard = self.write();
        let state = &mut *guard;
        match state.events.entry(name.clone()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if !entry.shapes.contains(&shape) {
                    debug!(event = %handle.event(), shape = shape.name(), "payload shape added");
                    entry.shapes.push(shape);
                }
            }
            Entry::Vacant(vacant) => {
                debug!(event = %handle.event(), shape = shape.name(), "event registered");
                vacant.insert(EventEntry {
                    name,
                    order: state.next_order,
                    shapes: vec![shape],
                    subscribers: Vec::new(),
                    history: HistoryBuffer::new(self.config.history.capacity),
                });
                state.next_order += 1;
            }
        }

        Ok(handle)
    }

    /// Withdraw the shape named by `handle`.
    ///
    /// Removing the last shape removes the event together with its subscribers
    /// and history. Calling this again with the same handle is a no-op.
    pub fn unregister(&self, handle: &RegistrationHandle) {
        let mut guard = self.write();
        let Some(entry) = guard.events.get_mut(handle.event().as_str()) else {
            return;
        };

        let before = entry.shapes.len();
        entry.shapes.retain(|shape| shape.name() != handle.shape());
        if entry.shapes.len() == before {
            return;
        }
        let now_empty = entry.shapes.is_empty();
        debug!(event = %handle.event(), shape = handle.shape(), "payload shape removed");

        if now_empty {
            guard.events.remove(handle.event().as_str());
            debug!(event = %handle.event(), "event removed");
        }
    }

    /// Subscribe `callback` to `event`, returning its id.
    pub fn subscribe<F>(&self, event: impl AsRef<str>, callback: F) -> EventResult<SubscriberId>
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.subscribe_shared(event, Arc::new(callback))
    }

    /// Like [`subscribe`](Self::subscribe), for a callback the caller keeps a handle to.
    pub fn subscribe_shared(
        &self,
        event: impl AsRef<str>,
        callback: Subscriber<P>,
    ) -> EventResult<SubscriberId> {
        let event = event.as_ref();
        let mut guard = self.write();
        let entry = guard
            .events
            .get_mut(event)
            .ok_or_else(|| EventError::event_not_found(event))?;

        // Allocated under the write lock so id order matches insertion order.
        let id = SubscriberId::from_sequence(self.next_subscriber.fetch_add(1, Ordering::Relaxed));
        entry.subscribers.push((id.clone(), callback));
        debug!(event = event, subscriber = %id, "subscriber added");

        Ok(id)
    }

    /// Subscribe and get back a handle for [`cancel`](Self::cancel).
    pub fn subscribe_handle<F>(
        &self,
        event: impl AsRef<str>,
        callback: F,
    ) -> EventResult<SubscriptionHandle>
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let event = event.as_ref();
        let name = EventName::new(event).map_err(|_| EventError::event_not_found(event))?;
        let id = self.subscribe(&name, callback)?;
        Ok(SubscriptionHandle::new(name, id))
    }

    /// Drop the subscription behind `handle`.
    ///
    /// Returns `false` if it was already gone (cancelled, unsubscribed, or its
    /// event removed). Never errors.
    pub fn cancel(&self, handle: &SubscriptionHandle) -> bool {
        self.unsubscribe(handle.event(), handle.id()).is_ok()
    }

    /// Remove subscriber `subscriber` from `event`.
    pub fn unsubscribe(
        &self,
        event: impl AsRef<str>,
        subscriber: impl AsRef<str>,
    ) -> EventResult<bool> {
        let (event, subscriber) = (event.as_ref(), subscriber.as_ref());
        let mut guard = self.write();
        let entry = guard
            .events
            .get_mut(event)
            .ok_or_else(|| EventError::event_not_found(event))?;

        let Some(pos) = entry
            .subscribers
            .iter()
            .position(|(id, _)| id.as_str() == subscriber)
        else {
            return Err(EventError::SubscriberNotFound {
                event: entry.name.clone(),
                subscriber: SubscriberId::from(subscriber),
            });
        };

        entry.subscribers.remove(pos);
        debug!(event = event, subscriber = subscriber, "subscriber removed");
        Ok(true)
    }

    pub fn is_registered(&self, event: impl AsRef<str>) -> bool {
        self.read().events.contains_key(event.as_ref())
    }

    /// Names of all registered events, in registration order.
    pub fn list_registered_events(&self) -> Vec<EventName> {
        let guard = self.read();
        let mut entries: Vec<&EventEntry<P>> = guard.events.values().collect();
        entries.sort_unstable_by_key(|entry| entry.order);
        entries.into_iter().map(|entry| entry.name.clone()).collect()
    }

    /// Callbacks subscribed to `event`, in subscription order.
    pub fn list_subscribers(&self, event: impl AsRef<str>) -> EventResult<Vec<Subscriber<P>>> {
        self.with_entry(event.as_ref(), |entry| {
            entry
                .subscribers
                .iter()
                .map(|(_, callback)| Arc::clone(callback))
                .collect()
        })
    }

    /// Ids subscribed to `event`, in subscription order.
    pub fn list_subscriber_ids(&self, event: impl AsRef<str>) -> EventResult<Vec<SubscriberId>> {
        self.with_entry(event.as_ref(), |entry| {
            entry.subscribers.iter().map(|(id, _)| id.clone()).collect()
        })
    }

    pub fn subscriber_count(&self, event: impl AsRef<str>) -> EventResult<usize> {
        self.with_entry(event.as_ref(), |entry| entry.subscribers.len())
    }

    /// Shapes accepted by `event`, in registration order.
    pub fn list_payload_types(&self, event: impl AsRef<str>) -> EventResult<Vec<PayloadShape<P>>> {
        self.with_entry(event.as_ref(), |entry| entry.shapes.clone())
    }

    /// Remove and return recorded history.
    ///
    /// Same selection rules as [`get_event_history`](Self::get_event_history).
    /// Intended for sinks that persist history outside the process.
    pub fn drain_event_history(&self, event: Option<&str>) -> EventResult<EventHistory<P>> {
        let mut guard = self.write();
        match event {
            Some(event) => {
                let entry = guard
                    .events
                    .get_mut(event)
                    .ok_or_else(|| EventError::event_not_found(event))?;
                Ok(BTreeMap::from([(entry.name.clone(), entry.history.drain())]))
            }
            None => Ok(guard
                .events
                .values_mut()
                .map(|entry| (entry.name.clone(), entry.history.drain()))
                .collect()),
        }
    }

    fn with_entry<T>(&self, event: &str, f: impl FnOnce(&EventEntry<P>) -> T) -> EventResult<T> {
        let guard = self.read();
        let entry = guard
            .events
            .get(event)
            .ok_or_else(|| EventError::event_not_found(event))?;
        Ok(f(entry))
    }
}

impl<P: Clone> EventRegistry<P> {
    /// Recorded history for `event`, or for every registered event when `None`.
    ///
    /// History of removed events is gone with them.
    pub fn get_event_history(&self, event: Option<&str>) -> EventResult<EventHistory<P>> {
        match event {
            Some(event) => self.with_entry(event, |entry| {
                BTreeMap::from([(entry.name.clone(), entry.history.snapshot())])
            }),
            None => Ok(self
                .read()
                .events
                .values()
                .map(|entry| (entry.name.clone(), entry.history.snapshot()))
                .collect()),
        }
    }
}

impl<P> EventRegistry<P> {
    /// Deliver `payload` to every subscriber of `event`, in subscription order.
    ///
    /// Fails with `EventNotFound` for unknown events and `InvalidPayloadType`
    /// when no registered shape accepts the payload; no subscriber runs in
    /// either case.
    ///
    /// Under [`FailurePolicy::Propagate`] a panicking subscriber unwinds out
    /// of this call, later subscribers are skipped and no history is recorded.
    /// Under [`FailurePolicy::Isolate`] the panic is logged and fan-out
    /// continues.
    pub fn publish(&self, event: impl AsRef<str>, payload: P) -> EventResult<()> {
        let event = event.as_ref();
        let (name, order, subscribers) = {
            let guard = self.read();
            let Some(entry) = guard.events.get(event) else {
                warn!(event = event, "publish to unregistered event");
                return Err(EventError::event_not_found(event));
            };
            if !entry.shapes.iter().any(|shape| shape.matches(&payload)) {
                warn!(event = event, "publish rejected: payload matches no registered shape");
                return Err(EventError::InvalidPayloadType(entry.name.clone()));
            }
            let snapshot: Vec<(SubscriberId, Subscriber<P>)> = entry
                .subscribers
                .iter()
                .map(|(id, callback)| (id.clone(), Arc::clone(callback)))
                .collect();
            (entry.name.clone(), entry.order, snapshot)
        };

        let started = Instant::now();
        let mut failed = 0usize;
        for (id, callback) in &subscribers {
            match self.config.failure_policy {
                FailurePolicy::Propagate => callback(&payload),
                FailurePolicy::Isolate => {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(&payload)));
                    if let Err(panic) = outcome {
                        failed += 1;
                        error!(
                            event = %name,
                            subscriber = %id,
                            reason = panic_message(&*panic),
                            "subscriber panicked; continuing fan-out"
                        );
                    }
                }
            }
        }
        let elapsed = started.elapsed();

        debug!(
            event = %name,
            subscribers = subscribers.len(),
            failed = failed,
            duration_ms = elapsed.as_secs_f64() * 1_000.0,
            "event published"
        );

        if self.config.history.enabled {
            // The event may have been removed, or removed and registered again,
            // during dispatch; only the event that validated the payload records it.
            let mut guard = self.write();
            if let Some(entry) = guard
                .events
                .get_mut(name.as_str())
                .filter(|entry| entry.order == order)
            {
                entry
                    .history
                    .push(HistoryEntry::new(payload, Utc::now(), elapsed));
            }
        }

        Ok(())
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

impl<P> Default for EventRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> core::fmt::Debug for EventRegistry<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("events", &self.list_registered_events())
            .field("next_subscriber", &self.next_subscriber.load(Ordering::Relaxed))
            .field("config", &self.config)
            .finish()
    }
}

impl<P> EventPublisher<P> for EventRegistry<P>
where
    P: Send + Sync,
{
    fn publish(&self, event: &str, payload: P) -> EventResult<()> {
        EventRegistry::publish(self, event, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::shape::{AnyPayload, any_payload};

    #[derive(Debug, Clone, PartialEq)]
    struct TestPayload(String);

    fn registry() -> EventRegistry<AnyPayload> {
        EventRegistry::new()
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Subscriber<AnyPayload>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = Arc::clone(&log);
            move |label: &str| -> Subscriber<AnyPayload> {
                let log = Arc::clone(&log);
                let label = label.to_string();
                Arc::new(move |_: &AnyPayload| log.lock().unwrap().push(label.clone()))
            }
        };
        (log, make)
    }

    #[test]
    fn unregister_is_idempotent() {
        let reg = registry();
        let handle = reg
            .register_event("e", PayloadShape::of::<TestPayload>())
            .unwrap();
        assert_eq!(reg.list_registered_events(), vec!["e"]);

        reg.unregister(&handle);
        assert!(reg.list_registered_events().is_empty());
        reg.unregister(&handle);
        assert!(reg.list_registered_events().is_empty());
    }

    #[test]
    fn registering_same_shape_twice_keeps_one() {
        let reg = registry();
        let first = reg.register_event("e", PayloadShape::of::<TestPayload>()).unwrap();
        let second = reg.register_event("e", PayloadShape::of::<TestPayload>()).unwrap();
        assert_eq!(first, second);
        assert_eq!(reg.list_payload_types("e").unwrap().len(), 1);

        // One unregister withdraws the single shape.
        reg.unregister(&second);
        assert!(!reg.is_registered("e"));
    }

    #[test]
    fn empty_event_name_is_rejected() {
        let reg = registry();
        let err = reg
            .register_event("", PayloadShape::of::<TestPayload>())
            .unwrap_err();
        assert_eq!(err, EventError::InvalidEventName(String::new()));
        assert!(reg.list_registered_events().is_empty());
    }

    #[test]
    fn removing_last_shape_drops_subscribers_and_history() {
        let reg = registry();
        let handle = reg.register_event("e", PayloadShape::of::<TestPayload>()).unwrap();
        reg.subscribe("e", |_| {}).unwrap();
        reg.publish("e", any_payload(TestPayload("x".into()))).unwrap();

        reg.unregister(&handle);
        reg.register_event("e", PayloadShape::of::<TestPayload>()).unwrap();

        assert!(reg.list_subscribers("e").unwrap().is_empty());
        assert!(reg.get_event_history(Some("e")).unwrap()["e"].is_empty());
    }

    #[test]
    fn subscriber_ids_are_never_reused() {
        let reg = registry();
        let handle = reg.register_event("a", PayloadShape::of::<TestPayload>()).unwrap();
        reg.register_event("b", PayloadShape::of::<TestPayload>()).unwrap();

        let first = reg.subscribe("a", |_| {}).unwrap();
        let second = reg.subscribe("b", |_| {}).unwrap();
        reg.unregister(&handle);
        reg.register_event("a", PayloadShape::of::<TestPayload>()).unwrap();
        let third = reg.subscribe("a", |_| {}).unwrap();

        assert_eq!(first, "subscriber_1");
        assert_eq!(second, "subscriber_2");
        assert_eq!(third, "subscriber_3");
        assert!(first < second && second < third);
    }

    #[test]
    fn fan_out_follows_subscription_order() {
        let reg = registry();
        reg.register_event("e", PayloadShape::of::<TestPayload>()).unwrap();
        let (log, make) = recorder();
        let callbacks: Vec<_> = ["c1", "c2", "c3"].into_iter().map(&make).collect();
        for cb in &callbacks {
            reg.subscribe_shared("e", Arc::clone(cb)).unwrap();
        }

        reg.publish("e", any_payload(TestPayload("x".into()))).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["c1", "c2", "c3"]);

        let listed = reg.list_subscribers("e").unwrap();
        assert_eq!(listed.len(), 3);
        for (listed, original) in listed.iter().zip(&callbacks) {
            assert!(Arc::ptr_eq(listed, original));
        }
    }

    #[test]
    fn unsubscribe_removes_only_that_subscriber() {
        let reg = registry();
        reg.register_event("e", PayloadShape::of::<TestPayload>()).unwrap();
        let (log, make) = recorder();
        let a = reg.subscribe_shared("e", make("a")).unwrap();
        reg.subscribe_shared("e", make("b")).unwrap();

        assert!(reg.unsubscribe("e", &a).unwrap());
        reg.publish("e", any_payload(TestPayload("x".into()))).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["b"]);
        assert_eq!(reg.list_subscriber_ids("e").unwrap(), vec!["subscriber_2"]);
    }

    #[test]
    fn subscription_handle_cancels_once() {
        let reg = registry();
        reg.register_event("e", PayloadShape::of::<TestPayload>()).unwrap();
        let handle = reg.subscribe_handle("e", |_| {}).unwrap();
        assert_eq!(handle.event(), &EventName::new("e").unwrap());
        assert_eq!(reg.subscriber_count("e").unwrap(), 1);

        assert!(reg.cancel(&handle));
        assert!(!reg.cancel(&handle));
        assert_eq!(reg.subscriber_count("e").unwrap(), 0);
    }

    #[test]
    fn invalid_payload_reaches_no_subscriber_and_no_history() {
        let reg = registry();
        reg.register_event("e", PayloadShape::of::<TestPayload>()).unwrap();
        let (log, make) = recorder();
        reg.subscribe_shared("e", make("a")).unwrap();

        let err = reg.publish("e", any_payload("not a TestPayload")).unwrap_err();
        assert_eq!(err, EventError::InvalidPayloadType(EventName::new("e").unwrap()));
        assert!(log.lock().unwrap().is_empty());
        assert!(reg.get_event_history(Some("e")).unwrap()["e"].is_empty());
    }

    #[test]
    fn history_records_published_payload() {
        let reg = registry();
        reg.register_event("e", PayloadShape::of::<TestPayload>()).unwrap();
        reg.publish("e", any_payload(TestPayload("x".into()))).unwrap();

        let history = reg.get_event_history(Some("e")).unwrap();
        assert_eq!(history.len(), 1);
        let entries = &history["e"];
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].payload().downcast_ref::<TestPayload>(),
            Some(&TestPayload("x".into()))
        );
        assert!(entries[0].duration_ms() >= 0.0);
    }

    #[test]
    fn history_can_be_disabled() {
        let reg: EventRegistry<AnyPayload> =
            EventRegistry::with_config(RegistryConfig::default().with_history(false));
        reg.register_event("e", PayloadShape::of::<TestPayload>()).unwrap();
        reg.publish("e", any_payload(TestPayload("x".into()))).unwrap();

        assert!(reg.get_event_history(Some("e")).unwrap()["e"].is_empty());
    }

    #[test]
    fn history_is_bounded_by_capacity() {
        let reg: EventRegistry<u32> =
            EventRegistry::with_config(RegistryConfig::default().with_history_capacity(3));
        reg.register_event("n", PayloadShape::new("any", |_| true)).unwrap();
        for n in 0..5 {
            reg.publish("n", n).unwrap();
        }

        let payloads: Vec<u32> = reg.get_event_history(Some("n")).unwrap()["n"]
            .iter()
            .map(|e| *e.payload())
            .collect();
        assert_eq!(payloads, vec![2, 3, 4]);
    }

    #[test]
    fn drain_returns_and_clears_history() {
        let reg: EventRegistry<u32> = EventRegistry::new();
        reg.register_event("a", PayloadShape::new("any", |_| true)).unwrap();
        reg.register_event("b", PayloadShape::new("any", |_| true)).unwrap();
        reg.publish("a", 1).unwrap();
        reg.publish("b", 2).unwrap();

        let drained = reg.drain_event_history(None).unwrap();
        assert_eq!(drained.len(), 2);
        assert_eq!(*drained["b"][0].payload(), 2);

        let after = reg.get_event_history(None).unwrap();
        assert!(after.values().all(Vec::is_empty));
        assert!(matches!(
            reg.drain_event_history(Some("missing")),
            Err(EventError::EventNotFound(_))
        ));
    }

    #[test]
    fn subscribers_may_reenter_the_registry() {
        let reg = Arc::new(EventRegistry::<u32>::new());
        reg.register_event("n", PayloadShape::new("any", |_| true)).unwrap();

        let inner = Arc::clone(&reg);
        let id = reg
            .subscribe("n", move |_| {
                inner.subscribe("n", |_| {}).unwrap();
            })
            .unwrap();

        reg.publish("n", 1).unwrap();
        assert_eq!(reg.subscriber_count("n").unwrap(), 2);

        // The subscriber added mid-dispatch only sees later publishes.
        reg.unsubscribe("n", &id).unwrap();
        reg.publish("n", 2).unwrap();
        assert_eq!(reg.subscriber_count("n").unwrap(), 1);
    }

    #[test]
    fn unregister_during_dispatch_skips_history() {
        let reg = Arc::new(EventRegistry::<u32>::new());
        let handle = reg.register_event("n", PayloadShape::new("any", |_| true)).unwrap();

        let inner = Arc::clone(&reg);
        reg.subscribe("n", move |_| inner.unregister(&handle)).unwrap();

        reg.publish("n", 1).unwrap();
        assert!(!reg.is_registered("n"));
        assert!(reg.get_event_history(None).unwrap().is_empty());
    }

    #[test]
    fn reregistration_during_dispatch_gets_no_history() {
        let reg = Arc::new(EventRegistry::<u32>::new());
        let handle = reg
            .register_event("n", PayloadShape::new("odd", |n| n % 2 == 1))
            .unwrap();

        let inner = Arc::clone(&reg);
        reg.subscribe("n", move |_| {
            inner.unregister(&handle);
            inner
                .register_event("n", PayloadShape::new("even", |n| n % 2 == 0))
                .unwrap();
        })
        .unwrap();

        reg.publish("n", 3).unwrap();

        let shapes: Vec<String> = reg
            .list_payload_types("n")
            .unwrap()
            .iter()
            .map(|shape| shape.name().to_string())
            .collect();
        assert_eq!(shapes, vec!["even"]);
        assert!(reg.get_event_history(Some("n")).unwrap()["n"].is_empty());
        assert!(reg.list_subscribers("n").unwrap().is_empty());
    }

    #[test]
    fn panicking_subscriber_aborts_fan_out_by_default() {
        let reg = Arc::new(EventRegistry::<u32>::new());
        reg.register_event("n", PayloadShape::new("any", |_| true)).unwrap();
        let (log, _) = recorder();
        let after = Arc::clone(&log);
        reg.subscribe("n", |_| panic!("boom")).unwrap();
        reg.subscribe("n", move |_| after.lock().unwrap().push("late".into())).unwrap();

        let publisher = Arc::clone(&reg);
        let result = panic::catch_unwind(AssertUnwindSafe(|| publisher.publish("n", 1)));

        assert!(result.is_err());
        assert!(log.lock().unwrap().is_empty());
        assert!(reg.get_event_history(Some("n")).unwrap()["n"].is_empty());
        // The registry stays usable after the unwind.
        assert_eq!(reg.subscriber_count("n").unwrap(), 2);
    }

    #[test]
    fn isolate_policy_keeps_delivering() {
        let reg: EventRegistry<u32> = EventRegistry::with_config(
            RegistryConfig::default().with_failure_policy(FailurePolicy::Isolate),
        );
        reg.register_event("n", PayloadShape::new("any", |_| true)).unwrap();
        let (log, _) = recorder();
        let after = Arc::clone(&log);
        reg.subscribe("n", |_| panic!("boom")).unwrap();
        reg.subscribe("n", move |n| after.lock().unwrap().push(format!("got {n}"))).unwrap();

        reg.publish("n", 7).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["got 7"]);
        assert_eq!(reg.get_event_history(Some("n")).unwrap()["n"].len(), 1);
    }

    #[test]
    fn publisher_trait_forwards_through_arc() {
        let reg = Arc::new(EventRegistry::<u32>::new());
        reg.register_event("n", PayloadShape::new("even", |n| n % 2 == 0)).unwrap();

        let publisher: Arc<dyn EventPublisher<u32>> = reg.clone();
        publisher.publish("n", 2).unwrap();
        assert!(matches!(
            publisher.publish("n", 3),
            Err(EventError::InvalidPayloadType(_))
        ));
        assert_eq!(reg.get_event_history(Some("n")).unwrap()["n"].len(), 1);
    }
}
