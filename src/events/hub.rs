//! Thread-safe publish/subscribe hub.
//!
//! [`EventHub`] maps an [`EventName`] to an ordered list of [`Handler`]s.
//! `publish` snapshots the handler list under the registry lock, releases the
//! lock, then invokes each handler sequentially on the publishing thread.
//! Because the lock is never held while handlers run, a handler may freely
//! `subscribe`/`unsubscribe`/`publish` without deadlocking, and mutation from
//! another thread cannot corrupt an in-flight snapshot.
//!
//! Handler identity is the `Arc` pointer: subscribing the same [`Handler`]
//! value twice for one name is a no-op, and `unsubscribe` removes exactly
//! that handler.  A handler that panics is caught and logged; the remaining
//! handlers for that publish still run.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use super::{Event, EventName, EventPayload};

/// A subscribed event handler.
///
/// Cloning a `Handler` clones the `Arc`, not the closure — clones share
/// identity for dedup and unsubscribe purposes.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Wrap a closure as a [`Handler`].
///
/// ```
/// use speakwrite::events::{handler, EventHub, EventName, EventPayload};
///
/// let hub = EventHub::new();
/// hub.subscribe(EventName::ModelLoaded, handler(|ev| {
///     println!("got {}", ev.name);
/// }));
/// hub.publish(EventName::ModelLoaded, EventPayload::None);
/// ```
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    Arc::new(f)
}

// ---------------------------------------------------------------------------
// EventHub
// ---------------------------------------------------------------------------

/// Thread-safe named publish/subscribe registry.
pub struct EventHub {
    handlers: Mutex<HashMap<EventName, Vec<Handler>>>,
}

impl EventHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
        }
    }

    /// Register `handler` for `name`.
    ///
    /// Idempotent: subscribing the same `Handler` (same `Arc`) twice for the
    /// same name keeps a single registration.  Handlers are invoked in
    /// registration order.
    pub fn subscribe(&self, name: EventName, handler: Handler) {
        let mut map = self.handlers.lock().unwrap();
        let list = map.entry(name).or_default();
        if list.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            return;
        }
        list.push(handler);
    }

    /// Remove `handler` from `name`, if registered.  No-op otherwise.
    pub fn unsubscribe(&self, name: EventName, handler: &Handler) {
        if let Some(list) = self.handlers.lock().unwrap().get_mut(&name) {
            list.retain(|h| !Arc::ptr_eq(h, handler));
        }
    }

    /// Publish an event to every handler registered for `name`.
    ///
    /// Handlers run synchronously on the calling thread, in registration
    /// order; `publish` returns once all of them have completed or panicked.
    /// A panicking handler is logged and does not stop the remaining ones.
    pub fn publish(&self, name: EventName, payload: EventPayload) {
        let event = Event {
            name,
            payload,
            timestamp: SystemTime::now(),
        };

        // Snapshot under the lock, invoke outside it.
        let snapshot: Vec<Handler> = {
            let map = self.handlers.lock().unwrap();
            map.get(&name).cloned().unwrap_or_default()
        };

        for h in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| h(&event))).is_err() {
                log::error!("events: handler for {name} panicked; remaining handlers still run");
            }
        }
    }

    /// Number of handlers currently registered for `name`.
    pub fn subscriber_count(&self, name: EventName) -> usize {
        self.handlers
            .lock()
            .unwrap()
            .get(&name)
            .map_or(0, Vec::len)
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[test]
    fn publish_reaches_subscriber_with_payload() {
        let hub = EventHub::new();
        let seen = Arc::new(StdMutex::new(None));

        let seen_c = Arc::clone(&seen);
        hub.subscribe(
            EventName::ModelLoadError,
            handler(move |ev| {
                if let EventPayload::LoadError { message } = &ev.payload {
                    *seen_c.lock().unwrap() = Some(message.clone());
                }
            }),
        );

        hub.publish(
            EventName::ModelLoadError,
            EventPayload::LoadError {
                message: "out of memory".into(),
            },
        );

        assert_eq!(seen.lock().unwrap().as_deref(), Some("out of memory"));
    }

    #[test]
    fn duplicate_subscribe_invokes_handler_once() {
        let hub = EventHub::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_c = Arc::clone(&count);
        let h = handler(move |_| {
            count_c.fetch_add(1, Ordering::SeqCst);
        });

        hub.subscribe(EventName::ModelLoaded, Arc::clone(&h));
        hub.subscribe(EventName::ModelLoaded, Arc::clone(&h));
        assert_eq!(hub.subscriber_count(EventName::ModelLoaded), 1);

        hub.publish(EventName::ModelLoaded, EventPayload::None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let hub = EventHub::new();
        let order = Arc::new(StdMutex::new(Vec::new()));

        for i in 0..5 {
            let order_c = Arc::clone(&order);
            hub.subscribe(
                EventName::AudioStarted,
                handler(move |_| order_c.lock().unwrap().push(i)),
            );
        }

        hub.publish(EventName::AudioStarted, EventPayload::None);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn panicking_handler_does_not_stop_later_handlers() {
        let hub = EventHub::new();
        let count = Arc::new(AtomicUsize::new(0));

        hub.subscribe(
            EventName::ModelUnloaded,
            handler(|_| panic!("handler blew up")),
        );
        let count_c = Arc::clone(&count);
        hub.subscribe(
            EventName::ModelUnloaded,
            handler(move |_| {
                count_c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        hub.publish(EventName::ModelUnloaded, EventPayload::None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_removes_handler_and_is_noop_when_absent() {
        let hub = EventHub::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_c = Arc::clone(&count);
        let h = handler(move |_| {
            count_c.fetch_add(1, Ordering::SeqCst);
        });

        hub.subscribe(EventName::AudioStopped, Arc::clone(&h));
        hub.unsubscribe(EventName::AudioStopped, &h);
        // Removing again (or for a name never subscribed) must not error.
        hub.unsubscribe(EventName::AudioStopped, &h);
        hub.unsubscribe(EventName::ModelLoaded, &h);

        hub.publish(EventName::AudioStopped, EventPayload::None);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_may_subscribe_during_publish() {
        let hub = Arc::new(EventHub::new());
        let count = Arc::new(AtomicUsize::new(0));

        let hub_c = Arc::clone(&hub);
        let count_c = Arc::clone(&count);
        hub.subscribe(
            EventName::TranscriptionStart,
            handler(move |_| {
                let count_cc = Arc::clone(&count_c);
                hub_c.subscribe(
                    EventName::TranscriptionStop,
                    handler(move |_| {
                        count_cc.fetch_add(1, Ordering::SeqCst);
                    }),
                );
            }),
        );

        hub.publish(EventName::TranscriptionStart, EventPayload::None);
        hub.publish(EventName::TranscriptionStop, EventPayload::None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_publish_from_many_threads() {
        let hub = Arc::new(EventHub::new());
        let count = Arc::new(AtomicUsize::new(0));

        let count_c = Arc::clone(&count);
        hub.subscribe(
            EventName::AudioChunk,
            handler(move |_| {
                count_c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let hub = Arc::clone(&hub);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        hub.publish(EventName::TranscriptionResult, EventPayload::None);
                        hub.publish(
                            EventName::AudioChunk,
                            EventPayload::AudioChunk(crate::audio::AudioChunk {
                                samples: vec![0.0; 4],
                                sample_rate: 16_000,
                                captured_at: SystemTime::now(),
                            }),
                        );
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 800);
    }
}
