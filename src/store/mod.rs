//! Observer stores and the event multicast that feeds them.

mod event;

pub use event::{DatabaseEvent, Store};

use crate::common::HALITE_EVENT;
use crate::errors::{ErrorKind, HaliteError, HaliteResult};
use anyhow::Error;
use basu::error::BasuError;
use basu::event::Event;
use basu::{EventBus, Handle};
use std::sync::Arc;

/// Multicasts [DatabaseEvent]s to every registered [Store].
///
/// One multicast exists per database; collections hold clones and publish
/// into it after each committed mutation. Publishing is synchronous, so
/// observers receive events in operation-call order, before the triggering
/// operation returns.
#[derive(Clone)]
pub(crate) struct StoreMulticast {
    inner: Arc<StoreMulticastInner>,
}

impl StoreMulticast {
    pub(crate) fn new() -> Self {
        StoreMulticast {
            inner: Arc::new(StoreMulticastInner {
                bus: EventBus::new(),
            }),
        }
    }

    /// Registers an observer store with the multicast.
    pub(crate) fn register(&self, store: Arc<dyn Store>) -> HaliteResult<()> {
        self.inner
            .bus
            .subscribe(HALITE_EVENT, Box::new(StoreListener { store }))
            .map(|_| ())
            .map_err(basu_error)
    }

    /// Publishes an event to every registered store.
    pub(crate) fn publish(&self, event: DatabaseEvent) -> HaliteResult<()> {
        // fast path: skip event construction when nobody listens
        let handler_count = match self.inner.bus.get_handler_count(HALITE_EVENT) {
            Ok(count) => count,
            Err(e) => {
                if matches!(e, BasuError::EventTypeNotFOUND) {
                    return Ok(());
                }
                return Err(basu_error(e));
            }
        };
        if handler_count == 0 {
            return Ok(());
        }

        let event = Event::new(event);
        self.inner
            .bus
            .publish(HALITE_EVENT, &event)
            .map(|_| ())
            .map_err(basu_error)
    }

    pub(crate) fn has_listeners(&self) -> bool {
        matches!(self.inner.bus.get_handler_count(HALITE_EVENT), Ok(n) if n > 0)
    }
}

struct StoreMulticastInner {
    bus: EventBus<DatabaseEvent>,
}

/// Adapter wiring a [Store] onto the underlying bus.
struct StoreListener {
    store: Arc<dyn Store>,
}

impl Handle<DatabaseEvent> for StoreListener {
    fn handle(&self, event: &Event<DatabaseEvent>) -> Result<(), BasuError> {
        match self.store.dispatch(&event.data) {
            Ok(()) => Ok(()),
            Err(e) => Err(BasuError::HandlerError(Error::new(e))),
        }
    }
}

fn basu_error(e: BasuError) -> HaliteError {
    log::error!("Event multicast failure: {}", e);
    HaliteError::new(
        &format!("event multicast failure: {}", e),
        ErrorKind::EventError,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use parking_lot::Mutex;

    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Store for Recorder {
        fn all(&self, event: &DatabaseEvent) -> HaliteResult<()> {
            self.seen.lock().push(event.name().to_string());
            Ok(())
        }
    }

    #[test]
    fn test_publish_without_listeners_is_noop() {
        let multicast = StoreMulticast::new();
        assert!(!multicast.has_listeners());
        multicast
            .publish(DatabaseEvent::DropDatabase {
                database: "db".to_string(),
            })
            .unwrap();
    }

    #[test]
    fn test_publish_reaches_every_store() {
        let multicast = StoreMulticast::new();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        multicast
            .register(Arc::new(Recorder { seen: first.clone() }))
            .unwrap();
        multicast
            .register(Arc::new(Recorder { seen: second.clone() }))
            .unwrap();
        assert!(multicast.has_listeners());

        multicast
            .publish(DatabaseEvent::Insert {
                collection: "c".to_string(),
                doc: doc! { a: 1 },
            })
            .unwrap();
        multicast
            .publish(DatabaseEvent::Remove {
                collection: "c".to_string(),
                selector: crate::common::Value::Null,
                docs: vec![],
            })
            .unwrap();

        assert_eq!(*first.lock(), vec!["insert", "remove"]);
        assert_eq!(*second.lock(), vec!["insert", "remove"]);
    }
}
