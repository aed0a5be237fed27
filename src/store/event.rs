use crate::collection::Document;
use crate::common::Value;
use crate::errors::HaliteResult;

/// A mutation or lifecycle event published to every observer store
/// registered with a database.
///
/// Events are emitted synchronously after the mutation is committed to
/// in-memory state and before the operation returns, so observers see
/// events in operation-call order. Payloads are passed by reference and
/// must be treated as read-only.
#[derive(Debug, Clone)]
pub enum DatabaseEvent {
    /// A document was inserted.
    Insert { collection: String, doc: Document },
    /// A cursor was created by `find`.
    Find {
        collection: String,
        selector: Value,
        fields: Value,
    },
    /// A single document was looked up by `find_one`.
    FindOne {
        collection: String,
        selector: Value,
        fields: Value,
    },
    /// Documents were rewritten (or upserted) by `update`.
    Update {
        collection: String,
        selector: Value,
        modifier: Document,
        docs: Vec<Document>,
    },
    /// Documents were removed.
    Remove {
        collection: String,
        selector: Value,
        docs: Vec<Document>,
    },
    /// A collection was created.
    CreateCollection { collection: String },
    /// A collection was dropped.
    DropCollection { collection: String },
    /// A collection was renamed.
    RenameCollection { from: String, to: String },
    /// The whole database was dropped.
    DropDatabase { database: String },
    /// A deep copy of a collection's documents was captured.
    Snapshot { collection: String, id: String },
    /// A collection was restored from a captured snapshot.
    Restore { collection: String, id: String },
}

impl DatabaseEvent {
    /// The wire-style name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            DatabaseEvent::Insert { .. } => "insert",
            DatabaseEvent::Find { .. } => "find",
            DatabaseEvent::FindOne { .. } => "findOne",
            DatabaseEvent::Update { .. } => "update",
            DatabaseEvent::Remove { .. } => "remove",
            DatabaseEvent::CreateCollection { .. } => "createCollection",
            DatabaseEvent::DropCollection { .. } => "dropCollection",
            DatabaseEvent::RenameCollection { .. } => "renameCollection",
            DatabaseEvent::DropDatabase { .. } => "dropDatabase",
            DatabaseEvent::Snapshot { .. } => "snapshot",
            DatabaseEvent::Restore { .. } => "restore",
        }
    }

    /// The collection this event concerns, when it concerns one.
    pub fn collection(&self) -> Option<&str> {
        match self {
            DatabaseEvent::Insert { collection, .. }
            | DatabaseEvent::Find { collection, .. }
            | DatabaseEvent::FindOne { collection, .. }
            | DatabaseEvent::Update { collection, .. }
            | DatabaseEvent::Remove { collection, .. }
            | DatabaseEvent::CreateCollection { collection }
            | DatabaseEvent::DropCollection { collection }
            | DatabaseEvent::Snapshot { collection, .. }
            | DatabaseEvent::Restore { collection, .. } => Some(collection),
            DatabaseEvent::RenameCollection { .. } | DatabaseEvent::DropDatabase { .. } => None,
        }
    }
}

/// An observer registered with a database to receive mutation events —
/// the persistence/replication extension point.
///
/// Implementors either override the per-event handlers they care about, or
/// the single catch-all [Store::all], which every per-event handler
/// defaults to:
///
/// ```rust,ignore
/// struct LogStore;
///
/// impl Store for LogStore {
///     fn all(&self, event: &DatabaseEvent) -> HaliteResult<()> {
///         log::info!("{} on {:?}", event.name(), event.collection());
///         Ok(())
///     }
/// }
///
/// db.add_store(LogStore)?;
/// ```
pub trait Store: Send + Sync {
    /// Catch-all handler; every per-event handler defaults to it.
    fn all(&self, _event: &DatabaseEvent) -> HaliteResult<()> {
        Ok(())
    }

    fn on_insert(&self, event: &DatabaseEvent) -> HaliteResult<()> {
        self.all(event)
    }

    fn on_find(&self, event: &DatabaseEvent) -> HaliteResult<()> {
        self.all(event)
    }

    fn on_find_one(&self, event: &DatabaseEvent) -> HaliteResult<()> {
        self.all(event)
    }

    fn on_update(&self, event: &DatabaseEvent) -> HaliteResult<()> {
        self.all(event)
    }

    fn on_remove(&self, event: &DatabaseEvent) -> HaliteResult<()> {
        self.all(event)
    }

    fn on_create_collection(&self, event: &DatabaseEvent) -> HaliteResult<()> {
        self.all(event)
    }

    fn on_drop_collection(&self, event: &DatabaseEvent) -> HaliteResult<()> {
        self.all(event)
    }

    fn on_rename_collection(&self, event: &DatabaseEvent) -> HaliteResult<()> {
        self.all(event)
    }

    fn on_drop_database(&self, event: &DatabaseEvent) -> HaliteResult<()> {
        self.all(event)
    }

    fn on_snapshot(&self, event: &DatabaseEvent) -> HaliteResult<()> {
        self.all(event)
    }

    fn on_restore(&self, event: &DatabaseEvent) -> HaliteResult<()> {
        self.all(event)
    }

    /// Routes an event to its per-event handler.
    fn dispatch(&self, event: &DatabaseEvent) -> HaliteResult<()> {
        match event {
            DatabaseEvent::Insert { .. } => self.on_insert(event),
            DatabaseEvent::Find { .. } => self.on_find(event),
            DatabaseEvent::FindOne { .. } => self.on_find_one(event),
            DatabaseEvent::Update { .. } => self.on_update(event),
            DatabaseEvent::Remove { .. } => self.on_remove(event),
            DatabaseEvent::CreateCollection { .. } => self.on_create_collection(event),
            DatabaseEvent::DropCollection { .. } => self.on_drop_collection(event),
            DatabaseEvent::RenameCollection { .. } => self.on_rename_collection(event),
            DatabaseEvent::DropDatabase { .. } => self.on_drop_database(event),
            DatabaseEvent::Snapshot { .. } => self.on_snapshot(event),
            DatabaseEvent::Restore { .. } => self.on_restore(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Store for Recorder {
        fn all(&self, event: &DatabaseEvent) -> HaliteResult<()> {
            self.seen.lock().push(event.name().to_string());
            Ok(())
        }
    }

    struct InsertOnly {
        inserts: Arc<Mutex<usize>>,
    }

    impl Store for InsertOnly {
        fn on_insert(&self, _event: &DatabaseEvent) -> HaliteResult<()> {
            *self.inserts.lock() += 1;
            Ok(())
        }
    }

    #[test]
    fn test_event_names() {
        let event = DatabaseEvent::Insert {
            collection: "users".to_string(),
            doc: doc! {},
        };
        assert_eq!(event.name(), "insert");

        let event = DatabaseEvent::FindOne {
            collection: "users".to_string(),
            selector: Value::Null,
            fields: Value::Null,
        };
        assert_eq!(event.name(), "findOne");

        let event = DatabaseEvent::RenameCollection {
            from: "a".to_string(),
            to: "b".to_string(),
        };
        assert_eq!(event.name(), "renameCollection");
        assert!(event.collection().is_none());
    }

    #[test]
    fn test_catch_all_receives_dispatch() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let store = Recorder { seen: seen.clone() };

        store
            .dispatch(&DatabaseEvent::Insert {
                collection: "c".to_string(),
                doc: doc! {},
            })
            .unwrap();
        store
            .dispatch(&DatabaseEvent::DropDatabase {
                database: "db".to_string(),
            })
            .unwrap();

        assert_eq!(*seen.lock(), vec!["insert", "dropDatabase"]);
    }

    #[test]
    fn test_per_event_handler_overrides_catch_all() {
        let inserts = Arc::new(Mutex::new(0));
        let store = InsertOnly {
            inserts: inserts.clone(),
        };

        store
            .dispatch(&DatabaseEvent::Insert {
                collection: "c".to_string(),
                doc: doc! {},
            })
            .unwrap();
        store
            .dispatch(&DatabaseEvent::Remove {
                collection: "c".to_string(),
                selector: Value::Null,
                docs: vec![],
            })
            .unwrap();

        assert_eq!(*inserts.lock(), 1);
    }
}
