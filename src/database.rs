use crate::collection::collection::validate_collection_name;
use crate::collection::Collection;
use crate::errors::{ErrorKind, HaliteError, HaliteResult};
use crate::store::{DatabaseEvent, Store, StoreMulticast};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use itertools::Itertools;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// An explicit registry of database names.
///
/// Databases are opened through a registry rather than process-wide mutable
/// state; uniqueness is enforced within one registry. A second attempt to
/// open a live name fails with [ErrorKind::Conflict]; dropping a database
/// releases its name.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
pub(crate) struct RegistryInner {
    names: DashMap<String, ()>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            inner: Arc::new(RegistryInner {
                names: DashMap::new(),
            }),
        }
    }

    /// Opens a new database under the given name.
    pub fn open(&self, name: &str) -> HaliteResult<Database> {
        validate_database_name(name)?;

        match self.inner.names.entry(name.to_string()) {
            Entry::Occupied(_) => {
                log::error!("Database '{}' is already open", name);
                Err(HaliteError::new(
                    &format!("database '{}' is already open", name),
                    ErrorKind::Conflict,
                ))
            }
            Entry::Vacant(entry) => {
                entry.insert(());
                Ok(Database {
                    inner: Arc::new(DatabaseInner {
                        name: name.to_string(),
                        collections: DashMap::new(),
                        events: StoreMulticast::new(),
                        registry: Arc::downgrade(&self.inner),
                        dropped: AtomicBool::new(false),
                    }),
                })
            }
        }
    }

    /// True while a database with the given name is open in this registry.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.names.contains_key(name)
    }
}

/// A named set of collections plus the observer stores subscribed to their
/// mutation events.
///
/// `Database` is a cheap-clone handle; every clone shares the same
/// underlying state through `Arc`.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

pub(crate) struct DatabaseInner {
    pub(crate) name: String,
    pub(crate) collections: DashMap<String, Collection>,
    pub(crate) events: StoreMulticast,
    registry: Weak<RegistryInner>,
    dropped: AtomicBool,
}

impl DatabaseInner {
    fn ensure_open(&self) -> HaliteResult<()> {
        if self.dropped.load(Ordering::Relaxed) {
            log::error!("Database '{}' has been dropped", self.name);
            return Err(HaliteError::new(
                &format!("database '{}' has been dropped", self.name),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    pub(crate) fn rename_collection(
        self: &Arc<Self>,
        from: &str,
        to: &str,
    ) -> HaliteResult<Collection> {
        self.ensure_open()?;
        validate_collection_name(to)?;

        if self.collections.contains_key(to) {
            log::error!("Collection '{}' already exists", to);
            return Err(HaliteError::new(
                &format!("collection '{}' already exists", to),
                ErrorKind::Conflict,
            ));
        }

        let collection = match self.collections.remove(from) {
            Some((_, collection)) => collection,
            None => {
                log::error!("Collection '{}' does not exist", from);
                return Err(HaliteError::new(
                    &format!("collection '{}' does not exist", from),
                    ErrorKind::NotFound,
                ));
            }
        };

        *collection.inner.name.write() = to.to_string();
        self.collections.insert(to.to_string(), collection.clone());

        self.events.publish(DatabaseEvent::RenameCollection {
            from: from.to_string(),
            to: to.to_string(),
        })?;
        Ok(collection)
    }
}

impl Database {
    /// The database's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the named collection, creating it on first access.
    pub fn collection(&self, name: &str) -> HaliteResult<Collection> {
        self.inner.ensure_open()?;
        validate_collection_name(name)?;

        if let Some(existing) = self.inner.collections.get(name) {
            return Ok(existing.clone());
        }

        let created = match self.inner.collections.entry(name.to_string()) {
            Entry::Occupied(entry) => return Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let collection = Collection::create(
                    name,
                    &self.inner.name,
                    self.inner.events.clone(),
                    Arc::downgrade(&self.inner),
                );
                entry.insert(collection.clone());
                collection
            }
        };

        self.inner.events.publish(DatabaseEvent::CreateCollection {
            collection: name.to_string(),
        })?;
        Ok(created)
    }

    /// Drops the named collection. Returns whether it existed.
    pub fn drop_collection(&self, name: &str) -> HaliteResult<bool> {
        self.inner.ensure_open()?;

        match self.inner.collections.remove(name) {
            None => Ok(false),
            Some((_, collection)) => {
                collection.inner.dropped.store(true, Ordering::Relaxed);
                self.inner.events.publish(DatabaseEvent::DropCollection {
                    collection: name.to_string(),
                })?;
                Ok(true)
            }
        }
    }

    /// Renames a collection. The source must exist and the target name must
    /// be free.
    pub fn rename_collection(&self, from: &str, to: &str) -> HaliteResult<Collection> {
        self.inner.rename_collection(from, to)
    }

    /// Every collection of this database, sorted by name.
    pub fn collections(&self) -> Vec<Collection> {
        self.inner
            .collections
            .iter()
            .map(|entry| entry.value().clone())
            .sorted_by_key(|collection| collection.name())
            .collect()
    }

    /// The names of every collection, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        self.inner
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .sorted()
            .collect()
    }

    /// Drops every collection and releases the database name in its
    /// registry. Returns false when already dropped.
    pub fn drop_database(&self) -> HaliteResult<bool> {
        if self.inner.dropped.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }

        for entry in self.inner.collections.iter() {
            entry.value().inner.dropped.store(true, Ordering::Relaxed);
        }
        self.inner.collections.clear();

        self.inner.events.publish(DatabaseEvent::DropDatabase {
            database: self.inner.name.clone(),
        })?;

        if let Some(registry) = self.inner.registry.upgrade() {
            registry.names.remove(&self.inner.name);
        }
        Ok(true)
    }

    /// Registers an observer store; it receives every subsequent mutation
    /// event of this database. Returns the handle for chaining.
    pub fn add_store(&self, store: impl Store + 'static) -> HaliteResult<&Database> {
        self.inner.events.register(Arc::new(store))?;
        Ok(self)
    }
}

/// Database names must be non-empty and free of spaces, `.`, `$`, `/`
/// and `\`.
fn validate_database_name(name: &str) -> HaliteResult<()> {
    let valid = !name.is_empty() && !name.chars().any(|c| " .$/\\".contains(c));
    if !valid {
        log::error!("Invalid database name '{}'", name);
        return Err(HaliteError::new(
            &format!("'{}' is not a valid database name", name),
            ErrorKind::ValidationError,
        ));
    }
    Ok(())
}
