use crate::collection::cursor::Cursor;
use crate::collection::options::{FindOptions, RemoveOptions, UpdateOptions, UpdateResult};
use crate::collection::{Document, ObjectId};
use crate::common::util::current_time_secs;
use crate::common::{Value, DOC_ID, DOC_TIMESTAMP};
use crate::database::DatabaseInner;
use crate::errors::{ErrorKind, HaliteError, HaliteResult};
use crate::query::update::{
    apply_lenient, apply_modifiers, apply_replacement, classify_update, UpdateKind,
};
use crate::query::{compile_projection, compile_selector, Selector};
use crate::store::{DatabaseEvent, StoreMulticast};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// A named, ordered sequence of schemaless documents.
///
/// `Collection` is a cheap-clone handle; every clone shares the same
/// underlying state through `Arc`. All operations are mediated by a single
/// read-write lock per collection, which is the only coordination a
/// multithreaded host needs.
///
/// Mutations publish a [DatabaseEvent] to every observer store registered
/// with the owning database, after the change is committed and before the
/// operation returns.
#[derive(Clone)]
pub struct Collection {
    pub(crate) inner: Arc<CollectionInner>,
}

pub(crate) struct CollectionInner {
    pub(crate) name: RwLock<String>,
    pub(crate) db_name: String,
    pub(crate) state: RwLock<CollectionState>,
    pub(crate) events: StoreMulticast,
    pub(crate) database: Weak<DatabaseInner>,
    pub(crate) dropped: AtomicBool,
}

pub(crate) struct CollectionState {
    /// The authoritative store; iteration order is insertion order.
    pub(crate) docs: Vec<Document>,
    /// Position of each document by its `_id` string.
    /// Invariant: `docs[index_by_id[d.id_str()]] == d` for every `d`.
    pub(crate) index_by_id: HashMap<String, usize>,
    /// Captured deep copies of `docs`, addressable by snapshot id.
    pub(crate) snapshots: HashMap<String, Vec<Document>>,
}

impl CollectionInner {
    pub(crate) fn ensure_active(&self) -> HaliteResult<()> {
        if self.dropped.load(Ordering::Relaxed) {
            let name = self.name.read().clone();
            log::error!("Collection '{}' is dropped and cannot be accessed", name);
            return Err(HaliteError::new(
                &format!("collection '{}' is dropped and cannot be accessed", name),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    pub(crate) fn emit(&self, event: DatabaseEvent) -> HaliteResult<()> {
        self.events.publish(event)
    }
}

impl Collection {
    pub(crate) fn create(
        name: &str,
        db_name: &str,
        events: StoreMulticast,
        database: Weak<DatabaseInner>,
    ) -> Collection {
        Collection {
            inner: Arc::new(CollectionInner {
                name: RwLock::new(name.to_string()),
                db_name: db_name.to_string(),
                state: RwLock::new(CollectionState {
                    docs: Vec::new(),
                    index_by_id: HashMap::new(),
                    snapshots: HashMap::new(),
                }),
                events,
                database,
                dropped: AtomicBool::new(false),
            }),
        }
    }

    /// The collection's name.
    pub fn name(&self) -> String {
        self.inner.name.read().clone()
    }

    /// The namespaced name, `<db>.<name>`.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.inner.db_name, self.name())
    }

    /// The number of stored documents.
    pub fn len(&self) -> usize {
        self.inner.state.read().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.read().docs.is_empty()
    }

    /// Inserts a document and returns the stored copy.
    ///
    /// The document is deep-copied; a missing `_id` is assigned a fresh
    /// [ObjectId] and a provided one is normalized (numbers become their
    /// digit string, strings are stripped to digits, an empty result is
    /// replaced). The `timestamp` field is stamped with the identifier's
    /// generation instant.
    pub fn insert(&self, doc: &Document) -> HaliteResult<Document> {
        self.inner.ensure_active()?;
        let (stored, id_str) = prepare_insert(doc)?;

        {
            let mut state = self.inner.state.write();
            if state.index_by_id.contains_key(&id_str) {
                log::error!("Duplicate _id '{}' on insert", id_str);
                return Err(HaliteError::new(
                    &format!("a document with _id '{}' already exists", id_str),
                    ErrorKind::Conflict,
                ));
            }
            let position = state.docs.len();
            state.docs.push(stored.clone());
            state.index_by_id.insert(id_str, position);
        }

        self.inner.emit(DatabaseEvent::Insert {
            collection: self.name(),
            doc: stored.clone(),
        })?;
        Ok(stored)
    }

    /// Inserts several documents, stopping at the first failure.
    pub fn insert_many(&self, docs: &[Document]) -> HaliteResult<Vec<Document>> {
        let mut stored = Vec::with_capacity(docs.len());
        for doc in docs {
            stored.push(self.insert(doc)?);
        }
        Ok(stored)
    }

    /// Compiles the selector and returns a cursor over the matches.
    pub fn find<S: Into<Selector>>(&self, selector: S) -> HaliteResult<Cursor> {
        self.find_with_options(selector, None, FindOptions::new())
    }

    /// As [Collection::find], with a projection and options. The `fields`
    /// key of the options overrides the positional projection argument;
    /// `force_fetch` materializes the cursor eagerly.
    pub fn find_with_options<S: Into<Selector>>(
        &self,
        selector: S,
        fields: Option<Value>,
        options: FindOptions,
    ) -> HaliteResult<Cursor> {
        self.inner.ensure_active()?;
        let selector = selector.into();
        let projection_spec = options.fields.clone().or(fields).unwrap_or(Value::Null);

        let matcher = compile_selector(&selector)?;
        let projector = compile_projection(&projection_spec)?;
        let mut cursor = Cursor::new(self.inner.clone(), matcher, projector, &options);
        if options.force_fetch {
            cursor.materialize();
        }

        self.inner.emit(DatabaseEvent::Find {
            collection: self.name(),
            selector: selector.to_value(),
            fields: projection_spec,
        })?;
        Ok(cursor)
    }

    /// Returns the first match, if any.
    pub fn find_one<S: Into<Selector>>(&self, selector: S) -> HaliteResult<Option<Document>> {
        self.find_one_with_options(selector, None, FindOptions::new())
    }

    /// As [Collection::find_one], with a projection and options.
    pub fn find_one_with_options<S: Into<Selector>>(
        &self,
        selector: S,
        fields: Option<Value>,
        options: FindOptions,
    ) -> HaliteResult<Option<Document>> {
        self.inner.ensure_active()?;
        let selector = selector.into();
        let projection_spec = options.fields.clone().or(fields).unwrap_or(Value::Null);

        let matcher = compile_selector(&selector)?;
        let projector = compile_projection(&projection_spec)?;
        let options = options.limit(1);
        let mut cursor = Cursor::new(self.inner.clone(), matcher, projector, &options);
        let doc = cursor.next();

        self.inner.emit(DatabaseEvent::FindOne {
            collection: self.name(),
            selector: selector.to_value(),
            fields: projection_spec,
        })?;
        Ok(doc)
    }

    /// Applies an update document to the selected documents.
    ///
    /// In strict mode (the default) the update document is either a set of
    /// `$`-modifier clauses applied in declared order, or a whole-document
    /// replacement keeping `_id`. With `upsert`, an empty match set inserts
    /// the update document instead. Failures abort before any in-place
    /// write.
    pub fn update<S: Into<Selector>>(
        &self,
        selector: S,
        update: &Document,
        options: UpdateOptions,
    ) -> HaliteResult<UpdateResult> {
        self.inner.ensure_active()?;
        let selector = selector.into();
        let matcher = compile_selector(&selector)?;
        let mut result = UpdateResult::default();

        let kind = if options.update_as_mongo {
            Some(classify_update(update)?)
        } else {
            None
        };
        if kind == Some(UpdateKind::Replace) && options.multi {
            log::error!("Multi-document update without update operators");
            return Err(HaliteError::new(
                "cannot update several documents when no update operators are included",
                ErrorKind::ValidationError,
            ));
        }

        {
            let mut state = self.inner.state.write();
            let mut targets: Vec<usize> = state
                .docs
                .iter()
                .enumerate()
                .filter(|(_, doc)| matcher.matches(doc))
                .map(|(index, _)| index)
                .collect();
            if !options.multi {
                targets.truncate(1);
            }

            if targets.is_empty() {
                if !options.upsert {
                    return Ok(result);
                }

                // upsert: a modifier update seeds an empty document
                let seed = match kind {
                    Some(UpdateKind::Modify) => {
                        let mut seed = Document::new();
                        apply_modifiers(&mut seed, update)?;
                        seed
                    }
                    _ => update.clone(),
                };
                let (stored, id_str) = prepare_insert(&seed)?;
                if state.index_by_id.contains_key(&id_str) {
                    return Err(HaliteError::new(
                        &format!("a document with _id '{}' already exists", id_str),
                        ErrorKind::Conflict,
                    ));
                }
                let position = state.docs.len();
                state.docs.push(stored.clone());
                state.index_by_id.insert(id_str, position);
                result.inserted.push(stored);
            } else {
                // stage every change on clones, then commit
                let mut staged: Vec<(usize, Document)> = Vec::with_capacity(targets.len());
                for &index in &targets {
                    let mut candidate = state.docs[index].clone();
                    let original_id = candidate.id_str();

                    match kind {
                        Some(UpdateKind::Modify) => apply_modifiers(&mut candidate, update)?,
                        Some(UpdateKind::Replace) => apply_replacement(&mut candidate, update),
                        None => apply_lenient(&mut candidate, update, options.override_document)?,
                    }

                    if candidate.id_str() != original_id {
                        log::error!("The _id field cannot be changed by an update");
                        return Err(HaliteError::new(
                            "the _id field cannot be changed by an update",
                            ErrorKind::ValidationError,
                        ));
                    }
                    validate_store_fields(&candidate)?;
                    staged.push((index, candidate));
                }

                for (index, doc) in staged {
                    state.docs[index] = doc.clone();
                    result.updated.push(doc);
                }
            }
        }

        let mut docs = result.updated.clone();
        docs.extend(result.inserted.iter().cloned());
        self.inner.emit(DatabaseEvent::Update {
            collection: self.name(),
            selector: selector.to_value(),
            modifier: update.clone(),
            docs,
        })?;
        Ok(result)
    }

    /// Inserts the document when it has no known `_id`, replaces the stored
    /// document otherwise.
    pub fn save(&self, doc: &Document) -> HaliteResult<Document> {
        let exists = match doc.id_str() {
            Some(id) => self.inner.state.read().index_by_id.contains_key(&id),
            None => false,
        };

        if exists {
            let selector = Selector::Value(doc.id().cloned().unwrap_or(Value::Null));
            let result = self.update(selector, doc, UpdateOptions::new())?;
            Ok(result
                .updated
                .into_iter()
                .next()
                .unwrap_or_else(|| doc.clone()))
        } else {
            self.insert(doc)
        }
    }

    /// Removes every match (or only the first with
    /// [RemoveOptions::just_one]) and returns the removed documents.
    pub fn remove<S: Into<Selector>>(
        &self,
        selector: S,
        options: RemoveOptions,
    ) -> HaliteResult<Vec<Document>> {
        self.inner.ensure_active()?;
        let selector = selector.into();
        let matcher = compile_selector(&selector)?;

        let removed = {
            let mut state = self.inner.state.write();
            let mut targets = Vec::new();
            for (index, doc) in state.docs.iter().enumerate() {
                if matcher.matches(doc) {
                    targets.push(index);
                    if options.just_one {
                        break;
                    }
                }
            }

            let mut removed = Vec::with_capacity(targets.len());
            for &index in &targets {
                removed.push(state.docs[index].clone());
            }
            for &index in targets.iter().rev() {
                state.docs.remove(index);
            }
            // the splice shifted later positions: rebuild the id index
            state.index_by_id = state
                .docs
                .iter()
                .enumerate()
                .filter_map(|(index, doc)| doc.id_str().map(|id| (id, index)))
                .collect();
            removed
        };

        self.inner.emit(DatabaseEvent::Remove {
            collection: self.name(),
            selector: selector.to_value(),
            docs: removed.clone(),
        })?;
        Ok(removed)
    }

    /// Renames this collection within its database.
    pub fn rename(&self, new_name: &str) -> HaliteResult<Collection> {
        self.inner.ensure_active()?;
        let database = self.inner.database.upgrade().ok_or_else(|| {
            log::error!("Owning database handle is gone");
            HaliteError::new(
                "the owning database handle is gone",
                ErrorKind::InvalidOperation,
            )
        })?;
        database.rename_collection(&self.name(), new_name)
    }

    /// Captures a deep copy of the stored documents under the given id (or
    /// a fresh one) and returns the snapshot id.
    pub fn snapshot(&self, id: Option<&str>) -> HaliteResult<String> {
        self.inner.ensure_active()?;
        let snapshot_id = id
            .map(|s| s.to_string())
            .unwrap_or_else(|| ObjectId::new().to_hex());

        {
            let mut state = self.inner.state.write();
            let copy = state.docs.clone();
            state.snapshots.insert(snapshot_id.clone(), copy);
        }

        self.inner.emit(DatabaseEvent::Snapshot {
            collection: self.name(),
            id: snapshot_id.clone(),
        })?;
        Ok(snapshot_id)
    }

    /// Replaces the stored documents with a captured snapshot. With no id,
    /// the single existing snapshot is used; several candidates require an
    /// explicit id.
    pub fn restore(&self, id: Option<&str>) -> HaliteResult<()> {
        self.inner.ensure_active()?;

        let snapshot_id = {
            let mut state = self.inner.state.write();
            if state.snapshots.is_empty() {
                log::error!("No snapshot to restore");
                return Err(HaliteError::new(
                    "there is no snapshot to restore",
                    ErrorKind::NotFound,
                ));
            }

            let snapshot_id = match id {
                Some(s) => s.to_string(),
                None => {
                    if state.snapshots.len() > 1 {
                        log::error!("Several snapshots exist; an id is required");
                        return Err(HaliteError::new(
                            "several snapshots exist; a snapshot id is required",
                            ErrorKind::ValidationError,
                        ));
                    }
                    match state.snapshots.keys().next() {
                        Some(key) => key.clone(),
                        None => {
                            return Err(HaliteError::new(
                                "snapshot set emptied unexpectedly",
                                ErrorKind::InternalError,
                            ))
                        }
                    }
                }
            };

            let docs = match state.snapshots.get(&snapshot_id) {
                Some(docs) => docs.clone(),
                None => {
                    log::error!("Unknown snapshot '{}'", snapshot_id);
                    return Err(HaliteError::new(
                        &format!("unknown snapshot '{}'", snapshot_id),
                        ErrorKind::NotFound,
                    ));
                }
            };
            state.index_by_id = docs
                .iter()
                .enumerate()
                .filter_map(|(index, doc)| doc.id_str().map(|id| (id, index)))
                .collect();
            state.docs = docs;
            snapshot_id
        };

        self.inner.emit(DatabaseEvent::Restore {
            collection: self.name(),
            id: snapshot_id,
        })?;
        Ok(())
    }
}

/// Collection names must be non-empty, free of `..`, free of `$` (except
/// the `$cmd` and `oplog.$main` pseudo-namespaces) and must not start or
/// end with a dot.
pub(crate) fn validate_collection_name(name: &str) -> HaliteResult<()> {
    let valid = !name.is_empty()
        && !name.contains("..")
        && (!name.contains('$') || name == "$cmd" || name == "oplog.$main")
        && !name.starts_with('.')
        && !name.ends_with('.');

    if !valid {
        log::error!("Invalid collection name '{}'", name);
        return Err(HaliteError::new(
            &format!("'{}' is not a valid collection name", name),
            ErrorKind::ValidationError,
        ));
    }
    Ok(())
}

/// Deep-copies the document, normalizes its `_id` and stamps `timestamp`.
/// Returns the stored form together with the canonical id string.
fn prepare_insert(doc: &Document) -> HaliteResult<(Document, String)> {
    let mut stored = doc.clone();

    let (id_value, stamp) = match stored.data.get(DOC_ID) {
        None => {
            let id = ObjectId::new();
            (Value::Id(id), id.generation_time())
        }
        Some(Value::Id(id)) => {
            let id = *id;
            (Value::Id(id), id.generation_time())
        }
        Some(other) => {
            let raw = match other {
                Value::Number(n) => format!("{}", n),
                Value::String(s) => s.clone(),
                v => v.to_json_string(),
            };
            let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                let id = ObjectId::new();
                (Value::Id(id), id.generation_time())
            } else {
                (Value::String(digits), current_time_secs())
            }
        }
    };

    stored.data.shift_remove(DOC_ID);
    stored.data.shift_insert(0, DOC_ID.to_string(), id_value);
    stored
        .data
        .insert(DOC_TIMESTAMP.to_string(), Value::Timestamp(stamp));

    validate_store_fields(&stored)?;
    let id_str = match stored.id_str() {
        Some(id) => id,
        None => {
            return Err(HaliteError::new(
                "normalized _id has no string form",
                ErrorKind::InternalError,
            ))
        }
    };
    Ok((stored, id_str))
}

/// Stored field names must be non-empty, must not start with `$` and must
/// not contain `.` anywhere in the document tree.
pub(crate) fn validate_store_fields(doc: &Document) -> HaliteResult<()> {
    for (key, value) in doc.iter() {
        if key.is_empty() || key.starts_with('$') || key.contains('.') {
            log::error!("Invalid stored field name '{}'", key);
            return Err(HaliteError::new(
                &format!("'{}' is not a valid stored field name", key),
                ErrorKind::ValidationError,
            ));
        }
        validate_store_value(value)?;
    }
    Ok(())
}

fn validate_store_value(value: &Value) -> HaliteResult<()> {
    match value {
        Value::Document(doc) => validate_store_fields(doc),
        Value::Array(items) => {
            for item in items {
                validate_store_value(item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
