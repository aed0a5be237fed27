use crate::collection::Document;
use crate::common::{SortOrder, Value};
use crate::errors::{ErrorKind, HaliteError, HaliteResult};

/// Default cap on the number of documents a `find` cursor yields.
///
/// Note the low default. Pass a non-positive limit (or call
/// [FindOptions::unlimited]) to disable the cap.
pub const DEFAULT_FIND_LIMIT: i64 = 15;

/// Options for `find` and `find_one`.
///
/// Supports method chaining:
///
/// ```rust,ignore
/// let options = FindOptions::new()
///     .sort_by("age", SortOrder::Descending)
///     .skip(10)
///     .limit(20);
/// ```
#[derive(Debug, Clone)]
pub struct FindOptions {
    pub(crate) skip: usize,
    pub(crate) limit: i64,
    pub(crate) sort: Option<Vec<(String, SortOrder)>>,
    pub(crate) fields: Option<Value>,
    pub(crate) force_fetch: bool,
}

impl FindOptions {
    /// Creates options with the defaults: no skip, the default limit of
    /// [DEFAULT_FIND_LIMIT], no sort, no projection override, lazy cursor.
    pub fn new() -> FindOptions {
        FindOptions {
            skip: 0,
            limit: DEFAULT_FIND_LIMIT,
            sort: None,
            fields: None,
            force_fetch: false,
        }
    }

    /// Sets the number of matching documents to skip.
    pub fn skip(mut self, skip: usize) -> FindOptions {
        self.skip = skip;
        self
    }

    /// Sets the maximum number of documents the cursor yields. A
    /// non-positive value disables the cap.
    pub fn limit(mut self, limit: i64) -> FindOptions {
        self.limit = limit;
        self
    }

    /// Disables the yield cap.
    pub fn unlimited(self) -> FindOptions {
        self.limit(-1)
    }

    /// Adds a field to sort by. Fields rank in the order they are added.
    pub fn sort_by(mut self, field: &str, order: SortOrder) -> FindOptions {
        self.sort
            .get_or_insert_with(Vec::new)
            .push((field.to_string(), order));
        self
    }

    /// Overrides the positional projection argument of `find`.
    pub fn fields(mut self, spec: Value) -> FindOptions {
        self.fields = Some(spec);
        self
    }

    /// Materializes the cursor eagerly at creation time.
    pub fn force_fetch(mut self) -> FindOptions {
        self.force_fetch = true;
        self
    }
}

impl Default for FindOptions {
    fn default() -> Self {
        FindOptions::new()
    }
}

/// Options for `update`.
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub(crate) multi: bool,
    pub(crate) upsert: bool,
    pub(crate) update_as_mongo: bool,
    pub(crate) override_document: bool,
}

impl UpdateOptions {
    /// Creates options with the defaults: first match only, no upsert,
    /// strict operator semantics.
    pub fn new() -> UpdateOptions {
        UpdateOptions {
            multi: false,
            upsert: false,
            update_as_mongo: true,
            override_document: false,
        }
    }

    /// Updates every match instead of only the first.
    pub fn multi(mut self) -> UpdateOptions {
        self.multi = true;
        self
    }

    /// Inserts the update document when the selector matches nothing.
    pub fn upsert(mut self) -> UpdateOptions {
        self.upsert = true;
        self
    }

    /// Switches to the lenient update mode: a non-modifier document does a
    /// shallow field-wise assignment (or a whole-document override, see
    /// [UpdateOptions::override_document]).
    pub fn lenient(mut self) -> UpdateOptions {
        self.update_as_mongo = false;
        self
    }

    /// In lenient mode, replaces the whole document instead of assigning
    /// field-wise. `_id` is preserved.
    pub fn override_document(mut self) -> UpdateOptions {
        self.override_document = true;
        self
    }
}

impl Default for UpdateOptions {
    fn default() -> Self {
        UpdateOptions::new()
    }
}

/// Options for `remove`.
#[derive(Debug, Clone, Default)]
pub struct RemoveOptions {
    pub(crate) just_one: bool,
}

impl RemoveOptions {
    pub fn new() -> RemoveOptions {
        RemoveOptions { just_one: false }
    }

    /// Stops after the first match.
    pub fn just_one(mut self) -> RemoveOptions {
        self.just_one = true;
        self
    }
}

/// Result of an `update` call: the documents rewritten in place and the
/// documents inserted through `upsert`.
#[derive(Debug, Clone, Default)]
pub struct UpdateResult {
    pub updated: Vec<Document>,
    pub inserted: Vec<Document>,
}

impl UpdateResult {
    pub fn updated_count(&self) -> usize {
        self.updated.len()
    }

    pub fn inserted_count(&self) -> usize {
        self.inserted.len()
    }
}

/// Parses a sort specification value: either a field-name string (ascending)
/// or a document mapping fields to a positive (ascending) or negative
/// (descending) number, ranked in declared order.
pub(crate) fn parse_sort_spec(spec: &Value) -> HaliteResult<Vec<(String, SortOrder)>> {
    match spec {
        Value::String(field) => Ok(vec![(field.clone(), SortOrder::Ascending)]),
        Value::Document(doc) => {
            let mut fields = Vec::with_capacity(doc.len());
            for (field, direction) in doc.iter() {
                let order = match direction.as_number() {
                    Some(n) if n > 0.0 => SortOrder::Ascending,
                    Some(n) if n < 0.0 => SortOrder::Descending,
                    _ => {
                        log::error!("Invalid sort direction for field '{}'", field);
                        return Err(HaliteError::new(
                            &format!("invalid sort direction for field '{}'", field),
                            ErrorKind::ValidationError,
                        ));
                    }
                };
                fields.push((field.clone(), order));
            }
            Ok(fields)
        }
        other => {
            log::error!("Unsupported sort specification {:?}", other);
            Err(HaliteError::new(
                &format!("'{}' cannot be used as a sort specification", other.type_name()),
                ErrorKind::ValidationError,
            ))
        }
    }
}
