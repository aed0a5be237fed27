use crate::collection::collection::CollectionInner;
use crate::collection::options::{parse_sort_spec, FindOptions};
use crate::collection::Document;
use crate::common::{SortOrder, Value};
use crate::errors::{ErrorKind, HaliteError, HaliteResult};
use crate::query::{Matcher, Projector};
use std::cmp::Ordering;
use std::sync::Arc;

static NULL_VALUE: Value = Value::Null;

/// Lazy, restartable iterator over the result of a compiled selector plus
/// projection against a collection.
///
/// A cursor iterates over a logical snapshot: on first use it captures the
/// ordered `_id` list of the matching documents under the collection's read
/// lock, then re-resolves each id at yield time. Documents inserted after
/// materialization are never observed; documents removed in the meantime
/// are skipped.
///
/// `sort`, `skip` and `limit` reconfigure the cursor and are valid only
/// before iteration begins; afterwards they fail with
/// [ErrorKind::InvalidOperation]. [Cursor::rewind] discards the snapshot
/// and restarts.
pub struct Cursor {
    collection: Arc<CollectionInner>,
    matcher: Matcher,
    projector: Projector,
    skip: usize,
    limit: i64,
    sort: Option<Vec<(String, SortOrder)>>,
    snapshot: Option<Vec<String>>,
    position: usize,
    yielded: usize,
}

impl Cursor {
    pub(crate) fn new(
        collection: Arc<CollectionInner>,
        matcher: Matcher,
        projector: Projector,
        options: &FindOptions,
    ) -> Cursor {
        Cursor {
            collection,
            matcher,
            projector,
            skip: options.skip,
            limit: options.limit,
            sort: options.sort.clone(),
            snapshot: None,
            position: 0,
            yielded: 0,
        }
    }

    /// Configures sorting from a specification value: a field-name string
    /// or a document mapping fields to a positive (ascending) or negative
    /// (descending) number.
    pub fn sort(mut self, spec: &Value) -> HaliteResult<Cursor> {
        self.ensure_configurable()?;
        self.sort = Some(parse_sort_spec(spec)?);
        Ok(self)
    }

    /// Configures sorting by a single field.
    pub fn sort_by(mut self, field: &str, order: SortOrder) -> HaliteResult<Cursor> {
        self.ensure_configurable()?;
        self.sort
            .get_or_insert_with(Vec::new)
            .push((field.to_string(), order));
        Ok(self)
    }

    /// Configures the number of matches to skip.
    pub fn skip(mut self, skip: usize) -> HaliteResult<Cursor> {
        self.ensure_configurable()?;
        self.skip = skip;
        Ok(self)
    }

    /// Configures the yield cap. A non-positive value disables it.
    pub fn limit(mut self, limit: i64) -> HaliteResult<Cursor> {
        self.ensure_configurable()?;
        self.limit = limit;
        Ok(self)
    }

    /// Advances lazily to the next matching document without consuming it.
    pub fn has_next(&mut self) -> bool {
        self.peek_live().is_some()
    }

    /// Consumes and returns the next projected document.
    pub fn next(&mut self) -> Option<Document> {
        let id = self.peek_live()?;
        self.position += 1;
        self.yielded += 1;

        let collection = self.collection.clone();
        let state = collection.state.read();
        let doc = state
            .index_by_id
            .get(&id)
            .and_then(|&index| state.docs.get(index))?;
        Some(self.projector.project(doc))
    }

    /// Materializes all remaining documents.
    pub fn fetch(&mut self) -> Vec<Document> {
        let mut docs = Vec::new();
        while let Some(doc) = self.next() {
            docs.push(doc);
        }
        docs
    }

    /// Applies `f` to every remaining document in iteration order.
    pub fn for_each<F: FnMut(Document)>(&mut self, mut f: F) {
        while let Some(doc) = self.next() {
            f(doc);
        }
    }

    /// The number of matches, ignoring skip and limit. Does not consume or
    /// materialize the cursor.
    pub fn count(&self) -> usize {
        let state = self.collection.state.read();
        state
            .docs
            .iter()
            .filter(|doc| self.matcher.matches(doc))
            .count()
    }

    /// The number of documents the cursor will yield: [Cursor::count] with
    /// skip and limit applied.
    pub fn size(&self) -> usize {
        let after_skip = self.count().saturating_sub(self.skip);
        if self.limit > 0 {
            after_skip.min(self.limit as usize)
        } else {
            after_skip
        }
    }

    /// Discards the snapshot and restarts iteration from the beginning.
    pub fn rewind(&mut self) {
        self.snapshot = None;
        self.position = 0;
        self.yielded = 0;
    }

    /// Captures the snapshot now instead of at first iteration.
    pub(crate) fn materialize(&mut self) {
        if self.snapshot.is_some() {
            return;
        }

        let collection = self.collection.clone();
        let state = collection.state.read();
        let mut matched: Vec<&Document> = state
            .docs
            .iter()
            .filter(|doc| self.matcher.matches(doc))
            .collect();

        if let Some(sort) = &self.sort {
            // sort_by is stable, so ties keep insertion order
            matched.sort_by(|a, b| compare_documents(a, b, sort));
        }

        self.snapshot = Some(matched.iter().filter_map(|doc| doc.id_str()).collect());
        self.position = self.skip;
        self.yielded = 0;
    }

    /// The id of the next live snapshot entry, skipping entries removed
    /// since materialization. Does not consume.
    fn peek_live(&mut self) -> Option<String> {
        self.materialize();
        if self.limit > 0 && self.yielded >= self.limit as usize {
            return None;
        }

        let collection = self.collection.clone();
        let state = collection.state.read();
        loop {
            let id = match self.snapshot.as_ref().and_then(|s| s.get(self.position)) {
                Some(id) => id.clone(),
                None => return None,
            };
            if state.index_by_id.contains_key(&id) {
                return Some(id);
            }
            self.position += 1;
        }
    }

    fn ensure_configurable(&self) -> HaliteResult<()> {
        if self.snapshot.is_some() {
            log::error!("Cursor is already materialized and cannot be reconfigured");
            return Err(HaliteError::new(
                "cursor is already materialized and cannot be reconfigured",
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}

fn compare_documents(a: &Document, b: &Document, sort: &[(String, SortOrder)]) -> Ordering {
    for (field, order) in sort {
        let left = a.lookup(field).unwrap_or(&NULL_VALUE);
        let right = b.lookup(field).unwrap_or(&NULL_VALUE);
        let cmp = match order {
            SortOrder::Ascending => left.compare(right),
            SortOrder::Descending => right.compare(left),
        };
        if cmp != Ordering::Equal {
            return cmp;
        }
    }
    Ordering::Equal
}
