//! Document collections: the document model, identifiers, cursors and the
//! collection operations themselves.

#[allow(clippy::module_inception)]
pub(crate) mod collection;
mod cursor;
mod document;
mod object_id;
pub(crate) mod options;

pub use collection::Collection;
pub use cursor::Cursor;
pub use document::{normalize, Document};
pub use object_id::ObjectId;
pub use options::{FindOptions, RemoveOptions, UpdateOptions, UpdateResult, DEFAULT_FIND_LIMIT};
