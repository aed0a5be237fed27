//! # Halite - Embedded In-Memory Document Store
//!
//! Halite is a lightweight, embedded, in-memory document store written in
//! Rust. It holds named collections of schemaless documents and exposes a
//! declarative query and mutation language: compiled selectors, projections,
//! operator-driven updates and lazy cursors.
//!
//! ## Key Features
//!
//! - **Embedded**: no separate server process required
//! - **Schemaless**: documents are trees of tagged [common::Value]s
//! - **Compiled queries**: selector and projection documents compile once
//!   into pure closures
//! - **Operator updates**: the full `$inc`/`$set`/`$push`/`$pull`/... family
//!   with field-path navigation across nested maps and arrays
//! - **Lazy cursors**: snapshot-consistent iteration with sort, skip and
//!   limit
//! - **Observer stores**: every mutation multicasts an event to registered
//!   observers, the persistence/replication extension point
//!
//! ## Quick Start
//!
//! ```rust
//! use halite::{doc, Registry, UpdateOptions, RemoveOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Open a database through a registry
//! let registry = Registry::new();
//! let db = registry.open("app")?;
//!
//! // Get or create a collection
//! let users = db.collection("users")?;
//!
//! // Insert documents
//! users.insert(&doc! { name: "John", age: 30 })?;
//! users.insert(&doc! { name: "Jane", age: 25 })?;
//!
//! // Query with a predicate document
//! let adults = users.find(doc! { age: { "$gte": 18 } })?.fetch();
//! assert_eq!(adults.len(), 2);
//!
//! // Mutate with operators
//! users.update(doc! { name: "John" }, &doc! { "$inc": { age: 1 } },
//!     UpdateOptions::new())?;
//!
//! // Remove
//! users.remove(doc! { age: { "$lt": 26 } }, RemoveOptions::new())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Design
//!
//! Public handles ([Database], [Collection]) are cheap clones sharing state
//! through `Arc`; each collection serializes its operations behind a single
//! read-write lock. Execution is single-threaded cooperative: every
//! operation runs to completion, and observer notifications happen after
//! the mutation is committed and before the operation returns.
//!
//! ## Module Organization
//!
//! - [`collection`] - documents, identifiers, cursors and collections
//! - [`common`] - the value model, key-path utilities and shared types
//! - [`database`] - the database facade and the name registry
//! - [`errors`] - error types and result definitions
//! - [`query`] - selector, projection and update compilation
//! - [`store`] - observer stores and mutation events

pub mod collection;
pub mod common;
pub mod database;
pub mod errors;
pub mod query;
pub mod store;

pub use collection::{
    Collection, Cursor, Document, FindOptions, ObjectId, RemoveOptions, UpdateOptions,
    UpdateResult, DEFAULT_FIND_LIMIT,
};
pub use common::{SortOrder, Value};
pub use database::{Database, Registry};
pub use errors::{ErrorKind, HaliteError, HaliteResult};
pub use query::{Matcher, Projector, Selector};
pub use store::{DatabaseEvent, Store};
