use indexmap::IndexMap;

use crate::common::{path, Value, DOC_ID};
use crate::errors::{ErrorKind, HaliteError, HaliteResult};
use itertools::Itertools;
use std::fmt::{Debug, Display};

/// Represents a schemaless record in a halite collection.
///
/// A document is composed of key-value pairs. The key is always a [String]
/// and the value is a [Value]. Iteration order is insertion order, which the
/// query and update language relies on (modifier clauses apply in declared
/// order, sort specifications rank fields in declared order).
///
/// Nested values are addressed with dot-joined key-paths in the query and
/// update language (e.g. `"a.b.2.c"`); stored field names themselves must
/// not contain `.` or start with `$`. That rule is enforced when a document
/// is committed to a collection, not here, because selector and update
/// documents legitimately carry `$`-operators and dotted paths.
///
/// Two fields are reserved and maintained by the store:
///
/// * `_id` - the unique identifier of the document, assigned during insert
///   when absent.
/// * `timestamp` - the identifier's generation instant, stamped on insert.
#[derive(Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Document {
    pub(crate) data: IndexMap<String, Value>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document {
            data: IndexMap::new(),
        }
    }

    /// Checks if the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the number of top-level fields.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Associates the specified [Value] with the specified key.
    ///
    /// If the key already exists its value is replaced in place, keeping the
    /// key's position; otherwise the pair is appended.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty.
    pub fn set<T: Into<Value>>(&mut self, key: &str, value: T) -> HaliteResult<()> {
        if key.is_empty() {
            log::error!("Document does not support an empty key");
            return Err(HaliteError::new(
                "Document does not support an empty key",
                ErrorKind::ValidationError,
            ));
        }

        self.data.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Returns the value associated with the top-level key, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Resolves a dot-joined key-path against this document.
    ///
    /// Objects are traversed by key, arrays by numeric index. Returns [None]
    /// when any step is missing or not addressable.
    pub fn lookup(&self, key_path: &str) -> Option<&Value> {
        path::lookup_path(self, key_path)
    }

    /// Removes the key and returns its value, preserving the order of the
    /// remaining fields.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.shift_remove(key)
    }

    /// Checks if a top-level key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Iterates over the key-value pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    /// Iterates over the keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    /// Returns the `_id` value of this document, if assigned.
    pub fn id(&self) -> Option<&Value> {
        self.data.get(DOC_ID)
    }

    /// Returns the canonical string form of the `_id`, if one is assigned
    /// and representable: identifiers render as 24-hex, strings as-is,
    /// numbers as their digits.
    pub fn id_str(&self) -> Option<String> {
        match self.data.get(DOC_ID)? {
            Value::Id(id) => Some(id.to_hex()),
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(
                format!("{}", n)
                    .chars()
                    .filter(|c| c.is_ascii_digit())
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Merges another document into this one.
    ///
    /// If a key exists in both and both values are documents they are merged
    /// recursively; otherwise the value from `other` wins.
    pub fn merge(&mut self, other: &Document) {
        for (key, value) in other.data.iter() {
            match (self.data.get_mut(key), value) {
                (Some(Value::Document(existing)), Value::Document(incoming)) => {
                    existing.merge(incoming);
                }
                _ => {
                    self.data.insert(key.clone(), value.clone());
                }
            }
        }
    }

    pub(crate) fn to_json_string(&self) -> String {
        format!(
            "{{{}}}",
            self.data
                .iter()
                .map(|(k, v)| format!("\"{}\": {}", k, v.to_json_string()))
                .join(", ")
        )
    }

    pub(crate) fn to_debug_string(&self) -> String {
        format!(
            "{{{}}}",
            self.data
                .iter()
                .map(|(k, v)| format!("\"{}\": {}", k, v.to_debug_string()))
                .join(", ")
        )
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_debug_string())
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json_string())
    }
}

/// Strips the surrounding quotes a `stringify!`-ed string-literal key keeps.
pub fn normalize(key: &str) -> String {
    key.trim_matches('"').to_string()
}

/// Creates a halite [Document] with JSON-like syntax.
///
/// # Examples
///
/// ```rust
/// use halite::doc;
///
/// // Empty document
/// let empty = doc! {};
///
/// // Simple key-value pairs
/// let simple = doc! {
///     name: "Alice",
///     age: 30
/// };
///
/// // Nested documents and arrays
/// let complex = doc! {
///     user: {
///         name: "Charlie",
///         tags: ["admin", "user"]
///     },
///     values: [1, 2, 3]
/// };
/// ```
#[macro_export]
macro_rules! doc {
    // empty document, braced form kept for symmetry with nested documents
    ({}) => {
        $crate::collection::Document::new()
    };

    () => {
        $crate::collection::Document::new()
    };

    // braced form
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::doc!($($key : $value),*)
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::val;

            let mut doc = $crate::collection::Document::new();
            $(
                doc.set(&$crate::collection::normalize(stringify!($key)), $crate::val!($value))
                    .expect("invalid document key");
            )*
            doc
        }
    };
}

/// Helper macro converting literals, nested documents and arrays for the
/// [doc!](crate::doc) macro.
#[macro_export]
macro_rules! val {
    (null) => {
        $crate::common::Value::Null
    };

    // nested document
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
    };

    // array of values
    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::val!($value)),*])
    };

    // any expression convertible to a Value
    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
