use crate::collection::{Document, ObjectId};
use itertools::Itertools;
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};

/// Compare two floats with NaN folded into a total order.
/// NaN is treated as greater than every other number.
#[inline]
fn num_cmp(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

#[inline]
fn num_eq(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        true
    } else {
        a == b
    }
}

/// Represents a [Document] value. It can be a simple value like
/// [Value::Number] or [Value::String], or a complex value like
/// [Value::Document] or [Value::Array].
///
/// # Variants
/// - `Null`: absence of a value
/// - `Bool(bool)`: boolean true/false
/// - `Number(f64)`: IEEE-754 double, the only numeric type of the store
/// - `String(String)`: text value
/// - `Id(ObjectId)`: store-generated unique identifier
/// - `Timestamp(i64)`: seconds since the Unix epoch, stamped on insert
/// - `Array(Vec<Value>)`: ordered collection of values
/// - `Document(Document)`: nested document, iteration order = insertion order
///
/// # Equality and ordering
///
/// Equality is structural with two coercions: `Number` and `Timestamp`
/// compare numerically with each other, and an [ObjectId] compares equal to
/// the string holding its 24-hex form. Ordering follows the query language's
/// type ranking: numbers < strings < objects < arrays < booleans < null,
/// with ties broken inside each class (see [Value::compare]).
///
/// # Usage
///
/// Create values using the `From` conversions or the `val!` macro:
/// ```text
/// let v1: Value = 42.into();
/// let v2 = Value::from("hello");
/// let doc = doc! { age: 42, name: "Alice" };
/// ```
#[derive(Clone, Default, serde::Deserialize, serde::Serialize)]
pub enum Value {
    /// Represents a null value.
    #[default]
    Null,
    /// Represents a boolean value.
    Bool(bool),
    /// Represents a numeric value (64-bit float).
    Number(f64),
    /// Represents a string value.
    String(String),
    /// Represents an [ObjectId] value.
    Id(ObjectId),
    /// Represents an instant as whole seconds since the Unix epoch.
    Timestamp(i64),
    /// Represents an array value.
    Array(Vec<Value>),
    /// Represents a nested document value.
    Document(Document),
}

impl Value {
    /// Creates a new [Value] from anything implementing [`Into<Value>`].
    pub fn from<T: Into<Value>>(value: T) -> Value {
        value.into()
    }

    /// Creates a new [Value] from the given [Option]. [None] becomes
    /// [Value::Null].
    pub fn from_option<T: Into<Value>>(value: Option<T>) -> Value {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }

    /// Creates a [Value::Array] from a vector of convertible values.
    pub fn from_vec<T: Into<Value>>(values: Vec<T>) -> Value {
        Value::Array(values.into_iter().map(|v| v.into()).collect())
    }

    /// Creates a [Value::Timestamp] from seconds since the Unix epoch.
    pub fn timestamp(secs: i64) -> Value {
        Value::Timestamp(secs)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    #[inline]
    pub fn is_document(&self) -> bool {
        matches!(self, Value::Document(_))
    }

    #[inline]
    pub fn is_id(&self) -> bool {
        matches!(self, Value::Id(_))
    }

    /// Returns the boolean value if the [Value] is [Value::Bool].
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the numeric value of a [Value::Number] or [Value::Timestamp].
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            Value::Timestamp(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Returns the string slice if the [Value] is [Value::String].
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the [ObjectId] if the [Value] is [Value::Id].
    #[inline]
    pub fn as_id(&self) -> Option<&ObjectId> {
        match self {
            Value::Id(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the array if the [Value] is [Value::Array].
    #[inline]
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the mutable array if the [Value] is [Value::Array].
    #[inline]
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the document if the [Value] is [Value::Document].
    #[inline]
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the mutable document if the [Value] is [Value::Document].
    #[inline]
    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Value::Document(v) => Some(v),
            _ => None,
        }
    }

    /// Runtime-type discriminator used by the `$type` operator.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Id(_) => "id",
            Value::Timestamp(_) => "timestamp",
            Value::Array(_) => "array",
            Value::Document(_) => "object",
        }
    }

    /// Boolean coercion used by operators that accept loose flags
    /// (`$exists`, projection flags).
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(v) => *v,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Id(_) | Value::Timestamp(_) => true,
            Value::Array(_) | Value::Document(_) => true,
        }
    }

    /// Rank of the value's class in the query language's type ordering:
    /// numbers < strings < objects < arrays < booleans < null.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Number(_) | Value::Timestamp(_) => 0,
            Value::String(_) | Value::Id(_) => 1,
            Value::Document(_) => 2,
            Value::Array(_) => 3,
            Value::Bool(_) => 4,
            Value::Null => 5,
        }
    }

    /// Textual form used when a value of the string class is compared.
    fn as_text(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Id(id) => Some(id.to_hex()),
            _ => None,
        }
    }

    /// Total order over values following the type ranking, with ties broken
    /// inside each class: numerically, lexicographically, entry-wise for
    /// documents, element-wise for arrays, `false < true` for booleans.
    ///
    /// This is the comparison behind `$lt`/`$lte`/`$gt`/`$gte` and cursor
    /// sorting. It is intentionally a method rather than an [Ord] impl:
    /// the coercing [PartialEq] and this cross-class ranking do not form a
    /// lawful `Ord`.
    pub fn compare(&self, other: &Value) -> Ordering {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return num_cmp(a, b);
        }
        if let (Some(a), Some(b)) = (self.as_text(), other.as_text()) {
            return a.cmp(&b);
        }

        match (self, other) {
            (Value::Document(a), Value::Document(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let key_cmp = ka.cmp(kb);
                    if key_cmp != Ordering::Equal {
                        return key_cmp;
                    }
                    let val_cmp = va.compare(vb);
                    if val_cmp != Ordering::Equal {
                        return val_cmp;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Array(a), Value::Array(b)) => {
                for (va, vb) in a.iter().zip(b.iter()) {
                    let cmp = va.compare(vb);
                    if cmp != Ordering::Equal {
                        return cmp;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Null, Value::Null) => Ordering::Equal,
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    pub(crate) fn to_json_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(v) => v.to_string(),
            Value::Number(n) => fmt_number(*n),
            Value::String(s) => format!("\"{}\"", s),
            Value::Id(id) => format!("\"{}\"", id.to_hex()),
            Value::Timestamp(t) => t.to_string(),
            Value::Array(items) => {
                format!("[{}]", items.iter().map(|v| v.to_json_string()).join(", "))
            }
            Value::Document(doc) => doc.to_json_string(),
        }
    }

    pub(crate) fn to_debug_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(v) => format!("bool({})", v),
            Value::Number(n) => format!("number({})", fmt_number(*n)),
            Value::String(s) => format!("string(\"{}\")", s),
            Value::Id(id) => format!("id({})", id.to_hex()),
            Value::Timestamp(t) => format!("timestamp({})", t),
            Value::Array(items) => {
                format!("[{}]", items.iter().map(|v| v.to_debug_string()).join(", "))
            }
            Value::Document(doc) => doc.to_debug_string(),
        }
    }
}

fn fmt_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return num_eq(a, b);
        }

        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Id(a), Value::Id(b)) => a == b,
            (Value::Id(a), Value::String(b)) | (Value::String(b), Value::Id(a)) => {
                a.to_hex() == *b
            }
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Document(a), Value::Document(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_debug_string())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Number(v as f64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(v as f64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(v as f64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Number(v as f64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Number(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::Id(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}
