use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

/// Error kinds for halite operations.
///
/// Each kind describes a category of failure so callers can react to the
/// class of problem without parsing the message.
///
/// # Examples
///
/// ```rust,ignore
/// use halite::errors::{ErrorKind, HaliteError, HaliteResult};
///
/// fn example() -> HaliteResult<()> {
///     Err(HaliteError::new("snapshot not found", ErrorKind::NotFound))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// Bad name, bad argument type, mixed modifier/literal keys, modifier
    /// applied to a wrong target type.
    ValidationError,
    /// A requested resource does not exist (snapshot, rename source).
    NotFound,
    /// The operation is recognized but deliberately not implemented
    /// (`$bit`, `$where`, index management).
    Unsupported,
    /// A uniqueness constraint was violated (duplicate database name,
    /// duplicate `_id`).
    Conflict,
    /// The provided identifier could not be parsed.
    InvalidId,
    /// The operation is not valid in the current state (dropped collection,
    /// materialized cursor).
    InvalidOperation,
    /// Error while multicasting an event to observer stores.
    EventError,
    /// Internal error, usually indicates a bug.
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::Unsupported => write!(f, "Unsupported operation"),
            ErrorKind::Conflict => write!(f, "Conflict"),
            ErrorKind::InvalidId => write!(f, "Invalid ID"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::EventError => write!(f, "Event error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom halite error type.
///
/// `HaliteError` carries the error message and its [ErrorKind]. All fallible
/// operations in this crate return [`HaliteResult<T>`], which is shorthand
/// for `Result<T, HaliteError>`.
#[derive(Clone, PartialEq, Eq)]
pub struct HaliteError {
    message: String,
    kind: ErrorKind,
}

impl HaliteError {
    /// Creates a new `HaliteError` with the specified message and kind.
    pub fn new(message: &str, kind: ErrorKind) -> Self {
        HaliteError {
            message: message.to_string(),
            kind,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl Display for HaliteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for HaliteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl Error for HaliteError {}

/// A result type alias for halite operations.
pub type HaliteResult<T> = Result<T, HaliteError>;

impl From<String> for HaliteError {
    fn from(msg: String) -> Self {
        HaliteError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for HaliteError {
    fn from(msg: &str) -> Self {
        HaliteError::new(msg, ErrorKind::InternalError)
    }
}

impl From<std::num::ParseIntError> for HaliteError {
    fn from(err: std::num::ParseIntError) -> Self {
        HaliteError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::ValidationError,
        )
    }
}
