use crate::common::util::current_time_secs;
use crate::errors::{ErrorKind, HaliteError, HaliteResult};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::Rng;
use std::fmt::{Debug, Display};
use std::sync::atomic::{AtomicU32, Ordering};

/// Random salt shared by every id generated in this process.
static PROCESS_SALT: Lazy<[u8; 5]> = Lazy::new(|| {
    let mut salt = [0u8; 5];
    OsRng.fill(&mut salt[..]);
    salt
});

/// Monotonic counter for the trailing three octets, seeded randomly.
static ID_COUNTER: Lazy<AtomicU32> = Lazy::new(|| AtomicU32::new(OsRng.gen::<u32>() & 0x00FF_FFFF));

/// A unique identifier for documents in halite.
///
/// Each document in a collection is uniquely identified by its `_id` field.
/// When a document is inserted without one, the store assigns a fresh
/// `ObjectId`.
///
/// # Layout
///
/// The id is an opaque 12-octet value:
/// - octets 0..4: seconds since the Unix epoch, big-endian
/// - octets 4..9: per-process random salt
/// - octets 9..12: wrapping counter, randomly seeded
///
/// The time prefix makes the creation instant recoverable through
/// [`generation_time`](ObjectId::generation_time); the salt and counter make
/// collisions within a process lifetime overwhelmingly improbable.
///
/// # Examples
///
/// ```rust,ignore
/// use halite::collection::ObjectId;
///
/// let id = ObjectId::new();
/// assert_eq!(id.to_hex().len(), 24);
///
/// let parsed = ObjectId::parse_str(&id.to_hex())?;
/// assert_eq!(parsed, id);
/// ```
#[derive(PartialEq, Eq, Ord, PartialOrd, Hash, Clone, Copy, serde::Deserialize, serde::Serialize)]
pub struct ObjectId {
    bytes: [u8; 12],
}

impl ObjectId {
    /// Generates a new unique `ObjectId` stamped with the current time.
    pub fn new() -> Self {
        let seconds = current_time_secs() as u32;
        let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00FF_FFFF;

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&*PROCESS_SALT);
        bytes[9..12].copy_from_slice(&counter.to_be_bytes()[1..4]);

        ObjectId { bytes }
    }

    /// Creates an `ObjectId` from its raw 12-octet form.
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId { bytes }
    }

    /// Parses an `ObjectId` from its 24-character hexadecimal form.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::InvalidId] if the input is not exactly 24
    /// hexadecimal characters.
    pub fn parse_str(hex: &str) -> HaliteResult<ObjectId> {
        if hex.len() != 24 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            log::error!("Invalid object id '{}'", hex);
            return Err(HaliteError::new(
                &format!("'{}' is not a valid 24-character hex object id", hex),
                ErrorKind::InvalidId,
            ));
        }

        let mut bytes = [0u8; 12];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| {
                HaliteError::new("object id is not valid UTF-8", ErrorKind::InvalidId)
            })?;
            bytes[i] = u8::from_str_radix(pair, 16).map_err(|_| {
                HaliteError::new(
                    &format!("'{}' is not a valid 24-character hex object id", hex),
                    ErrorKind::InvalidId,
                )
            })?;
        }
        Ok(ObjectId { bytes })
    }

    /// Returns the raw 12-octet form of this id.
    pub fn bytes(&self) -> &[u8; 12] {
        &self.bytes
    }

    /// Returns the 24-character hexadecimal form of this id.
    pub fn to_hex(&self) -> String {
        let mut hex = String::with_capacity(24);
        for byte in &self.bytes {
            hex.push_str(&format!("{:02x}", byte));
        }
        hex
    }

    /// The creation instant embedded in the id, as seconds since the Unix
    /// epoch.
    pub fn generation_time(&self) -> i64 {
        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(&self.bytes[0..4]);
        u32::from_be_bytes(prefix) as i64
    }

    /// The creation instant embedded in the id, as a UTC datetime.
    pub fn generation_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.generation_time(), 0).unwrap_or_default()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        ObjectId::new()
    }
}

impl Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
