//! Permission grants attached to roles.

use crate::constants;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessLevel {
    Read,
    Write,
    #[serde(rename = "READWRITE")]
    ReadWrite,
}

impl AccessLevel {
    /// Lowercase form accepted by `etcdctl role grant-permission`.
    pub fn as_etcdctl_arg(&self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
            AccessLevel::ReadWrite => "readwrite",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessLevel::Read => "READ",
            AccessLevel::Write => "WRITE",
            AccessLevel::ReadWrite => "READWRITE",
        };
        f.write_str(s)
    }
}

impl FromStr for AccessLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "READ" => Ok(AccessLevel::Read),
            "WRITE" => Ok(AccessLevel::Write),
            "READWRITE" => Ok(AccessLevel::ReadWrite),
            _ => Err(Error::invalid(format!(
                "access level must be READ, WRITE or READWRITE, got: {}",
                s
            ))),
        }
    }
}

/// A key or key range with an access level.
///
/// Keys and range ends are raw bytes, as etcd stores them. An empty
/// `range_end` covers exactly `key`; otherwise the half-open range
/// `[key, range_end)`. A range end of `"\0"` covers every key from `key` on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    #[serde(with = "key_bytes")]
    pub key: Vec<u8>,
    #[serde(default, with = "key_bytes")]
    pub range_end: Vec<u8>,
    pub access: AccessLevel,
}

impl Permission {
    pub fn new(key: impl Into<Vec<u8>>, range_end: impl Into<Vec<u8>>, access: AccessLevel) -> Self {
        Self {
            key: key.into(),
            range_end: range_end.into(),
            access,
        }
    }

    /// Whether this grant covers the same keys as `key`/`range_end`.
    pub fn covers(&self, key: &[u8], range_end: &[u8]) -> bool {
        self.key == key && self.range_end == range_end
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = display_bytes(&self.key);
        match self.range_end.as_slice() {
            b"" => write!(f, "{} {}", self.access, key),
            constants::FROM_KEY_RANGE_END => write!(f, "{} [{}, <end>)", self.access, key),
            end => write!(f, "{} [{}, {})", self.access, key, display_bytes(end)),
        }
    }
}

/// Printable form of a key: the text itself when it is UTF-8, otherwise
/// ASCII with `\xNN` escapes.
pub fn display_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.escape_ascii().to_string(),
    }
}

mod key_bytes {
    use super::display_bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&display_bytes(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        Ok(String::deserialize(d)?.into_bytes())
    }
}

/// How a grant's range end is derived from its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRange {
    /// Exactly the key.
    Single,
    /// Every key sharing the key as prefix.
    Prefix,
    /// Keys in `[key, end)`.
    Until(String),
    /// Every key greater than or equal to the key.
    FromKey,
}

impl KeyRange {
    pub fn range_end(&self, key: &str) -> Vec<u8> {
        match self {
            KeyRange::Single => Vec::new(),
            KeyRange::Prefix => prefix_range_end(key.as_bytes()),
            KeyRange::Until(end) => end.as_bytes().to_vec(),
            KeyRange::FromKey => constants::FROM_KEY_RANGE_END.to_vec(),
        }
    }
}

/// Range end covering every key that starts with `prefix`.
///
/// The last byte below 0xff is incremented and everything after it dropped,
/// so the result need not be valid UTF-8. A prefix made only of 0xff bytes
/// (or an empty one) has no upper bound.
pub fn prefix_range_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return end;
        }
    }
    constants::FROM_KEY_RANGE_END.to_vec()
}
