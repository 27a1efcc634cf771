//! Entry keys.
//!
//! A carrier key is either an *index* key or a *named* key. Index keys are
//! the canonical decimal integers in `[0, 2^31 - 1)`; everything else is a
//! name. The split matters because index keys always enumerate first, in
//! numeric order, while named keys follow in insertion order.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Largest integer that still counts as an index key (`2^31 - 2`).
pub const MAX_INDEX: u32 = 2_147_483_646;

/// Largest integer an `f64` represents exactly (`2^53`).
const MAX_SAFE_FLOAT: f64 = 9_007_199_254_740_992.0;

/// A carrier entry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Canonical integer key in `0..=MAX_INDEX`; enumerates numerically.
    Index(u32),
    /// Any other key; enumerates in insertion order after all index keys.
    Name(String),
}

impl Key {
    /// Classify key text.
    ///
    /// Only canonical decimal text counts as an index: `"7"` is an index,
    /// `"07"`, `"+7"` and `"7.0"` are names.
    pub fn parse(text: &str) -> Self {
        match parse_index(text) {
            Some(index) => Key::Index(index),
            None => Key::Name(text.to_string()),
        }
    }

    /// Extract the preferred key of a member object (its `k` field).
    ///
    /// Only truthy scalars qualify: non-empty strings, non-zero numbers and
    /// `true`. Returns `None` when the member has no usable `k`.
    pub fn from_member(member: &Value) -> Option<Self> {
        match member.get("k")? {
            Value::String(s) if !s.is_empty() => Some(Key::parse(s)),
            Value::Number(n) => from_number(n),
            Value::Bool(true) => Some(Key::Name("true".to_string())),
            _ => None,
        }
    }

    /// The index value, if this is an index key.
    pub fn as_index(&self) -> Option<u32> {
        match self {
            Key::Index(index) => Some(*index),
            Key::Name(_) => None,
        }
    }

    /// Whether this key enumerates in the numeric partition.
    pub fn is_index(&self) -> bool {
        matches!(self, Key::Index(_))
    }

    /// The key one below this one, used to place entries in front.
    ///
    /// `Index(0)` steps down to the name `"-1"`. Names that are not integer
    /// text have no predecessor.
    pub fn predecessor(&self) -> Option<Self> {
        match self {
            Key::Index(0) => Some(Key::Name("-1".to_string())),
            Key::Index(n) => Some(Key::from(n - 1)),
            Key::Name(name) => name
                .parse::<i64>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .map(Key::from),
        }
    }

    /// Whether the variant agrees with the key text.
    ///
    /// A hand-built `Key::Name("5")` or `Key::Index(u32::MAX)` is not
    /// canonical; the carrier normalizes such keys before use.
    pub fn is_canonical(&self) -> bool {
        match self {
            Key::Index(index) => *index <= MAX_INDEX,
            Key::Name(name) => parse_index(name).is_none(),
        }
    }

    /// Re-classify the key from its text.
    pub fn normalize(self) -> Self {
        match self {
            Key::Index(index) => Key::from(index),
            Key::Name(name) => Key::from(name),
        }
    }
}

fn parse_index(text: &str) -> Option<u32> {
    let bytes = text.as_bytes();
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    let value: u64 = text.parse().ok()?;
    if value <= MAX_INDEX as u64 {
        Some(value as u32)
    } else {
        None
    }
}

fn from_number(n: &serde_json::Number) -> Option<Key> {
    if let Some(i) = n.as_i64() {
        return (i != 0).then(|| Key::from(i));
    }
    if let Some(u) = n.as_u64() {
        return (u != 0).then(|| Key::from(u));
    }
    let f = n.as_f64()?;
    if f == 0.0 || !f.is_finite() {
        return None;
    }
    if f.fract() == 0.0 && f.abs() < MAX_SAFE_FLOAT {
        Some(Key::from(f as i64))
    } else {
        Some(Key::Name(f.to_string()))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "{}", index),
            Key::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for Key {
    fn from(text: &str) -> Self {
        Key::parse(text)
    }
}

impl From<String> for Key {
    fn from(text: String) -> Self {
        match parse_index(&text) {
            Some(index) => Key::Index(index),
            None => Key::Name(text),
        }
    }
}

impl From<&String> for Key {
    fn from(text: &String) -> Self {
        Key::parse(text)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

impl From<u32> for Key {
    fn from(n: u32) -> Self {
        if n <= MAX_INDEX {
            Key::Index(n)
        } else {
            Key::Name(n.to_string())
        }
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::from(n as i64)
    }
}

impl From<u64> for Key {
    fn from(n: u64) -> Self {
        if n <= MAX_INDEX as u64 {
            Key::Index(n as u32)
        } else {
            Key::Name(n.to_string())
        }
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        if (0..=MAX_INDEX as i64).contains(&n) {
            Key::Index(n as u32)
        } else {
            Key::Name(n.to_string())
        }
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Key::from)
    }
}
