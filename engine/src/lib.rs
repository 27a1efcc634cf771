//! # Carrier Engine
//!
//! A persisted, ordered key-value container with queue and stack semantics.
//!
//! A carrier keeps JSON values under string keys, enumerates them in a fixed
//! order, optionally caps its size by evicting the oldest entries, and writes
//! its whole content through to a storage backend after every mutation.
//!
//! ## Core Concepts
//!
//! ### Keys and Enumeration Order
//!
//! Every [`Key`] is either an index key (canonical decimal text in
//! `0..=`[`MAX_INDEX`]) or a named key. Enumeration always lists index keys
//! first in ascending numeric order, then named keys in the order they were
//! first inserted. Overwriting a key keeps its position; removing and
//! re-inserting a named key moves it to the back.
//!
//! ### Members
//!
//! Operations with a `_member` suffix take a JSON object and read its
//! preferred key from the `k` field. Members without one get a timestamp key
//! from the carrier's [`Clock`].
//!
//! ### Persistence
//!
//! A [`Backend`] stores one JSON document per carrier name. The engine ships
//! [`MemoryBackend`] (with an optional byte quota) and [`FileBackend`]
//! (one file per carrier). A blob that cannot be parsed loads as empty.
//!
//! ## Quick Start
//!
//! ```rust
//! use carrier_engine::{MemoryBackend, OrderedCarrier};
//! use serde_json::json;
//!
//! let mut recent = OrderedCarrier::new(MemoryBackend::new(), "recent", 2, false).unwrap();
//!
//! recent.set("a", 1).unwrap();
//! recent.set("b", 2).unwrap();
//! recent.set("c", 3).unwrap();
//!
//! // Oldest entry evicted to honour the limit
//! assert_eq!(recent.get("a"), None);
//! assert_eq!(recent.to_json().unwrap(), r#"{"b":2,"c":3}"#);
//!
//! // Index keys always enumerate first, so they are evicted first too
//! recent.push("7", json!({"k": 7})).unwrap();
//! assert_eq!(recent.to_json().unwrap(), r#"{"b":2,"c":3}"#);
//!
//! let mut users = OrderedCarrier::new(MemoryBackend::new(), "users", 0, false).unwrap();
//! users.set_member(json!({"k": "zoe", "age": 31})).unwrap();
//! users.set_member(json!({"k": 12, "age": 40})).unwrap();
//! assert_eq!(users.keys()[0].to_string(), "12");
//! assert_eq!(users.find_prop("age", &json!(31)).len(), 1);
//! ```
//!
//! ## FFI
//!
//! The [`ffi`] module provides C-compatible functions for use from other languages.
//! All values are exchanged as JSON strings.

pub mod backend;
pub mod clock;
pub mod codec;
pub mod config;
pub mod entries;
pub mod error;
pub mod ffi;
pub mod key;
pub mod query;
pub mod store;

// Re-export main types at crate root
pub use backend::{Backend, FileBackend, MemoryBackend};
pub use clock::{Clock, ManualClock, SystemClock, TimestampUnit};
pub use config::CarrierConfig;
pub use entries::Carrier;
pub use error::Error;
pub use key::{Key, MAX_INDEX};
pub use query::{prop_eq, ListQuery};
pub use store::OrderedCarrier;
