//! Carrier - the ordered entry map behind every carrier.
//!
//! Enumeration order is explicit here instead of being inherited from a
//! host object model:
//!
//! 1. all index keys, ascending numerically
//! 2. all named keys, in the order they were first inserted
//!
//! Overwriting a key keeps its slot. Removing a named key and inserting it
//! again moves it to the back.
//!
//! Keys are normalized on the way in, so a hand-built `Key::Name("5")`
//! addresses the same entry as `Key::Index(5)`.

use crate::Key;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

/// Ordered mapping from [`Key`] to JSON value.
#[derive(Debug, Clone, Default)]
pub struct Carrier {
    /// Index keys, sorted by value
    indexed: BTreeMap<u32, (Key, Value)>,
    /// Named keys, sorted by insertion sequence
    named: BTreeMap<u64, (Key, Value)>,
    /// Name -> insertion sequence
    positions: HashMap<String, u64>,
    /// Next insertion sequence for a named key
    next_seq: u64,
}

impl Carrier {
    /// Create an empty carrier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.indexed.len() + self.named.len()
    }

    /// Check if the carrier has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if an entry exists.
    pub fn contains_key(&self, key: &Key) -> bool {
        match canonical(key).as_ref() {
            Key::Index(index) => self.indexed.contains_key(index),
            Key::Name(name) => self.positions.contains_key(name),
        }
    }

    /// Get a value by key.
    pub fn get(&self, key: &Key) -> Option<&Value> {
        match canonical(key).as_ref() {
            Key::Index(index) => self.indexed.get(index).map(|(_, v)| v),
            Key::Name(name) => {
                let seq = self.positions.get(name)?;
                self.named.get(seq).map(|(_, v)| v)
            }
        }
    }

    /// Get a mutable value by key.
    pub fn get_mut(&mut self, key: &Key) -> Option<&mut Value> {
        match canonical(key).as_ref() {
            Key::Index(index) => self.indexed.get_mut(index).map(|(_, v)| v),
            Key::Name(name) => {
                let seq = self.positions.get(name)?;
                self.named.get_mut(seq).map(|(_, v)| v)
            }
        }
    }

    /// Insert or overwrite an entry, returning the previous value.
    ///
    /// An existing key keeps its enumeration slot.
    pub fn insert(&mut self, key: Key, value: Value) -> Option<Value> {
        let key = key.normalize();
        match key {
            Key::Index(index) => self
                .indexed
                .insert(index, (key, value))
                .map(|(_, old)| old),
            Key::Name(ref name) => {
                if let Some(seq) = self.positions.get(name) {
                    if let Some(slot) = self.named.get_mut(seq) {
                        return Some(std::mem::replace(&mut slot.1, value));
                    }
                }
                let seq = self.next_seq;
                self.next_seq += 1;
                self.positions.insert(name.clone(), seq);
                self.named.insert(seq, (key, value));
                None
            }
        }
    }

    /// Remove an entry, returning its value.
    pub fn remove(&mut self, key: &Key) -> Option<Value> {
        match canonical(key).as_ref() {
            Key::Index(index) => self.indexed.remove(index).map(|(_, v)| v),
            Key::Name(name) => {
                let seq = self.positions.remove(name)?;
                self.named.remove(&seq).map(|(_, v)| v)
            }
        }
    }

    /// The first key in enumeration order.
    pub fn first_key(&self) -> Option<&Key> {
        self.iter().next().map(|(k, _)| k)
    }

    /// The last key in enumeration order.
    pub fn last_key(&self) -> Option<&Key> {
        self.iter().next_back().map(|(k, _)| k)
    }

    /// Remove and return the first entry in enumeration order.
    pub fn pop_first(&mut self) -> Option<(Key, Value)> {
        if let Some((_, entry)) = self.indexed.pop_first() {
            return Some(entry);
        }
        let (_, (key, value)) = self.named.pop_first()?;
        if let Key::Name(name) = &key {
            self.positions.remove(name);
        }
        Some((key, value))
    }

    /// Remove and return the last entry in enumeration order.
    pub fn pop_last(&mut self) -> Option<(Key, Value)> {
        if let Some((_, (key, value))) = self.named.pop_last() {
            if let Key::Name(name) = &key {
                self.positions.remove(name);
            }
            return Some((key, value));
        }
        self.indexed.pop_last().map(|(_, entry)| entry)
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.indexed.clear();
        self.named.clear();
        self.positions.clear();
        self.next_seq = 0;
    }

    /// Iterate entries in enumeration order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&Key, &Value)> + '_ {
        self.indexed
            .values()
            .chain(self.named.values())
            .map(|(k, v)| (k, v))
    }

    /// Iterate keys in enumeration order.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &Key> + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// Iterate values in enumeration order.
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &Value> + '_ {
        self.iter().map(|(_, v)| v)
    }
}

fn canonical(key: &Key) -> Cow<'_, Key> {
    if key.is_canonical() {
        Cow::Borrowed(key)
    } else {
        Cow::Owned(key.clone().normalize())
    }
}

impl PartialEq for Carrier {
    /// Two carriers are equal when they enumerate the same entries in the
    /// same order; internal insertion counters are ignored.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Into<Key>> FromIterator<(K, Value)> for Carrier {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut carrier = Carrier::new();
        for (key, value) in iter {
            carrier.insert(key.into(), value);
        }
        carrier
    }
}
