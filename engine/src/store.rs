//! OrderedCarrier - a named carrier persisted through a backend.
//!
//! The carrier is loaded once at construction and then served from memory.
//! Every mutation is written through: the whole carrier is encoded and
//! handed to the backend before the call returns. There is no batching and
//! no coordination between instances; two carriers opened under the same
//! name overwrite each other (last writer wins).

use crate::{
    codec,
    error::Result,
    query::{prop_eq, ListQuery},
    Backend, Carrier, CarrierConfig, Clock, Key, SystemClock,
};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// A persisted, ordered key-value container.
///
/// Ordering-sensitive operations (first/last, push/pop/shift/unshift,
/// eviction) follow the carrier's enumeration order: index keys ascending,
/// then named keys in insertion order. See [`Carrier`].
#[derive(Debug)]
pub struct OrderedCarrier<B, C = SystemClock> {
    /// Name, limit and key unit
    config: CarrierConfig,
    /// Blob storage the carrier is written through to
    backend: B,
    /// Time source for auto-generated keys
    clock: C,
    /// In-memory entries, mirroring the last persisted blob
    entries: Carrier,
}

impl<B: Backend> OrderedCarrier<B> {
    /// Open a carrier using the system clock.
    pub fn open(backend: B, config: CarrierConfig) -> Result<Self> {
        Self::open_with_clock(backend, config, SystemClock)
    }

    /// Open a carrier from positional settings.
    ///
    /// `limit` of 0 means unlimited; `based_on_second` selects second
    /// instead of millisecond timestamp keys.
    pub fn new(
        backend: B,
        name: impl Into<String>,
        limit: usize,
        based_on_second: bool,
    ) -> Result<Self> {
        let config = CarrierConfig::new(name)
            .with_limit(limit)
            .based_on_second(based_on_second);
        Self::open(backend, config)
    }
}

impl<B: Backend, C: Clock> OrderedCarrier<B, C> {
    /// Open a carrier with an explicit clock.
    ///
    /// An absent blob loads as an empty carrier, and so does an
    /// undecodable one. Backend read failures are returned.
    pub fn open_with_clock(backend: B, config: CarrierConfig, clock: C) -> Result<Self> {
        let entries = load(&backend, &config.name)?;
        tracing::debug!(
            name = %config.name,
            entries = entries.len(),
            limit = config.limit,
            "carrier opened"
        );
        Ok(Self {
            config,
            backend,
            clock,
            entries,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &CarrierConfig {
        &self.config
    }

    /// Get the backend name of this carrier.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Get the entry limit (0 = unlimited).
    pub fn limit(&self) -> usize {
        self.config.limit
    }

    /// Get the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the carrier has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ========================================================================
    // Map access
    // ========================================================================

    /// Insert or overwrite the entry at `key`.
    ///
    /// An existing key keeps its position. A `null` value is ignored.
    pub fn set(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if value.is_null() {
            return Ok(());
        }
        self.entries.insert(key.into(), value);
        self.save()
    }

    /// Insert or overwrite a member under its preferred key.
    ///
    /// Returns the key the member was stored under, or `None` for a `null`
    /// member (nothing is stored).
    pub fn set_member(&mut self, member: Value) -> Result<Option<Key>> {
        if member.is_null() {
            return Ok(None);
        }
        let key = self.member_key(&member);
        self.entries.insert(key.clone(), member);
        self.save()?;
        Ok(Some(key))
    }

    /// Get the value stored at `key`.
    pub fn get(&self, key: impl Into<Key>) -> Option<&Value> {
        self.entries.get(&key.into())
    }

    /// Get the value stored under a member's preferred key.
    pub fn get_member(&self, member: &Value) -> Option<&Value> {
        Key::from_member(member).and_then(|key| self.entries.get(&key))
    }

    /// Value at the first key in enumeration order.
    pub fn get_first(&self) -> Option<&Value> {
        self.entries.values().next()
    }

    /// Value at the last key in enumeration order.
    pub fn get_last(&self) -> Option<&Value> {
        self.entries.values().next_back()
    }

    /// Remove the entry at `key`. Missing keys are ignored.
    pub fn remove(&mut self, key: impl Into<Key>) -> Result<()> {
        self.entries.remove(&key.into());
        self.save()
    }

    /// Remove the entry stored under a member's preferred key.
    pub fn remove_member(&mut self, member: &Value) -> Result<()> {
        if let Some(key) = Key::from_member(member) {
            self.entries.remove(&key);
        }
        self.save()
    }

    /// Remove several entries at once; persists a single time.
    pub fn remove_many<I, K>(&mut self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        for key in keys {
            self.entries.remove(&key.into());
        }
        self.save()
    }

    /// Remove the first `n` entries in enumeration order.
    ///
    /// `n = 0` counts as 1, so `remove_first(0)` drops the first entry.
    pub fn remove_first(&mut self, n: usize) -> Result<()> {
        for _ in 0..n.max(1) {
            if self.entries.pop_first().is_none() {
                break;
            }
        }
        self.save()
    }

    /// Remove the last `n` entries in enumeration order.
    ///
    /// `n = 0` counts as 1, as in [`remove_first`](Self::remove_first).
    pub fn remove_last(&mut self, n: usize) -> Result<()> {
        for _ in 0..n.max(1) {
            if self.entries.pop_last().is_none() {
                break;
            }
        }
        self.save()
    }

    // ========================================================================
    // Queue / stack
    // ========================================================================

    /// Delete then insert at `key`, moving a named key to the back.
    ///
    /// Index keys still enumerate numerically, so a pushed index key is not
    /// necessarily last.
    pub fn push(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if value.is_null() {
            return Ok(());
        }
        self.reinsert(key.into(), value);
        self.save()
    }

    /// [`push`](Self::push) a member under its preferred key.
    pub fn push_member(&mut self, member: Value) -> Result<Option<Key>> {
        if member.is_null() {
            return Ok(None);
        }
        let key = self.member_key(&member);
        self.reinsert(key.clone(), member);
        self.save()?;
        Ok(Some(key))
    }

    /// Remove and return the last entry's value.
    ///
    /// Persists only when an entry was removed.
    pub fn pop(&mut self) -> Result<Option<Value>> {
        match self.entries.pop_last() {
            Some((_, value)) => {
                self.save()?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Remove and return the first entry's value.
    ///
    /// Persists only when an entry was removed.
    pub fn shift(&mut self) -> Result<Option<Value>> {
        match self.entries.pop_first() {
            Some((_, value)) => {
                self.save()?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Delete then insert at `key`.
    ///
    /// The entry only lands in front if `key` enumerates before the current
    /// first key; that is up to the caller.
    pub fn unshift(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if value.is_null() {
            return Ok(());
        }
        self.reinsert(key.into(), value);
        self.save()
    }

    /// Insert a member intended to become the first entry.
    ///
    /// Without a preferred key the member is stored one below the current
    /// first key, or under a timestamp key when the carrier is empty or the
    /// first key is not an integer. Callers relying on front placement must
    /// keep keys below `2^31 - 1` (for example with second timestamps).
    pub fn unshift_member(&mut self, member: Value) -> Result<Option<Key>> {
        if member.is_null() {
            return Ok(None);
        }
        let key = match Key::from_member(&member) {
            Some(key) => key,
            None => self
                .entries
                .first_key()
                .and_then(Key::predecessor)
                .unwrap_or_else(|| self.timestamp_key()),
        };
        self.reinsert(key.clone(), member);
        self.save()?;
        Ok(Some(key))
    }

    // ========================================================================
    // Enumeration
    // ========================================================================

    /// All keys in enumeration order.
    pub fn keys(&self) -> Vec<Key> {
        self.entries.keys().cloned().collect()
    }

    /// Keys sorted by their text. The carrier is not reordered.
    pub fn sort(&self) -> Vec<Key> {
        let mut keys = self.keys();
        keys.sort_by_cached_key(|k| k.to_string());
        keys
    }

    /// Keys sorted with `compare`. The carrier is not reordered.
    pub fn sort_by<F>(&self, compare: F) -> Vec<Key>
    where
        F: FnMut(&Key, &Key) -> Ordering,
    {
        let mut keys = self.keys();
        keys.sort_by(compare);
        keys
    }

    /// Keys in reverse enumeration order.
    pub fn reverse(&self) -> Vec<Key> {
        self.entries.keys().rev().cloned().collect()
    }

    /// The live entry map.
    pub fn value(&self) -> &Carrier {
        &self.entries
    }

    /// Call `f(value, key, carrier)` for every entry in enumeration order.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Value, &Key, &Carrier),
    {
        for (key, value) in self.entries.iter() {
            f(value, key, &self.entries);
        }
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Whether any entry matches `predicate`.
    pub fn has<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&Value, &Key) -> bool,
    {
        self.entries.iter().any(|(k, v)| predicate(v, k))
    }

    /// Whether any value has property `name` strictly equal to `value`.
    pub fn has_prop(&self, name: &str, value: &Value) -> bool {
        self.has(prop_eq(name, value.clone()))
    }

    /// First value matching `predicate`.
    pub fn lookup<F>(&self, mut predicate: F) -> Option<&Value>
    where
        F: FnMut(&Value, &Key) -> bool,
    {
        self.entries
            .iter()
            .find(|&(k, v)| predicate(v, k))
            .map(|(_, v)| v)
    }

    /// First value whose property `name` strictly equals `value`.
    pub fn lookup_prop(&self, name: &str, value: &Value) -> Option<&Value> {
        self.lookup(prop_eq(name, value.clone()))
    }

    /// Every value matching `predicate`, in enumeration order.
    pub fn find<F>(&self, mut predicate: F) -> Vec<&Value>
    where
        F: FnMut(&Value, &Key) -> bool,
    {
        self.entries
            .iter()
            .filter(|&(k, v)| predicate(v, k))
            .map(|(_, v)| v)
            .collect()
    }

    /// Every value whose property `name` strictly equals `value`.
    pub fn find_prop(&self, name: &str, value: &Value) -> Vec<&Value> {
        self.find(prop_eq(name, value.clone()))
    }

    /// Keys of the entries matching `predicate`, in enumeration order.
    pub fn filter<F>(&self, mut predicate: F) -> Vec<Key>
    where
        F: FnMut(&Value, &Key) -> bool,
    {
        self.entries
            .iter()
            .filter(|&(k, v)| predicate(v, k))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Start a value listing with optional selection and sorting.
    pub fn list(&self) -> ListQuery<'_> {
        ListQuery::new(&self.entries)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Remove every entry and persist the empty carrier.
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        tracing::debug!(name = %self.config.name, "carrier cleared");
        self.save()
    }

    /// Drop in-memory state and reload from the backend. Nothing is written.
    pub fn flush(&mut self) -> Result<()> {
        self.entries = load(&self.backend, &self.config.name)?;
        tracing::debug!(
            name = %self.config.name,
            entries = self.entries.len(),
            "carrier reloaded"
        );
        Ok(())
    }

    /// The carrier as compact JSON.
    pub fn to_json(&self) -> Result<String> {
        codec::encode(&self.entries)
    }

    /// The carrier as pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        codec::encode_pretty(&self.entries)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn timestamp_key(&self) -> Key {
        self.clock.timestamp_key(self.config.timestamp_unit)
    }

    fn member_key(&self, member: &Value) -> Key {
        Key::from_member(member).unwrap_or_else(|| self.timestamp_key())
    }

    fn reinsert(&mut self, key: Key, value: Value) {
        self.entries.remove(&key);
        self.entries.insert(key, value);
    }

    /// Apply the size limit, then write the carrier to the backend.
    ///
    /// If the write fails, memory is ahead of the backend until the next
    /// successful save or [`flush`](Self::flush).
    fn save(&mut self) -> Result<()> {
        self.evict();
        let blob = codec::encode(&self.entries)?;
        self.backend.set(&self.config.name, &blob)
    }

    /// Drop entries from the front until the carrier fits its limit.
    ///
    /// Index keys enumerate first, so they are evicted before any named key
    /// regardless of when they were inserted.
    fn evict(&mut self) {
        if !self.config.is_bounded() {
            return;
        }
        let excess = self.entries.len().saturating_sub(self.config.limit);
        if excess == 0 {
            return;
        }
        for _ in 0..excess {
            self.entries.pop_first();
        }
        tracing::debug!(
            name = %self.config.name,
            evicted = excess,
            limit = self.config.limit,
            "evicted oldest entries"
        );
    }
}

impl<B, C> fmt::Display for OrderedCarrier<B, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.entries, f)
    }
}

/// Read and decode a carrier blob. Corrupt blobs load as empty.
fn load<B: Backend>(backend: &B, name: &str) -> Result<Carrier> {
    let Some(blob) = backend.get(name)? else {
        return Ok(Carrier::new());
    };
    match codec::decode(&blob) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            tracing::warn!(
                name = %name,
                error = %e,
                "discarding undecodable carrier blob"
            );
            Ok(Carrier::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, ManualClock, MemoryBackend, TimestampUnit};
    use serde_json::json;
    use std::sync::Arc;

    const NOW_MS: u64 = 1_706_745_600_123;

    fn carrier(limit: usize) -> OrderedCarrier<MemoryBackend, ManualClock> {
        let config = CarrierConfig::new("test").with_limit(limit);
        OrderedCarrier::open_with_clock(MemoryBackend::new(), config, ManualClock::new(NOW_MS))
            .unwrap()
    }

    fn seconds_carrier() -> OrderedCarrier<MemoryBackend, ManualClock> {
        let config = CarrierConfig::new("test").with_timestamp_unit(TimestampUnit::Seconds);
        OrderedCarrier::open_with_clock(MemoryBackend::new(), config, ManualClock::new(NOW_MS))
            .unwrap()
    }

    fn texts(keys: &[Key]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn stored(c: &OrderedCarrier<MemoryBackend, ManualClock>) -> Option<String> {
        c.backend().get(c.name()).unwrap()
    }

    #[test]
    fn open_empty() {
        let c = carrier(0);
        assert!(c.is_empty());
        assert_eq!(c.name(), "test");
        assert_eq!(c.limit(), 0);
        assert_eq!(stored(&c), None);
    }

    #[test]
    fn set_get_persists() {
        let mut c = carrier(0);
        c.set("a", json!({"n": 1})).unwrap();

        assert_eq!(c.get("a"), Some(&json!({"n": 1})));
        assert_eq!(stored(&c), Some(r#"{"a":{"n":1}}"#.to_string()));
    }

    #[test]
    fn set_null_is_noop() {
        let mut c = carrier(0);
        c.set("a", Value::Null).unwrap();
        assert!(c.keys().is_empty());
        assert_eq!(stored(&c), None);

        assert_eq!(c.set_member(Value::Null).unwrap(), None);
        assert!(c.is_empty());
    }

    #[test]
    fn set_overwrite_keeps_position() {
        let mut c = carrier(0);
        c.set("a", 1).unwrap();
        c.set("b", 2).unwrap();
        c.set("a", 3).unwrap();

        assert_eq!(texts(&c.keys()), vec!["a", "b"]);
        assert_eq!(c.get("a"), Some(&json!(3)));
    }

    #[test]
    fn set_member_uses_k_field() {
        let mut c = carrier(0);
        let key = c.set_member(json!({"k": "user-1", "name": "Alice"})).unwrap();

        assert_eq!(key, Some(Key::parse("user-1")));
        // The member is stored unchanged
        assert_eq!(c.get("user-1"), Some(&json!({"k": "user-1", "name": "Alice"})));
        assert_eq!(c.get_member(&json!({"k": "user-1"})), c.get("user-1"));
    }

    #[test]
    fn set_member_without_k_gets_timestamp_key() {
        let mut c = carrier(0);
        let key = c.set_member(json!({"name": "Bob"})).unwrap().unwrap();

        assert_eq!(key, Key::Name(NOW_MS.to_string()));
        assert_eq!(c.get(key), Some(&json!({"name": "Bob"})));
        // No k field is written into the member
        assert!(c.get_first().unwrap().get("k").is_none());
    }

    #[test]
    fn get_member_without_k_finds_nothing() {
        let mut c = carrier(0);
        c.set("x", 1).unwrap();
        assert_eq!(c.get_member(&json!({"name": "x"})), None);
    }

    #[test]
    fn first_and_last() {
        let mut c = carrier(0);
        assert_eq!(c.get_first(), None);
        assert_eq!(c.get_last(), None);

        c.set("b", "named").unwrap();
        c.set(7u32, "index").unwrap();

        assert_eq!(c.get_first(), Some(&json!("index")));
        assert_eq!(c.get_last(), Some(&json!("named")));
    }

    #[test]
    fn remove_variants() {
        let mut c = carrier(0);
        for k in ["a", "b", "c", "d"] {
            c.set(k, k).unwrap();
        }

        c.remove("a").unwrap();
        c.remove("missing").unwrap();
        c.remove_member(&json!({"k": "b"})).unwrap();
        c.remove_member(&json!({"no": "key"})).unwrap();
        assert_eq!(texts(&c.keys()), vec!["c", "d"]);

        c.remove_many(["c", "d", "zzz"]).unwrap();
        assert!(c.is_empty());
        assert_eq!(stored(&c), Some("{}".to_string()));
    }

    #[test]
    fn remove_first_and_last_clamp() {
        let mut c = carrier(0);
        for k in ["a", "b", "c", "d", "e"] {
            c.set(k, 0).unwrap();
        }

        c.remove_first(2).unwrap();
        assert_eq!(texts(&c.keys()), vec!["c", "d", "e"]);

        c.remove_last(1).unwrap();
        assert_eq!(texts(&c.keys()), vec!["c", "d"]);

        c.remove_last(10).unwrap();
        assert!(c.is_empty());
    }

    #[test]
    fn remove_zero_counts_as_one() {
        let mut c = carrier(0);
        for k in ["a", "b", "c"] {
            c.set(k, 0).unwrap();
        }

        c.remove_first(0).unwrap();
        assert_eq!(texts(&c.keys()), vec!["b", "c"]);

        c.remove_last(0).unwrap();
        assert_eq!(texts(&c.keys()), vec!["b"]);
        assert_eq!(stored(&c).as_deref(), Some(r#"{"b":0}"#));

        // Nothing left to drop is still fine
        c.remove_first(0).unwrap();
        c.remove_first(0).unwrap();
        assert!(c.is_empty());
    }

    #[test]
    fn push_moves_named_key_to_back() {
        let mut c = carrier(0);
        c.push("a", 1).unwrap();
        c.push("b", 2).unwrap();
        c.push("a", 3).unwrap();

        assert_eq!(texts(&c.keys()), vec!["b", "a"]);
        assert_eq!(c.get("a"), Some(&json!(3)));
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn push_index_key_does_not_land_last() {
        let mut c = carrier(0);
        c.push("name", 1).unwrap();
        c.push(5u32, 2).unwrap();

        assert_eq!(texts(&c.keys()), vec!["5", "name"]);
        assert_eq!(c.pop().unwrap(), Some(json!(1)));
    }

    #[test]
    fn pop_and_shift() {
        let mut c = carrier(0);
        assert_eq!(c.pop().unwrap(), None);
        assert_eq!(c.shift().unwrap(), None);

        c.push("a", 1).unwrap();
        c.push("b", 2).unwrap();
        c.push("c", 3).unwrap();

        assert_eq!(c.shift().unwrap(), Some(json!(1)));
        assert_eq!(c.pop().unwrap(), Some(json!(3)));
        assert_eq!(texts(&c.keys()), vec!["b"]);
        assert_eq!(stored(&c), Some(r#"{"b":2}"#.to_string()));
    }

    #[test]
    fn pop_on_empty_does_not_persist() {
        let mut c = carrier(0);
        assert_eq!(c.pop().unwrap(), None);
        assert_eq!(stored(&c), None);
    }

    #[test]
    fn unshift_member_steps_below_first_index_key() {
        let mut c = seconds_carrier();
        c.set(100u32, "first").unwrap();

        let key = c.unshift_member(json!("front")).unwrap().unwrap();

        assert_eq!(key, Key::Index(99));
        assert_eq!(c.get_first(), Some(&json!("front")));
    }

    #[test]
    fn unshift_member_on_empty_uses_timestamp() {
        let mut c = seconds_carrier();
        let key = c.unshift_member(json!("only")).unwrap().unwrap();
        assert_eq!(key, Key::Index((NOW_MS / 1000) as u32));
    }

    #[test]
    fn unshift_member_below_zero_lands_among_names() {
        let mut c = carrier(0);
        c.set(0u32, "zero").unwrap();
        c.set("tail", "named").unwrap();

        let key = c.unshift_member(json!("minus one")).unwrap().unwrap();

        assert_eq!(key, Key::Name("-1".into()));
        assert_eq!(texts(&c.keys()), vec!["0", "tail", "-1"]);
    }

    #[test]
    fn unshift_member_after_named_first_key_falls_back_to_timestamp() {
        let mut c = carrier(0);
        c.set("alpha", 1).unwrap();

        let key = c.unshift_member(json!(2)).unwrap().unwrap();

        assert_eq!(key, Key::Name(NOW_MS.to_string()));
    }

    #[test]
    fn unshift_member_with_k() {
        let mut c = carrier(0);
        c.set(10u32, "ten").unwrap();
        let key = c.unshift_member(json!({"k": 3})).unwrap();
        assert_eq!(key, Some(Key::Index(3)));
        assert_eq!(texts(&c.keys()), vec!["3", "10"]);
    }

    #[test]
    fn unshift_keyed_replaces_existing() {
        let mut c = carrier(0);
        c.set(1u32, "old").unwrap();
        c.set(2u32, "two").unwrap();
        c.unshift(1u32, "new").unwrap();

        assert_eq!(c.len(), 2);
        assert_eq!(c.get_first(), Some(&json!("new")));
    }

    #[test]
    fn sort_and_reverse_do_not_mutate() {
        let mut c = carrier(0);
        c.set("b", 1).unwrap();
        c.set("10", 2).unwrap();
        c.set("a", 3).unwrap();
        c.set("9", 4).unwrap();

        assert_eq!(texts(&c.keys()), vec!["9", "10", "b", "a"]);
        // Text ordering: "10" < "9"
        assert_eq!(texts(&c.sort()), vec!["10", "9", "a", "b"]);
        assert_eq!(texts(&c.reverse()), vec!["a", "b", "10", "9"]);

        let by_len = c.sort_by(|x, y| {
            x.to_string()
                .len()
                .cmp(&y.to_string().len())
                .then_with(|| y.to_string().cmp(&x.to_string()))
        });
        assert_eq!(texts(&by_len), vec!["b", "a", "9", "10"]);

        assert_eq!(texts(&c.keys()), vec!["9", "10", "b", "a"]);
    }

    #[test]
    fn search_by_predicate_and_prop() {
        let mut c = carrier(0);
        c.set("1", json!({"role": "admin", "name": "a"})).unwrap();
        c.set("x", json!({"role": "user", "name": "b"})).unwrap();
        c.set("y", json!({"role": "admin", "name": "c"})).unwrap();
        c.set("z", json!(42)).unwrap();

        assert!(c.has_prop("role", &json!("admin")));
        assert!(!c.has_prop("role", &json!("root")));
        assert!(c.has(|v, _| v == &json!(42)));

        assert_eq!(
            c.lookup_prop("role", &json!("admin")),
            Some(&json!({"role": "admin", "name": "a"}))
        );
        assert_eq!(c.lookup(|_, k| k == &Key::parse("missing")), None);

        let admins = c.find_prop("role", &json!("admin"));
        assert_eq!(admins.len(), 2);
        assert_eq!(admins[1]["name"], "c");

        let by_pred = c.find(|v, _| v.get("role") == Some(&json!("admin")));
        assert_eq!(admins, by_pred);

        assert_eq!(texts(&c.filter(|v, _| v.is_object())), vec!["1", "x", "y"]);
    }

    #[test]
    fn search_by_string_and_array_length() {
        let mut c = carrier(0);
        c.set("word", json!("abc")).unwrap();
        c.set("list", json!([1, 2, 3])).unwrap();
        c.set("long", json!("abcd")).unwrap();
        c.set("num", json!(3)).unwrap();

        assert_eq!(
            c.find_prop("length", &json!(3)),
            vec![&json!("abc"), &json!([1, 2, 3])]
        );
        assert_eq!(c.lookup_prop("0", &json!("a")), Some(&json!("abc")));
        assert!(!c.has_prop("length", &json!(5)));
    }

    #[test]
    fn has_short_circuits() {
        let mut c = carrier(0);
        for k in ["a", "b", "c"] {
            c.set(k, 1).unwrap();
        }
        let mut calls = 0;
        assert!(c.has(|_, _| {
            calls += 1;
            true
        }));
        assert_eq!(calls, 1);
    }

    #[test]
    fn list_select_and_sort() {
        let mut c = carrier(0);
        c.set("a", json!({"score": 5})).unwrap();
        c.set("b", json!({"score": 1})).unwrap();
        c.set("c", json!({"score": 9})).unwrap();

        let top = c
            .list()
            .select(|v, _| v["score"].as_i64().unwrap_or(0) > 2)
            .sort_by(|a, b| b["score"].as_i64().cmp(&a["score"].as_i64()))
            .values();
        assert_eq!(top, vec![&json!({"score": 9}), &json!({"score": 5})]);

        assert_eq!(c.list().values().len(), 3);
        assert_eq!(texts(&c.keys()), vec!["a", "b", "c"]);
    }

    #[test]
    fn for_each_visits_in_order_with_carrier() {
        let mut c = carrier(0);
        c.set("b", 1).unwrap();
        c.set("0", 2).unwrap();

        let mut seen = Vec::new();
        c.for_each(|v, k, all| {
            assert_eq!(all.len(), 2);
            seen.push((k.to_string(), v.clone()));
        });
        assert_eq!(
            seen,
            vec![("0".to_string(), json!(2)), ("b".to_string(), json!(1))]
        );
    }

    #[test]
    fn limit_evicts_from_front() {
        let mut c = carrier(2);
        c.set("a", 1).unwrap();
        c.set("b", 2).unwrap();
        c.set("c", 3).unwrap();

        assert_eq!(texts(&c.keys()), vec!["b", "c"]);
        assert_eq!(c.get("a"), None);
        assert_eq!(stored(&c), Some(r#"{"b":2,"c":3}"#.to_string()));
    }

    #[test]
    fn limit_evicts_index_keys_before_names() {
        let mut c = carrier(2);
        c.set("old-name", 1).unwrap();
        c.set("newer-name", 2).unwrap();
        c.set(5u32, 3).unwrap();

        // The index key is the newest entry but enumerates first
        assert_eq!(texts(&c.keys()), vec!["old-name", "newer-name"]);
    }

    #[test]
    fn clear_persists_empty_object() {
        let mut c = carrier(0);
        c.set("a", 1).unwrap();
        c.clear().unwrap();

        assert!(c.keys().is_empty());
        assert_eq!(stored(&c), Some("{}".to_string()));
    }

    #[test]
    fn flush_reloads_external_writes() {
        let backend = Arc::new(MemoryBackend::new());
        let mut c = OrderedCarrier::new(Arc::clone(&backend), "shared", 0, false).unwrap();
        c.set("a", 1).unwrap();

        backend.set("shared", r#"{"z":26,"y":25}"#).unwrap();
        assert_eq!(c.get("a"), Some(&json!(1)));

        c.flush().unwrap();
        assert_eq!(c.get("a"), None);
        assert_eq!(texts(&c.keys()), vec!["z", "y"]);
    }

    #[test]
    fn corrupt_blob_loads_empty_and_is_replaced() {
        let backend = MemoryBackend::new();
        backend.set("broken", "{not json").unwrap();

        let mut c = OrderedCarrier::new(&backend, "broken", 0, false).unwrap();
        assert!(c.is_empty());

        c.set("a", 1).unwrap();
        assert_eq!(backend.get("broken").unwrap(), Some(r#"{"a":1}"#.to_string()));
    }

    #[test]
    fn quota_failure_propagates() {
        let backend = MemoryBackend::with_quota(12);
        let mut c = OrderedCarrier::new(&backend, "q", 0, false).unwrap();
        c.set("a", 1).unwrap();

        let err = c.set("b", "a long value").unwrap_err();
        assert!(matches!(err, Error::QuotaExceeded { .. }));

        // Memory is ahead of the backend until flushed
        assert_eq!(c.len(), 2);
        c.flush().unwrap();
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn display_and_json() {
        let mut c = carrier(0);
        c.set("b", json!([1])).unwrap();
        c.set("1", true).unwrap();

        assert_eq!(c.to_string(), r#"{"1":true,"b":[1]}"#);
        assert_eq!(c.to_json().unwrap(), c.to_string());
        assert!(c.to_json_pretty().unwrap().contains('\n'));
    }

    #[test]
    fn reopen_restores_order() {
        let backend = MemoryBackend::new();
        {
            let mut c = OrderedCarrier::new(&backend, "persist", 0, false).unwrap();
            c.push("m", 1).unwrap();
            c.push("a", 2).unwrap();
            c.push("3", 3).unwrap();
            c.push("m", 4).unwrap();
        }

        let c = OrderedCarrier::new(&backend, "persist", 0, false).unwrap();
        assert_eq!(texts(&c.keys()), vec!["3", "a", "m"]);
        assert_eq!(c.get("m"), Some(&json!(4)));
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Set(String, i64),
            SetName(String, i64),
            Push(String, i64),
            Unshift(String, i64),
            Remove(String),
            Pop,
            Shift,
        }

        fn arb_key() -> impl Strategy<Value = String> {
            prop_oneof![
                (0u32..20).prop_map(|n| n.to_string()),
                "[a-e]{1,2}",
                Just("007".to_string()),
                Just("-1".to_string()),
            ]
        }

        fn arb_op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (arb_key(), any::<i64>()).prop_map(|(k, v)| Op::Set(k, v)),
                (arb_key(), any::<i64>()).prop_map(|(k, v)| Op::SetName(k, v)),
                (arb_key(), any::<i64>()).prop_map(|(k, v)| Op::Push(k, v)),
                (arb_key(), any::<i64>()).prop_map(|(k, v)| Op::Unshift(k, v)),
                arb_key().prop_map(Op::Remove),
                Just(Op::Pop),
                Just(Op::Shift),
            ]
        }

        /// Reference model: index keys sorted, then names in first-insertion order.
        fn expected_order(model: &[(String, i64)]) -> Vec<String> {
            let mut indexes: Vec<u32> = model
                .iter()
                .filter_map(|(k, _)| Key::parse(k).as_index())
                .collect();
            indexes.sort_unstable();
            let mut order: Vec<String> = indexes.iter().map(|n| n.to_string()).collect();
            order.extend(
                model
                    .iter()
                    .filter(|(k, _)| !Key::parse(k).is_index())
                    .map(|(k, _)| k.clone()),
            );
            order
        }

        fn model_front(model: &[(String, i64)]) -> Option<String> {
            expected_order(model).first().cloned()
        }

        fn model_back(model: &[(String, i64)]) -> Option<String> {
            expected_order(model).last().cloned()
        }

        fn model_set(model: &mut Vec<(String, i64)>, key: String, value: i64) {
            match model.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => model.push((key, value)),
            }
        }

        fn model_remove(model: &mut Vec<(String, i64)>, key: &str) -> Option<i64> {
            let pos = model.iter().position(|(k, _)| k == key)?;
            Some(model.remove(pos).1)
        }

        proptest! {
            #[test]
            fn prop_enumeration_order_matches_model(ops in prop::collection::vec(arb_op(), 0..40)) {
                let mut c = carrier(0);
                let mut model: Vec<(String, i64)> = Vec::new();

                for op in ops {
                    match op {
                        Op::Set(k, v) => {
                            c.set(k.as_str(), v).unwrap();
                            model_set(&mut model, k, v);
                        }
                        Op::SetName(k, v) => {
                            // Hand-built names must land where the parsed key would
                            c.set(Key::Name(k.clone()), v).unwrap();
                            model_set(&mut model, k, v);
                        }
                        Op::Push(k, v) | Op::Unshift(k, v) => {
                            c.push(k.as_str(), v).unwrap();
                            model_remove(&mut model, &k);
                            model.push((k, v));
                        }
                        Op::Remove(k) => {
                            c.remove(k.as_str()).unwrap();
                            model_remove(&mut model, &k);
                        }
                        Op::Pop => {
                            let expected = model_back(&model)
                                .and_then(|k| model_remove(&mut model, &k));
                            prop_assert_eq!(c.pop().unwrap(), expected.map(Value::from));
                        }
                        Op::Shift => {
                            let expected = model_front(&model)
                                .and_then(|k| model_remove(&mut model, &k));
                            prop_assert_eq!(c.shift().unwrap(), expected.map(Value::from));
                        }
                    }

                    prop_assert_eq!(texts(&c.keys()), expected_order(&model));
                }

                // The persisted blob reloads to the same order
                let reloaded = codec::decode(&stored(&c).unwrap_or_else(|| "{}".into())).unwrap();
                prop_assert_eq!(&reloaded, c.value());
            }

            #[test]
            fn prop_limit_is_never_exceeded(limit in 1usize..6, keys in prop::collection::vec(arb_key(), 1..30)) {
                let mut c = carrier(limit);
                for (i, k) in keys.iter().enumerate() {
                    c.set(k.as_str(), i as i64).unwrap();
                    prop_assert!(c.len() <= limit);
                }
            }

            #[test]
            fn prop_named_keys_evict_oldest(limit in 1usize..6, count in 1usize..20) {
                let mut c = carrier(limit);
                for i in 0..count {
                    c.set(format!("k{}", i), i as i64).unwrap();
                }

                let expected: Vec<String> = (count.saturating_sub(limit)..count)
                    .map(|i| format!("k{}", i))
                    .collect();
                prop_assert_eq!(texts(&c.keys()), expected);
            }
        }
    }
}
