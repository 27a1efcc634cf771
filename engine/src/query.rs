//! Search helpers.
//!
//! Every search on a carrier is driven by a predicate over `(value, key)`.
//! [`prop_eq`] builds the common "property equals value" predicate so
//! callers never have to choose between a closure and a property name at
//! runtime.

use crate::{Carrier, Key};
use serde_json::{Number, Value};
use std::borrow::Cow;
use std::cmp::Ordering;

/// Look up a property of a stored value.
///
/// Objects resolve fields by name; arrays resolve index-key names to
/// elements. Arrays and strings also expose `length`, and strings resolve
/// index keys to single UTF-16 code units (a lone surrogate reads as
/// U+FFFD). Other scalars have no properties.
pub fn prop<'v>(value: &'v Value, name: &str) -> Option<Cow<'v, Value>> {
    match value {
        Value::Object(map) => map.get(name).map(Cow::Borrowed),
        Value::Array(items) if name == "length" => Some(Cow::Owned(Value::from(items.len()))),
        Value::Array(items) => Key::parse(name)
            .as_index()
            .and_then(|i| items.get(i as usize))
            .map(Cow::Borrowed),
        Value::String(text) if name == "length" => {
            Some(Cow::Owned(Value::from(text.encode_utf16().count())))
        }
        Value::String(text) => {
            let index = Key::parse(name).as_index()?;
            let unit = text.encode_utf16().nth(index as usize)?;
            Some(Cow::Owned(Value::String(String::from_utf16_lossy(&[unit]))))
        }
        _ => None,
    }
}

/// Strict equality between JSON values.
///
/// Numbers compare by numeric value (`1 == 1.0`); arrays and objects
/// compare element-wise.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_eq(x, y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| strict_eq(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).map_or(false, |w| strict_eq(v, w)))
        }
        _ => a == b,
    }
}

fn numbers_eq(x: &Number, y: &Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    x.as_f64() == y.as_f64()
}

/// Predicate matching values whose property `name` strictly equals
/// `expected`. A missing property never matches.
pub fn prop_eq(name: impl Into<String>, expected: Value) -> impl Fn(&Value, &Key) -> bool {
    let name = name.into();
    move |value: &Value, _key: &Key| {
        prop(value, &name).map_or(false, |actual| strict_eq(&actual, &expected))
    }
}

type SelectFn<'a> = Box<dyn Fn(&Value, &Key) -> bool + 'a>;
type CompareFn<'a> = Box<dyn Fn(&Value, &Value) -> Ordering + 'a>;

/// Builder for listing carrier values.
///
/// Selection runs in enumeration order; the optional comparator then
/// sorts the selected values (stable). The carrier itself is never
/// reordered.
pub struct ListQuery<'a> {
    carrier: &'a Carrier,
    select: Option<SelectFn<'a>>,
    compare: Option<CompareFn<'a>>,
}

impl<'a> ListQuery<'a> {
    /// Start a query over every entry.
    pub fn new(carrier: &'a Carrier) -> Self {
        Self {
            carrier,
            select: None,
            compare: None,
        }
    }

    /// Keep only entries matching `predicate`.
    pub fn select<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value, &Key) -> bool + 'a,
    {
        self.select = Some(Box::new(predicate));
        self
    }

    /// Sort the selected values with `compare`.
    pub fn sort_by<F>(mut self, compare: F) -> Self
    where
        F: Fn(&Value, &Value) -> Ordering + 'a,
    {
        self.compare = Some(Box::new(compare));
        self
    }

    /// Selected `(key, value)` pairs, sorted by value when a comparator is set.
    pub fn entries(self) -> Vec<(&'a Key, &'a Value)> {
        let mut entries: Vec<(&'a Key, &'a Value)> = match &self.select {
            Some(select) => self.carrier.iter().filter(|&(k, v)| select(v, k)).collect(),
            None => self.carrier.iter().collect(),
        };
        if let Some(compare) = &self.compare {
            entries.sort_by(|a, b| compare(a.1, b.1));
        }
        entries
    }

    /// Selected values.
    pub fn values(self) -> Vec<&'a Value> {
        self.entries().into_iter().map(|(_, v)| v).collect()
    }

    /// Number of selected entries.
    pub fn count(self) -> usize {
        match &self.select {
            Some(select) => self.carrier.iter().filter(|&(k, v)| select(v, k)).count(),
            None => self.carrier.len(),
        }
    }
}
