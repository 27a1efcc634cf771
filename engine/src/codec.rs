//! JSON codec for carriers.
//!
//! A carrier is persisted as a bare JSON object: no envelope, no version
//! field, no checksum. Entries are written in enumeration order and read
//! back in document order, so named keys keep their insertion order across
//! a save/load cycle even though JSON objects are unordered in general.

use crate::{error::Result, Carrier, Error, Key};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

impl Serialize for Carrier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct CarrierVisitor;

impl<'de> Visitor<'de> for CarrierVisitor {
    type Value = Carrier;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object of carrier entries")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Carrier, A::Error> {
        let mut carrier = Carrier::new();
        // Duplicate keys keep the first slot and the last value.
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            carrier.insert(Key::from(key), value);
        }
        Ok(carrier)
    }
}

impl<'de> Deserialize<'de> for Carrier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(CarrierVisitor)
    }
}

/// Serialize a carrier to compact JSON.
pub fn encode(carrier: &Carrier) -> Result<String> {
    serde_json::to_string(carrier).map_err(|e| Error::Codec(e.to_string()))
}

/// Serialize a carrier to pretty JSON.
pub fn encode_pretty(carrier: &Carrier) -> Result<String> {
    serde_json::to_string_pretty(carrier).map_err(|e| Error::Codec(e.to_string()))
}

/// Deserialize a carrier from JSON. The document must be an object.
pub fn decode(blob: &str) -> Result<Carrier> {
    serde_json::from_str(blob).map_err(|e| Error::Codec(e.to_string()))
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = encode(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encodes_in_enumeration_order() {
        let carrier: Carrier = vec![
            ("zeta", json!(1)),
            ("7", json!(2)),
            ("alpha", json!(3)),
            ("0", json!(4)),
        ]
        .into_iter()
        .collect();

        let blob = encode(&carrier).unwrap();
        assert_eq!(blob, r#"{"0":4,"7":2,"zeta":1,"alpha":3}"#);
    }

    #[test]
    fn decode_preserves_document_order() {
        let carrier = decode(r#"{"b":1,"3":"x","a":{"k":"a"}}"#).unwrap();

        let keys: Vec<String> = carrier.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["3", "b", "a"]);
        assert_eq!(carrier.get(&Key::parse("a")), Some(&json!({"k": "a"})));
    }

    #[test]
    fn decode_duplicate_keys_keep_first_slot() {
        let carrier = decode(r#"{"a":1,"b":2,"a":3}"#).unwrap();

        let keys: Vec<String> = carrier.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(carrier.get(&Key::parse("a")), Some(&json!(3)));
    }

    #[test]
    fn decode_keeps_stored_nulls() {
        let carrier = decode(r#"{"a":null}"#).unwrap();
        assert_eq!(carrier.get(&Key::parse("a")), Some(&Value::Null));
    }

    #[test]
    fn decode_rejects_non_objects() {
        for blob in ["[1,2]", "\"text\"", "null", "{not json", ""] {
            assert!(matches!(decode(blob), Err(Error::Codec(_))), "{:?}", blob);
        }
    }

    #[test]
    fn empty_carrier_is_empty_object() {
        assert_eq!(encode(&Carrier::new()).unwrap(), "{}");
        assert!(decode("{}").unwrap().is_empty());
    }

    #[test]
    fn display_matches_encode() {
        let carrier: Carrier = vec![("a", json!([1, 2]))].into_iter().collect();
        assert_eq!(carrier.to_string(), r#"{"a":[1,2]}"#);
    }

    #[test]
    fn pretty_output_decodes_back() {
        let carrier: Carrier = vec![("b", json!(1)), ("a", json!(2))].into_iter().collect();
        let pretty = encode_pretty(&carrier).unwrap();
        assert!(pretty.contains('\n'));
        assert_eq!(decode(&pretty).unwrap(), carrier);
    }
}
