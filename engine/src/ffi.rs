//! FFI layer for host runtimes.
//!
//! This module provides C-compatible functions over a directory-backed
//! carrier. All values cross the boundary as JSON strings; keys cross as
//! plain strings.
//!
//! # Memory Management
//!
//! - Strings returned by `carrier_*` functions are allocated by Rust
//! - Caller must free them with `carrier_string_free`
//! - Carrier pointers must be freed with `carrier_free`
//!
//! # Error Handling
//!
//! Functions return JSON with either:
//! - `{"ok": <result>}` on success
//! - `{"error": "<message>"}` on failure

use crate::{CarrierConfig, FileBackend, Key, OrderedCarrier};
use serde_json::Value;
use std::ffi::{c_char, CStr, CString};
use std::ptr;

/// Carrier type handed out across the C boundary.
pub type FfiCarrier = OrderedCarrier<FileBackend>;

/// Result wrapper for FFI responses.
#[derive(serde::Serialize)]
#[serde(untagged)]
enum FfiResult<T: serde::Serialize> {
    Ok { ok: T },
    Err { error: String },
}

impl<T: serde::Serialize> FfiResult<T> {
    fn ok(value: T) -> Self {
        FfiResult::Ok { ok: value }
    }

    fn err(message: impl Into<String>) -> Self {
        FfiResult::Err {
            error: message.into(),
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization failed: {}"}}"#, e))
    }
}

/// Convert a Rust string to a C string pointer.
/// Caller must free with `carrier_string_free`.
fn to_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => CString::new(r#"{"error":"string contained null bytes"}"#)
            .map(CString::into_raw)
            .unwrap_or(ptr::null_mut()),
    }
}

/// Convert a C string pointer to a Rust string.
/// Returns None if pointer is null or invalid UTF-8.
unsafe fn from_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

fn error_string(message: impl Into<String>) -> *mut c_char {
    to_c_string(FfiResult::<()>::err(message).to_json())
}

fn respond<T: serde::Serialize>(result: crate::error::Result<T>) -> *mut c_char {
    match result {
        Ok(value) => to_c_string(FfiResult::ok(value).to_json()),
        Err(e) => error_string(e.to_string()),
    }
}

unsafe fn parse_json(ptr: *const c_char, what: &str) -> Result<Value, *mut c_char> {
    let text = from_c_string(ptr).ok_or_else(|| error_string(format!("invalid {}", what)))?;
    serde_json::from_str(&text).map_err(|e| error_string(format!("parse error: {}", e)))
}

unsafe fn parse_key(ptr: *const c_char) -> Result<Key, *mut c_char> {
    from_c_string(ptr)
        .map(Key::from)
        .ok_or_else(|| error_string("invalid key"))
}

// ============================================================================
// Carrier Lifecycle
// ============================================================================

/// Open a carrier stored under `data_dir`.
///
/// # Arguments
/// - `data_dir`: Directory holding carrier files (created if missing)
/// - `name`: Carrier name
/// - `limit`: Maximum entry count, 0 for unlimited
/// - `based_on_second`: non-zero for second timestamp keys
///
/// # Returns
/// Pointer to the carrier, or null on failure.
///
/// # Safety
/// - `data_dir` and `name` must be valid null-terminated C strings or null
/// - Caller must free the returned pointer with `carrier_free`
#[no_mangle]
pub unsafe extern "C" fn carrier_open(
    data_dir: *const c_char,
    name: *const c_char,
    limit: u64,
    based_on_second: i32,
) -> *mut FfiCarrier {
    let (dir, name) = match (from_c_string(data_dir), from_c_string(name)) {
        (Some(dir), Some(name)) => (dir, name),
        _ => return ptr::null_mut(),
    };

    let backend = match FileBackend::open(dir) {
        Ok(b) => b,
        Err(_) => return ptr::null_mut(),
    };

    let config = CarrierConfig::new(name)
        .with_limit(limit as usize)
        .based_on_second(based_on_second != 0);

    match OrderedCarrier::open(backend, config) {
        Ok(carrier) => Box::into_raw(Box::new(carrier)),
        Err(_) => ptr::null_mut(),
    }
}

/// Free a carrier.
///
/// # Safety
/// - `carrier` must be a valid pointer from `carrier_open`
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn carrier_free(carrier: *mut FfiCarrier) {
    if !carrier.is_null() {
        drop(Box::from_raw(carrier));
    }
}

/// Free a string allocated by the engine.
///
/// # Safety
/// - `s` must be a valid pointer from a `carrier_*` function
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn carrier_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Map Operations
// ============================================================================

/// Set `key` to the JSON value `value_json`.
///
/// # Returns
/// JSON string: `{"ok": null}` or `{"error": "message"}`
///
/// # Safety
/// - `carrier` must be a valid pointer from `carrier_open` or null
/// - `key` and `value_json` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `carrier_string_free`
#[no_mangle]
pub unsafe extern "C" fn carrier_set(
    carrier: *mut FfiCarrier,
    key: *const c_char,
    value_json: *const c_char,
) -> *mut c_char {
    let carrier = match carrier.as_mut() {
        Some(c) => c,
        None => return error_string("null carrier pointer"),
    };
    let key = match parse_key(key) {
        Ok(k) => k,
        Err(e) => return e,
    };
    let value = match parse_json(value_json, "value JSON") {
        Ok(v) => v,
        Err(e) => return e,
    };

    respond(carrier.set(key, value))
}

/// Store a member object under its `k` field or a timestamp key.
///
/// # Returns
/// JSON string: `{"ok": "<key>"}`, `{"ok": null}` for a null member, or
/// `{"error": "message"}`
///
/// # Safety
/// - `carrier` must be a valid pointer from `carrier_open` or null
/// - `member_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `carrier_string_free`
#[no_mangle]
pub unsafe extern "C" fn carrier_set_member(
    carrier: *mut FfiCarrier,
    member_json: *const c_char,
) -> *mut c_char {
    let carrier = match carrier.as_mut() {
        Some(c) => c,
        None => return error_string("null carrier pointer"),
    };
    let member = match parse_json(member_json, "member JSON") {
        Ok(v) => v,
        Err(e) => return e,
    };

    respond(carrier.set_member(member))
}

/// Get the value at `key`.
///
/// # Returns
/// JSON string: `{"ok": <value>}`, `{"ok": null}` when absent, or
/// `{"error": "message"}`
///
/// # Safety
/// - `carrier` must be a valid pointer from `carrier_open` or null
/// - `key` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `carrier_string_free`
#[no_mangle]
pub unsafe extern "C" fn carrier_get(carrier: *const FfiCarrier, key: *const c_char) -> *mut c_char {
    let carrier = match carrier.as_ref() {
        Some(c) => c,
        None => return error_string("null carrier pointer"),
    };
    let key = match parse_key(key) {
        Ok(k) => k,
        Err(e) => return e,
    };

    to_c_string(FfiResult::ok(carrier.get(key)).to_json())
}

/// Remove the keys listed in the JSON array `keys_json`.
///
/// # Safety
/// - `carrier` must be a valid pointer from `carrier_open` or null
/// - `keys_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `carrier_string_free`
#[no_mangle]
pub unsafe extern "C" fn carrier_remove(
    carrier: *mut FfiCarrier,
    keys_json: *const c_char,
) -> *mut c_char {
    let carrier = match carrier.as_mut() {
        Some(c) => c,
        None => return error_string("null carrier pointer"),
    };
    let keys_str = match from_c_string(keys_json) {
        Some(s) => s,
        None => return error_string("invalid keys JSON"),
    };
    let keys: Vec<Key> = match serde_json::from_str(&keys_str) {
        Ok(keys) => keys,
        Err(e) => return error_string(format!("parse error: {}", e)),
    };

    respond(carrier.remove_many(keys))
}

// ============================================================================
// Queue Operations
// ============================================================================

/// Delete then insert `key`, moving it to the back.
///
/// # Safety
/// - `carrier` must be a valid pointer from `carrier_open` or null
/// - `key` and `value_json` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `carrier_string_free`
#[no_mangle]
pub unsafe extern "C" fn carrier_push(
    carrier: *mut FfiCarrier,
    key: *const c_char,
    value_json: *const c_char,
) -> *mut c_char {
    let carrier = match carrier.as_mut() {
        Some(c) => c,
        None => return error_string("null carrier pointer"),
    };
    let key = match parse_key(key) {
        Ok(k) => k,
        Err(e) => return e,
    };
    let value = match parse_json(value_json, "value JSON") {
        Ok(v) => v,
        Err(e) => return e,
    };

    respond(carrier.push(key, value))
}

/// Insert a member intended to become the first entry.
///
/// With a null `key` the key is derived from the member (see
/// `OrderedCarrier::unshift_member`).
///
/// # Returns
/// JSON string: `{"ok": "<key>"}`, `{"ok": null}` when the value is null
/// and nothing was stored, or `{"error": "message"}`
///
/// # Safety
/// - `carrier` must be a valid pointer from `carrier_open` or null
/// - `key` must be a valid null-terminated C string or null
/// - `value_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `carrier_string_free`
#[no_mangle]
pub unsafe extern "C" fn carrier_unshift(
    carrier: *mut FfiCarrier,
    key: *const c_char,
    value_json: *const c_char,
) -> *mut c_char {
    let carrier = match carrier.as_mut() {
        Some(c) => c,
        None => return error_string("null carrier pointer"),
    };
    let value = match parse_json(value_json, "value JSON") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match from_c_string(key) {
        Some(_) if value.is_null() => respond::<Option<Key>>(Ok(None)),
        Some(text) => {
            let key = Key::from(text);
            respond(carrier.unshift(key.clone(), value).map(|()| Some(key)))
        }
        None => respond(carrier.unshift_member(value)),
    }
}

/// Remove and return the last value.
///
/// # Returns
/// JSON string: `{"ok": <value>}`, `{"ok": null}` when empty, or
/// `{"error": "message"}`
///
/// # Safety
/// - `carrier` must be a valid pointer from `carrier_open` or null
/// - Caller must free the returned string with `carrier_string_free`
#[no_mangle]
pub unsafe extern "C" fn carrier_pop(carrier: *mut FfiCarrier) -> *mut c_char {
    match carrier.as_mut() {
        Some(c) => respond(c.pop()),
        None => error_string("null carrier pointer"),
    }
}

/// Remove and return the first value.
///
/// # Safety
/// - `carrier` must be a valid pointer from `carrier_open` or null
/// - Caller must free the returned string with `carrier_string_free`
#[no_mangle]
pub unsafe extern "C" fn carrier_shift(carrier: *mut FfiCarrier) -> *mut c_char {
    match carrier.as_mut() {
        Some(c) => respond(c.shift()),
        None => error_string("null carrier pointer"),
    }
}

// ============================================================================
// Enumeration and Search
// ============================================================================

/// List keys in enumeration order.
///
/// # Returns
/// JSON string: `{"ok": ["key", ...]}` or `{"error": "message"}`
///
/// # Safety
/// - `carrier` must be a valid pointer from `carrier_open` or null
/// - Caller must free the returned string with `carrier_string_free`
#[no_mangle]
pub unsafe extern "C" fn carrier_keys(carrier: *const FfiCarrier) -> *mut c_char {
    match carrier.as_ref() {
        Some(c) => to_c_string(FfiResult::ok(c.keys()).to_json()),
        None => error_string("null carrier pointer"),
    }
}

/// Find values whose property `prop` strictly equals `value_json`.
///
/// # Returns
/// JSON string: `{"ok": [<value>, ...]}` or `{"error": "message"}`
///
/// # Safety
/// - `carrier` must be a valid pointer from `carrier_open` or null
/// - `prop` and `value_json` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `carrier_string_free`
#[no_mangle]
pub unsafe extern "C" fn carrier_find(
    carrier: *const FfiCarrier,
    prop: *const c_char,
    value_json: *const c_char,
) -> *mut c_char {
    let carrier = match carrier.as_ref() {
        Some(c) => c,
        None => return error_string("null carrier pointer"),
    };
    let prop = match from_c_string(prop) {
        Some(p) => p,
        None => return error_string("invalid property name"),
    };
    let value = match parse_json(value_json, "value JSON") {
        Ok(v) => v,
        Err(e) => return e,
    };

    to_c_string(FfiResult::ok(carrier.find_prop(&prop, &value)).to_json())
}

/// Get the entry count.
///
/// # Safety
/// - `carrier` must be a valid pointer from `carrier_open` or null
#[no_mangle]
pub unsafe extern "C" fn carrier_len(carrier: *const FfiCarrier) -> i64 {
    match carrier.as_ref() {
        Some(c) => c.len() as i64,
        None => -1,
    }
}

/// Export the whole carrier.
///
/// # Returns
/// JSON string: `{"ok": {<key>: <value>, ...}}` or `{"error": "message"}`
///
/// # Safety
/// - `carrier` must be a valid pointer from `carrier_open` or null
/// - Caller must free the returned string with `carrier_string_free`
#[no_mangle]
pub unsafe extern "C" fn carrier_to_json(carrier: *const FfiCarrier) -> *mut c_char {
    match carrier.as_ref() {
        Some(c) => to_c_string(FfiResult::ok(c.value()).to_json()),
        None => error_string("null carrier pointer"),
    }
}

// ============================================================================
// Lifecycle Operations
// ============================================================================

/// Remove every entry.
///
/// # Safety
/// - `carrier` must be a valid pointer from `carrier_open` or null
/// - Caller must free the returned string with `carrier_string_free`
#[no_mangle]
pub unsafe extern "C" fn carrier_clear(carrier: *mut FfiCarrier) -> *mut c_char {
    match carrier.as_mut() {
        Some(c) => respond(c.clear()),
        None => error_string("null carrier pointer"),
    }
}

/// Reload the carrier from disk, discarding in-memory state.
///
/// # Safety
/// - `carrier` must be a valid pointer from `carrier_open` or null
/// - Caller must free the returned string with `carrier_string_free`
#[no_mangle]
pub unsafe extern "C" fn carrier_flush(carrier: *mut FfiCarrier) -> *mut c_char {
    match carrier.as_mut() {
        Some(c) => respond(c.flush()),
        None => error_string("null carrier pointer"),
    }
}

// ============================================================================
// Utility
// ============================================================================

/// Get the engine version.
///
/// # Returns
/// Static string pointer (do not free)
#[no_mangle]
pub extern "C" fn carrier_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
