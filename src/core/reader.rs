//! Configuration document readers
//!
//! Readers turn a configuration document into the flat key→string map the
//! engine consumes, keyed by file extension. Properties and JSON readers
//! ship built in; richer formats plug in through [`register_reader`].

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;

use super::error::{LogError, Result};

/// Converts a document into a flat key→string map.
pub type Reader = fn(&[u8]) -> Result<HashMap<String, String>>;

static READERS: Lazy<RwLock<HashMap<String, Reader>>> = Lazy::new(|| {
    let mut m: HashMap<String, Reader> = HashMap::new();
    m.insert(".properties".to_string(), read_properties);
    m.insert(".json".to_string(), read_json);
    RwLock::new(m)
});

/// Register a reader for one or more file extensions (with leading dot).
pub fn register_reader(r: Reader, exts: &[&str]) {
    let mut readers = READERS.write();
    for ext in exts {
        readers.insert(ext.to_string(), r);
    }
}

pub(crate) fn read_config(data: &[u8], ext: &str) -> Result<HashMap<String, String>> {
    let reader = READERS
        .read()
        .get(ext)
        .copied()
        .ok_or_else(|| LogError::config(format!("unsupported file type {ext}")))?;
    reader(data)
}

/// Parse line-oriented `key=value` properties. Blank lines and lines
/// starting with `#` or `!` are skipped.
pub fn read_properties(data: &[u8]) -> Result<HashMap<String, String>> {
    let text = std::str::from_utf8(data)
        .map_err(|_| LogError::config("properties file is not valid UTF-8"))?;
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(LogError::config(format!("invalid property line: {line:?}")));
        };
        map.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(map)
}

/// Parse a JSON document and flatten nested objects with dotted keys and
/// arrays with `[i]` suffixes.
pub fn read_json(data: &[u8]) -> Result<HashMap<String, String>> {
    let value: JsonValue = serde_json::from_slice(data)?;
    if !value.is_object() {
        return Err(LogError::config("JSON configuration must be an object"));
    }
    let mut map = HashMap::new();
    flatten(String::new(), &value, &mut map);
    Ok(map)
}

fn flatten(prefix: String, value: &JsonValue, out: &mut HashMap<String, String>) {
    match value {
        JsonValue::Object(obj) => {
            for (k, v) in obj {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten(key, v, out);
            }
        }
        JsonValue::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten(format!("{prefix}[{i}]"), v, out);
            }
        }
        JsonValue::String(s) => {
            out.insert(prefix, s.clone());
        }
        JsonValue::Null => {
            out.insert(prefix, String::new());
        }
        other => {
            out.insert(prefix, other.to_string());
        }
    }
}
