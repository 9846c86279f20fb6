//! Structured field encoders
//!
//! Two encoders share one escaping discipline: `JsonEncoder` produces
//! standard JSON, `TextEncoder` produces `key=value` pairs joined by a
//! separator, delegating nested objects and arrays to an embedded JSON
//! state so they serialize as JSON literals.

use std::fmt::Write as _;

use serde_json::Value as JsonValue;

/// Capability set implemented by structured logging encoders.
pub trait Encoder {
    fn append_encoder_begin(&mut self);
    fn append_encoder_end(&mut self);
    fn append_object_begin(&mut self);
    fn append_object_end(&mut self);
    fn append_array_begin(&mut self);
    fn append_array_end(&mut self);
    fn append_key(&mut self, key: &str);
    fn append_bool(&mut self, v: bool);
    fn append_int64(&mut self, v: i64);
    fn append_uint64(&mut self, v: u64);
    fn append_float64(&mut self, v: f64);
    fn append_string(&mut self, v: &str);
    /// A string payload that may not be valid UTF-8.
    fn append_string_bytes(&mut self, v: &[u8]);
    fn append_reflect(&mut self, v: &JsonValue);
}

/// The kind of the last token written, used to decide when a comma is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JsonToken {
    Unknown,
    ObjectBegin,
    ObjectEnd,
    ArrayBegin,
    ArrayEnd,
    Key,
    Value,
}

/// Comma state machine shared by the JSON encoder and the text encoder's
/// nested-structure path. Methods write into a caller-owned buffer so two
/// encoders can target the same output.
#[derive(Debug)]
struct JsonState {
    last: JsonToken,
}

impl JsonState {
    fn new() -> Self {
        Self {
            last: JsonToken::Unknown,
        }
    }

    fn reset(&mut self) {
        self.last = JsonToken::Unknown;
    }

    // A comma is due iff the previous token closed a structure or a value.
    fn separator(&mut self, buf: &mut String) {
        if matches!(
            self.last,
            JsonToken::ObjectEnd | JsonToken::ArrayEnd | JsonToken::Value
        ) {
            buf.push(',');
        }
    }

    fn object_begin(&mut self, buf: &mut String) {
        self.separator(buf);
        self.last = JsonToken::ObjectBegin;
        buf.push('{');
    }

    fn object_end(&mut self, buf: &mut String) {
        self.last = JsonToken::ObjectEnd;
        buf.push('}');
    }

    fn array_begin(&mut self, buf: &mut String) {
        self.separator(buf);
        self.last = JsonToken::ArrayBegin;
        buf.push('[');
    }

    fn array_end(&mut self, buf: &mut String) {
        self.last = JsonToken::ArrayEnd;
        buf.push(']');
    }

    fn key(&mut self, buf: &mut String, key: &str) {
        self.separator(buf);
        self.last = JsonToken::Key;
        buf.push('"');
        write_escaped(buf, key);
        buf.push_str("\":");
    }

    fn value(&mut self, buf: &mut String, write: impl FnOnce(&mut String)) {
        self.separator(buf);
        self.last = JsonToken::Value;
        write(buf);
    }

    fn string(&mut self, buf: &mut String, v: &str) {
        self.value(buf, |buf| {
            buf.push('"');
            write_escaped(buf, v);
            buf.push('"');
        });
    }

    fn string_bytes(&mut self, buf: &mut String, v: &[u8]) {
        self.value(buf, |buf| {
            buf.push('"');
            write_escaped_bytes(buf, v);
            buf.push('"');
        });
    }

    fn reflect(&mut self, buf: &mut String, v: &JsonValue) {
        self.value(buf, |buf| match serde_json::to_string(v) {
            Ok(s) => buf.push_str(&s),
            Err(err) => {
                buf.push('"');
                write_escaped(buf, &err.to_string());
                buf.push('"');
            }
        });
    }
}

/// Encodes log fields into standard JSON.
pub struct JsonEncoder {
    buf: String,
    state: JsonState,
}

impl JsonEncoder {
    pub fn new() -> Self {
        Self::with_buffer(String::new())
    }

    /// Continue encoding into an existing buffer.
    pub fn with_buffer(buf: String) -> Self {
        Self {
            buf,
            state: JsonState::new(),
        }
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

impl Default for JsonEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder for JsonEncoder {
    fn append_encoder_begin(&mut self) {
        self.append_object_begin();
    }

    fn append_encoder_end(&mut self) {
        self.append_object_end();
    }

    fn append_object_begin(&mut self) {
        self.state.object_begin(&mut self.buf);
    }

    fn append_object_end(&mut self) {
        self.state.object_end(&mut self.buf);
    }

    fn append_array_begin(&mut self) {
        self.state.array_begin(&mut self.buf);
    }

    fn append_array_end(&mut self) {
        self.state.array_end(&mut self.buf);
    }

    fn append_key(&mut self, key: &str) {
        self.state.key(&mut self.buf, key);
    }

    fn append_bool(&mut self, v: bool) {
        self.state
            .value(&mut self.buf, |buf| buf.push_str(if v { "true" } else { "false" }));
    }

    fn append_int64(&mut self, v: i64) {
        self.state.value(&mut self.buf, |buf| {
            let _ = write!(buf, "{v}");
        });
    }

    fn append_uint64(&mut self, v: u64) {
        self.state.value(&mut self.buf, |buf| {
            let _ = write!(buf, "{v}");
        });
    }

    fn append_float64(&mut self, v: f64) {
        self.state.value(&mut self.buf, |buf| {
            let _ = write!(buf, "{v}");
        });
    }

    fn append_string(&mut self, v: &str) {
        self.state.string(&mut self.buf, v);
    }

    fn append_string_bytes(&mut self, v: &[u8]) {
        self.state.string_bytes(&mut self.buf, v);
    }

    fn append_reflect(&mut self, v: &JsonValue) {
        self.state.reflect(&mut self.buf, v);
    }
}

/// Encodes fields as `key=value` pairs separated by a delimiter.
///
/// When a nested object or array begins, the encoder switches to its JSON
/// state until the structure closes again, so nested values serialize as
/// JSON literals inside the delimited line.
pub struct TextEncoder {
    buf: String,
    separator: String,
    json: JsonState,
    json_depth: i8,
    has_written: bool,
}

impl TextEncoder {
    pub fn new(separator: &str) -> Self {
        Self::with_buffer(String::new(), separator, false)
    }

    /// Continue encoding into an existing buffer. `has_written` controls
    /// whether a separator precedes the first key.
    pub fn with_buffer(buf: String, separator: &str, has_written: bool) -> Self {
        Self {
            buf,
            separator: separator.to_string(),
            json: JsonState::new(),
            json_depth: 0,
            has_written,
        }
    }

    pub fn into_string(self) -> String {
        self.buf
    }

    fn in_json(&self) -> bool {
        self.json_depth > 0
    }
}

impl Encoder for TextEncoder {
    fn append_encoder_begin(&mut self) {}

    fn append_encoder_end(&mut self) {}

    fn append_object_begin(&mut self) {
        self.json_depth += 1;
        self.json.object_begin(&mut self.buf);
    }

    fn append_object_end(&mut self) {
        self.json_depth -= 1;
        self.json.object_end(&mut self.buf);
        if self.json_depth == 0 {
            self.json.reset();
        }
    }

    fn append_array_begin(&mut self) {
        self.json_depth += 1;
        self.json.array_begin(&mut self.buf);
    }

    fn append_array_end(&mut self) {
        self.json_depth -= 1;
        self.json.array_end(&mut self.buf);
        if self.json_depth == 0 {
            self.json.reset();
        }
    }

    fn append_key(&mut self, key: &str) {
        if self.in_json() {
            self.json.key(&mut self.buf, key);
            return;
        }
        if self.has_written {
            self.buf.push_str(&self.separator);
        } else {
            self.has_written = true;
        }
        write_escaped(&mut self.buf, key);
        self.buf.push('=');
    }

    fn append_bool(&mut self, v: bool) {
        if self.in_json() {
            self.json
                .value(&mut self.buf, |buf| buf.push_str(if v { "true" } else { "false" }));
            return;
        }
        self.buf.push_str(if v { "true" } else { "false" });
    }

    fn append_int64(&mut self, v: i64) {
        if self.in_json() {
            self.json.value(&mut self.buf, |buf| {
                let _ = write!(buf, "{v}");
            });
            return;
        }
        let _ = write!(self.buf, "{v}");
    }

    fn append_uint64(&mut self, v: u64) {
        if self.in_json() {
            self.json.value(&mut self.buf, |buf| {
                let _ = write!(buf, "{v}");
            });
            return;
        }
        let _ = write!(self.buf, "{v}");
    }

    fn append_float64(&mut self, v: f64) {
        if self.in_json() {
            self.json.value(&mut self.buf, |buf| {
                let _ = write!(buf, "{v}");
            });
            return;
        }
        let _ = write!(self.buf, "{v}");
    }

    fn append_string(&mut self, v: &str) {
        if self.in_json() {
            self.json.string(&mut self.buf, v);
            return;
        }
        // Top-level strings are unquoted but keep the escape discipline.
        write_escaped(&mut self.buf, v);
    }

    fn append_string_bytes(&mut self, v: &[u8]) {
        if self.in_json() {
            self.json.string_bytes(&mut self.buf, v);
            return;
        }
        write_escaped_bytes(&mut self.buf, v);
    }

    fn append_reflect(&mut self, v: &JsonValue) {
        if self.in_json() {
            self.json.reflect(&mut self.buf, v);
            return;
        }
        match serde_json::to_string(v) {
            Ok(s) => self.buf.push_str(&s),
            Err(err) => write_escaped(&mut self.buf, &err.to_string()),
        }
    }
}

/// Escape and write a string according to JSON rules.
pub fn write_escaped(buf: &mut String, s: &str) {
    write_escaped_bytes(buf, s.as_bytes());
}

/// Escape and write a byte string according to JSON rules.
///
/// Each byte of an invalid UTF-8 sequence is replaced by a literal
/// `�` escape.
pub fn write_escaped_bytes(buf: &mut String, bytes: &[u8]) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b < 0x80 {
            if b >= 0x20 && b != b'\\' && b != b'"' {
                buf.push(b as char);
            } else {
                match b {
                    b'\\' | b'"' => {
                        buf.push('\\');
                        buf.push(b as char);
                    }
                    b'\n' => buf.push_str("\\n"),
                    b'\r' => buf.push_str("\\r"),
                    b'\t' => buf.push_str("\\t"),
                    _ => {
                        buf.push_str("\\u00");
                        buf.push(HEX[(b >> 4) as usize] as char);
                        buf.push(HEX[(b & 0xf) as usize] as char);
                    }
                }
            }
            i += 1;
            continue;
        }

        let len = match b {
            0xc0..=0xdf => 2,
            0xe0..=0xef => 3,
            0xf0..=0xf7 => 4,
            _ => 0,
        };
        let end = (i + len).min(bytes.len());
        match (len > 0)
            .then(|| std::str::from_utf8(&bytes[i..end]).ok())
            .flatten()
        {
            Some(s) if s.chars().count() == 1 => {
                buf.push_str(s);
                i += len;
            }
            _ => {
                buf.push_str("\\ufffd");
                i += 1;
            }
        }
    }
}
