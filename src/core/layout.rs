//! Event-to-bytes serialization

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};

use super::encoder::{Encoder, JsonEncoder, TextEncoder};
use super::event::Event;
use super::field::encode_fields;

/// Default length cap for the rendered `file:line` fragment.
pub const DEFAULT_FILE_LINE_LENGTH: usize = 48;

/// Default separator between `key=value` pairs in the text layout.
pub const DEFAULT_SEPARATOR: &str = "||";

// Initial capacity of layout scratch buffers, adjustable through the
// `bufferCap` property.
static BUFFER_CAP: AtomicUsize = AtomicUsize::new(256);

pub(crate) fn set_buffer_cap(cap: usize) {
    BUFFER_CAP.store(cap, Ordering::Relaxed);
}

fn buffer_cap() -> usize {
    BUFFER_CAP.load(Ordering::Relaxed)
}

/// Serializes an [`Event`] to bytes.
pub trait Layout: Send + Sync {
    fn to_bytes(&self, e: &Event) -> Vec<u8>;
}

fn format_time(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// Render `file:line`, eliding the left of the path when it exceeds the
/// configured length: `"..."` plus the rightmost `n - 3` characters.
fn file_line(e: &Event, max_len: usize) -> String {
    let s = format!("{}:{}", e.file, e.line);
    if s.len() <= max_len || max_len <= 3 {
        return s;
    }
    let cut = s.len() - (max_len - 3);
    let tail = String::from_utf8_lossy(&s.as_bytes()[cut..]);
    format!("...{tail}")
}

/// Produces `[LEVEL][time][file:line] tag||k=v||…` lines.
pub struct TextLayout {
    pub file_line_length: usize,
    pub separator: String,
}

impl Default for TextLayout {
    fn default() -> Self {
        Self {
            file_line_length: DEFAULT_FILE_LINE_LENGTH,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

impl Layout for TextLayout {
    fn to_bytes(&self, e: &Event) -> Vec<u8> {
        let mut buf = String::with_capacity(buffer_cap());
        buf.push('[');
        buf.push_str(e.level.name());
        buf.push_str("][");
        buf.push_str(&format_time(&e.time));
        buf.push_str("][");
        buf.push_str(&file_line(e, self.file_line_length));
        buf.push_str("] ");
        buf.push_str(e.tag);
        if !e.ctx_string.is_empty() {
            // Already formatted by the context hook; written as a literal.
            buf.push_str(&self.separator);
            buf.push_str(&e.ctx_string);
        }
        let mut enc = TextEncoder::with_buffer(buf, &self.separator, true);
        encode_fields(&mut enc, &e.ctx_fields);
        encode_fields(&mut enc, &e.fields);
        let mut out = enc.into_string();
        out.push('\n');
        out.into_bytes()
    }
}

/// Produces one JSON object per line.
pub struct JsonLayout {
    pub file_line_length: usize,
}

impl Default for JsonLayout {
    fn default() -> Self {
        Self {
            file_line_length: DEFAULT_FILE_LINE_LENGTH,
        }
    }
}

impl Layout for JsonLayout {
    fn to_bytes(&self, e: &Event) -> Vec<u8> {
        let mut enc = JsonEncoder::with_buffer(String::with_capacity(buffer_cap()));
        enc.append_encoder_begin();
        enc.append_key("level");
        enc.append_string(&e.level.name().to_ascii_lowercase());
        enc.append_key("time");
        enc.append_string(&format_time(&e.time));
        enc.append_key("fileLine");
        enc.append_string(&file_line(e, self.file_line_length));
        enc.append_key("tag");
        enc.append_string(e.tag);
        if !e.ctx_string.is_empty() {
            enc.append_key("ctxString");
            enc.append_string(&e.ctx_string);
        }
        encode_fields(&mut enc, &e.ctx_fields);
        encode_fields(&mut enc, &e.fields);
        enc.append_encoder_end();
        let mut out = enc.into_string();
        out.push('\n');
        out.into_bytes()
    }
}
