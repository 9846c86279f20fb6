//! Pooled log event records

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::field::Field;
use super::level::{self, Level};

// Recycled events beyond this count are dropped instead of pooled.
const MAX_POOLED: usize = 256;

static EVENT_POOL: Lazy<Mutex<Vec<Box<Event>>>> = Lazy::new(|| Mutex::new(Vec::new()));
static POOL_GETS: AtomicU64 = AtomicU64::new(0);
static POOL_PUTS: AtomicU64 = AtomicU64::new(0);

/// One log record flowing through the pipeline.
///
/// Events are pooled: obtain one with [`get_event`], hand it to a logger
/// via `publish`, and the logger returns it to the pool once dispatched.
/// An event must not be referenced after release.
pub struct Event {
    pub level: Level,
    pub time: DateTime<Utc>,
    pub file: &'static str,
    pub line: u32,
    pub tag: &'static str,
    pub fields: Vec<Field>,
    pub ctx_string: String,
    pub ctx_fields: Vec<Field>,
}

impl Default for Event {
    fn default() -> Self {
        Self {
            level: level::NONE,
            time: DateTime::UNIX_EPOCH,
            file: "",
            line: 0,
            tag: "",
            fields: Vec::new(),
            ctx_string: String::new(),
            ctx_fields: Vec::new(),
        }
    }
}

impl Event {
    /// Drop user references so buffers can be reused without leaking data
    /// into the next record.
    fn reset(&mut self) {
        self.level = level::NONE;
        self.file = "";
        self.line = 0;
        self.tag = "";
        self.fields.clear();
        self.ctx_string.clear();
        self.ctx_fields.clear();
    }
}

/// Fetch a zeroed or recycled event from the pool.
pub fn get_event() -> Box<Event> {
    POOL_GETS.fetch_add(1, Ordering::Relaxed);
    EVENT_POOL.lock().pop().unwrap_or_default()
}

/// Return an event to the pool once the logger is done with it.
pub fn put_event(mut e: Box<Event>) {
    POOL_PUTS.fetch_add(1, Ordering::Relaxed);
    e.reset();
    let mut pool = EVENT_POOL.lock();
    if pool.len() < MAX_POOLED {
        pool.push(e);
    }
}

/// Lifetime counters `(gets, puts)` for pool accounting in tests.
pub fn pool_counters() -> (u64, u64) {
    (
        POOL_GETS.load(Ordering::Relaxed),
        POOL_PUTS.load(Ordering::Relaxed),
    )
}

// Serializes tests that assert exact pool-counter deltas (writers) against
// tests that merely traffic events through the pool (readers).
#[cfg(test)]
pub(crate) static POOL_TEST_LOCK: Lazy<parking_lot::RwLock<()>> =
    Lazy::new(|| parking_lot::RwLock::new(()));
