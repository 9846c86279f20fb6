//! Time-rotated file sink with age-based retention

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration as StdDuration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};

use super::Appender;
use crate::core::error::{LogError, Result};
use crate::core::event::Event;
use crate::core::layout::Layout;

static ROTATE_STRATEGIES: Lazy<RwLock<HashMap<String, RotateStrategy>>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("1h".to_string(), RotateStrategy::new(StdDuration::from_secs(3600)));
    m.insert("30m".to_string(), RotateStrategy::new(StdDuration::from_secs(1800)));
    m.insert("10m".to_string(), RotateStrategy::new(StdDuration::from_secs(600)));
    RwLock::new(m)
});

/// Maps wall time to a rotation slot and formats file-name suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotateStrategy {
    interval_secs: i64,
}

impl RotateStrategy {
    pub fn new(interval: StdDuration) -> Self {
        Self {
            interval_secs: interval.as_secs().max(1) as i64,
        }
    }

    /// The slot key: epoch seconds truncated to the rotation interval.
    pub fn slot(&self, t: &DateTime<Utc>) -> i64 {
        (t.timestamp() / self.interval_secs) * self.interval_secs
    }

    /// Fixed-width `yyyyMMddHHmmss` suffix for the rotated file name.
    pub fn format(&self, t: &DateTime<Utc>) -> String {
        t.format("%Y%m%d%H%M%S").to_string()
    }
}

/// Register a rotation strategy under a name usable from configuration.
pub fn register_rotate_strategy(name: &str, strategy: RotateStrategy) {
    ROTATE_STRATEGIES.write().insert(name.to_string(), strategy);
}

/// Look up a registered rotation strategy by name.
pub fn parse_rotate_strategy(name: &str) -> Result<RotateStrategy> {
    ROTATE_STRATEGIES
        .read()
        .get(name)
        .copied()
        .ok_or_else(|| LogError::config(format!("invalid rotate strategy: {name:?}")))
}

/// Writes logs to `<dir>/<name>.<yyyyMMddHHmmss>` files that rotate when
/// wall time crosses into a new slot.
///
/// Multiple threads may call `write` concurrently: writers go through an
/// atomic current-file pointer, and only the actual rotation takes a
/// mutex. A small number of writes may be lost while a rotation replaces
/// the file; zero-loss callers should sit behind an async logger instead.
pub struct RollingFileAppender {
    pub name: String,
    pub layout: Box<dyn Layout>,
    pub file_dir: String,
    pub file_name: String,
    pub rotation: RotateStrategy,
    /// Files older than this many hours are pruned after each rotation.
    pub max_age: i64,

    file: ArcSwapOption<File>,
    curr_slot: AtomicI64,
    rotate_lock: Mutex<()>,
}

impl RollingFileAppender {
    pub fn new(
        name: impl Into<String>,
        layout: Box<dyn Layout>,
        file_dir: impl Into<String>,
        file_name: impl Into<String>,
        rotation: RotateStrategy,
        max_age: i64,
    ) -> Self {
        Self {
            name: name.into(),
            layout,
            file_dir: file_dir.into(),
            file_name: file_name.into(),
            rotation,
            max_age,
            file: ArcSwapOption::const_empty(),
            curr_slot: AtomicI64::new(0),
            rotate_lock: Mutex::new(()),
        }
    }

    fn create_file(&self, t: &DateTime<Utc>) -> Result<File> {
        let path = self.slot_path(t);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                LogError::Io(e).wrap(format!("Failed to create log file {}", path.display()))
            })
    }

    fn slot_path(&self, t: &DateTime<Utc>) -> PathBuf {
        let file_name = format!("{}.{}", self.file_name, self.rotation.format(t));
        Path::new(&self.file_dir).join(file_name)
    }

    // Checks whether wall time crossed into a new slot; if so, closes the
    // prior file, opens the new one and prunes expired files in the
    // background. A creation failure leaves no current file, so writes are
    // dropped until the next rotation attempt succeeds.
    fn rotate(&self) {
        let now = Utc::now();
        let now_slot = self.rotation.slot(&now);
        if now_slot <= self.curr_slot.load(Ordering::Acquire) {
            return;
        }

        let _guard = self.rotate_lock.lock();
        if now_slot <= self.curr_slot.load(Ordering::Acquire) {
            return;
        }

        if let Some(old) = self.file.swap(None) {
            let _ = old.sync_all();
        }

        match self.create_file(&now) {
            Ok(file) => {
                self.file.store(Some(file.into()));
                self.curr_slot.store(now_slot, Ordering::Release);
                self.spawn_cleanup();
            }
            Err(err) => {
                eprintln!("{err}");
                self.curr_slot.store(now_slot, Ordering::Release);
            }
        }
    }

    // Removes expired files asynchronously, matching on the file-name
    // prefix only.
    fn spawn_cleanup(&self) {
        let dir = self.file_dir.clone();
        let prefix = format!("{}.", self.file_name);
        let max_age = self.max_age;
        std::thread::spawn(move || {
            clear_expired_files(&dir, &prefix, max_age);
        });
    }
}

fn clear_expired_files(dir: &str, prefix: &str, max_age_hours: i64) {
    let expiration = Utc::now() - Duration::hours(max_age_hours);
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(prefix) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        if meta.is_dir() {
            continue;
        }
        let Ok(modified) = meta.modified() else { continue };
        if DateTime::<Utc>::from(modified) < expiration {
            let _ = fs::remove_file(entry.path());
        }
    }
}

impl Appender for RollingFileAppender {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> Result<()> {
        let now = Utc::now();
        let file = self.create_file(&now)?;
        self.file.store(Some(file.into()));
        self.curr_slot.store(self.rotation.slot(&now), Ordering::Release);
        Ok(())
    }

    fn stop(&self) {
        if let Some(file) = self.file.swap(None) {
            let _ = file.sync_all();
        }
    }

    fn append(&self, e: &Event) {
        self.write(&self.layout.to_bytes(e));
    }

    fn write(&self, b: &[u8]) {
        self.rotate();
        if let Some(file) = &*self.file.load() {
            let mut f: &File = file;
            let _ = f.write_all(b);
        }
    }
}
