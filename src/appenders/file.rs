//! Append-only file sink

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::Appender;
use crate::core::error::{LogError, Result};
use crate::core::event::Event;
use crate::core::layout::Layout;

/// Writes formatted log events to a single file opened with append
/// semantics on `start`; `stop` syncs and closes it.
pub struct FileAppender {
    pub name: String,
    pub layout: Box<dyn Layout>,
    pub file_dir: String,
    pub file_name: String,

    file: Mutex<Option<File>>,
}

impl FileAppender {
    pub fn new(
        name: impl Into<String>,
        layout: Box<dyn Layout>,
        file_dir: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            layout,
            file_dir: file_dir.into(),
            file_name: file_name.into(),
            file: Mutex::new(None),
        }
    }

    fn path(&self) -> PathBuf {
        Path::new(&self.file_dir).join(&self.file_name)
    }
}

impl Appender for FileAppender {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> Result<()> {
        let path = self.path();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LogError::Io(e).wrap(format!("open {} error", path.display())))?;
        *self.file.lock() = Some(file);
        Ok(())
    }

    fn stop(&self) {
        if let Some(file) = self.file.lock().take() {
            let _ = file.sync_all();
        }
    }

    fn append(&self, e: &Event) {
        self.write(&self.layout.to_bytes(e));
    }

    fn write(&self, b: &[u8]) {
        if let Some(file) = self.file.lock().as_mut() {
            let _ = file.write_all(b);
        }
    }
}
