//! Log output destinations
//!
//! Every appender exposes lifecycle management plus two write surfaces:
//! `append` for formatted events and `write` for raw bytes. All
//! implementations are safe for concurrent invocation.

pub mod file;
pub mod rolling_file;

use std::io::{self, Write};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::core::error::Result;
use crate::core::event::Event;
use crate::core::layout::Layout;
use crate::core::level::LevelRange;

pub use file::FileAppender;
pub use rolling_file::{
    parse_rotate_strategy, register_rotate_strategy, RollingFileAppender, RotateStrategy,
};

/// Terminal sink for formatted bytes.
pub trait Appender: Send + Sync {
    fn name(&self) -> &str;
    fn start(&self) -> Result<()>;
    fn stop(&self);
    /// Handle one formatted log event.
    fn append(&self, e: &Event);
    /// Write a byte slice directly.
    fn write(&self, b: &[u8]);
}

// The process-wide stdout stream used by console appenders,
// test-injectable through `set_stdout`.
static STDOUT: Lazy<Mutex<Box<dyn Write + Send>>> =
    Lazy::new(|| Mutex::new(Box::new(io::stdout())));

/// Replace the stream console appenders write to. Defaults to the process
/// standard output.
pub fn set_stdout(w: Box<dyn Write + Send>) {
    *STDOUT.lock() = w;
}

fn write_stdout(b: &[u8]) {
    let _ = STDOUT.lock().write_all(b);
}

/// Ignores all log events.
pub struct DiscardAppender {
    pub name: String,
}

impl Appender for DiscardAppender {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> Result<()> {
        Ok(())
    }

    fn stop(&self) {}

    fn append(&self, _e: &Event) {}

    fn write(&self, _b: &[u8]) {}
}

/// Writes formatted log events to the process-wide stdout stream.
pub struct ConsoleAppender {
    pub name: String,
    pub layout: Box<dyn Layout>,
}

impl Appender for ConsoleAppender {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> Result<()> {
        Ok(())
    }

    fn stop(&self) {}

    fn append(&self, e: &Event) {
        self.write(&self.layout.to_bytes(e));
    }

    fn write(&self, b: &[u8]) {
        write_stdout(b);
    }
}

/// Applies a layout to each event and forwards the bytes to the wrapped
/// appender.
pub struct LayoutAppender {
    pub name: String,
    pub layout: Box<dyn Layout>,
    pub appender: Arc<dyn Appender>,
}

impl Appender for LayoutAppender {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> Result<()> {
        self.appender.start()
    }

    fn stop(&self) {
        self.appender.stop();
    }

    fn append(&self, e: &Event) {
        self.appender.write(&self.layout.to_bytes(e));
    }

    fn write(&self, b: &[u8]) {
        self.appender.write(b);
    }
}

/// Forwards only events whose level falls inside the configured window.
pub struct LevelFilterAppender {
    pub name: String,
    pub level: LevelRange,
    pub appender: Arc<dyn Appender>,
}

impl Appender for LevelFilterAppender {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> Result<()> {
        self.appender.start()
    }

    fn stop(&self) {
        self.appender.stop();
    }

    fn append(&self, e: &Event) {
        if self.level.enable(e.level) {
            self.appender.append(e);
        }
    }

    fn write(&self, b: &[u8]) {
        self.appender.write(b);
    }
}

/// Composes several appenders; every operation fans out.
pub struct MultiAppender {
    pub name: String,
    pub appenders: Vec<Arc<dyn Appender>>,
}

impl Appender for MultiAppender {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> Result<()> {
        for a in &self.appenders {
            a.start()?;
        }
        Ok(())
    }

    fn stop(&self) {
        for a in &self.appenders {
            a.stop();
        }
    }

    fn append(&self, e: &Event) {
        for a in &self.appenders {
            a.append(e);
        }
    }

    fn write(&self, b: &[u8]) {
        for a in &self.appenders {
            a.write(b);
        }
    }
}
