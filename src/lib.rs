//! # taglog
//!
//! A high-throughput structured logging library with tag-based routing,
//! pluggable appenders and one-shot declarative configuration.
//!
//! ## Features
//!
//! - **Typed fields**: key/value events encoded as JSON or delimited text
//! - **Tag routing**: interned tags resolve to loggers through exact and
//!   wildcard matches installed once at configuration time
//! - **Sync and async pipelines**: inline dispatch, or a bounded queue
//!   drained by a dedicated worker with Block/Discard/DiscardOldest
//!   buffer-full policies
//! - **Declarative wiring**: appenders, layouts and loggers built from a
//!   flat configuration map by a plugin engine
//!
//! ## Quick start
//!
//! ```
//! use std::collections::HashMap;
//! use taglog::{infof, msg, LogContext};
//!
//! let tag = taglog::register_tag("_app_demo");
//!
//! let mut config = HashMap::new();
//! for (k, v) in [
//!     ("appender.console.type", "Console"),
//!     ("logger.root.type", "Logger"),
//!     ("logger.root.level", "info"),
//!     ("logger.root.appenderRef.ref", "console"),
//! ] {
//!     config.insert(k.to_string(), v.to_string());
//! }
//! taglog::refresh_config(config).unwrap();
//!
//! let ctx = LogContext::new();
//! taglog::info(&ctx, tag, vec![msg("service started")]);
//! infof!(&ctx, tag, "listening on port {}", 8080);
//!
//! taglog::destroy();
//! ```

pub mod appenders;
pub mod core;
pub mod macros;

pub mod prelude {
    pub use crate::appenders::{Appender, ConsoleAppender, FileAppender, RollingFileAppender};
    pub use crate::core::{
        destroy, get_logger, msg, refresh_config, refresh_file, refresh_reader, register_tag,
        Field, Layout, Level, LevelRange, LogContext, LogError, Result, Tag,
    };
    pub use crate::{debugf, errorf, fatalf, infof, panicf, tracef, warnf};
}

pub use appenders::{set_stdout, Appender};
pub use core::level::{DEBUG, ERROR, FATAL, INFO, MAX, NONE, PANIC, TRACE, WARN};
pub use core::{
    build_tag, debug, destroy, error, fatal, get_event, get_logger, info, is_valid_tag, logf, msg,
    panic, parse_level, put_event, record, refresh_config, refresh_file, refresh_reader,
    register_app_tag, register_biz_tag, register_converter, register_level, register_plugin,
    register_property, register_reader, register_rpc_tag, register_tag, set_fields_from_context,
    set_string_from_context, set_time_now, trace, warn, Event, Field, Layout, Level, LevelRange,
    LogContext, LogError, Logger, LoggerWrapper, Result, Tag, ROOT_LOGGER_NAME,
};
