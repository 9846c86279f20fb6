//! Formatted-logging macros.
//!
//! These macros pair the structured severity functions with `format!`
//! style message formatting, capturing the call site for the event's
//! `file:line` rendering. Formatting is skipped entirely when the tag's
//! logger has the severity disabled.
//!
//! # Examples
//!
//! ```
//! use taglog::{infof, LogContext};
//!
//! let tag = taglog::register_tag("_app_doc_macros");
//! let ctx = LogContext::new();
//! infof!(&ctx, tag, "listening on port {}", 8080);
//! ```

/// Log a formatted message at a chosen severity.
#[macro_export]
macro_rules! logf {
    ($ctx:expr, $level:expr, $tag:expr, $($arg:tt)+) => {
        $crate::logf($ctx, $level, $tag, file!(), line!(), format_args!($($arg)+))
    };
}

/// Log a formatted trace-level message.
#[macro_export]
macro_rules! tracef {
    ($ctx:expr, $tag:expr, $($arg:tt)+) => {
        $crate::logf!($ctx, $crate::TRACE, $tag, $($arg)+)
    };
}

/// Log a formatted debug-level message.
#[macro_export]
macro_rules! debugf {
    ($ctx:expr, $tag:expr, $($arg:tt)+) => {
        $crate::logf!($ctx, $crate::DEBUG, $tag, $($arg)+)
    };
}

/// Log a formatted info-level message.
#[macro_export]
macro_rules! infof {
    ($ctx:expr, $tag:expr, $($arg:tt)+) => {
        $crate::logf!($ctx, $crate::INFO, $tag, $($arg)+)
    };
}

/// Log a formatted warn-level message.
#[macro_export]
macro_rules! warnf {
    ($ctx:expr, $tag:expr, $($arg:tt)+) => {
        $crate::logf!($ctx, $crate::WARN, $tag, $($arg)+)
    };
}

/// Log a formatted error-level message.
#[macro_export]
macro_rules! errorf {
    ($ctx:expr, $tag:expr, $($arg:tt)+) => {
        $crate::logf!($ctx, $crate::ERROR, $tag, $($arg)+)
    };
}

/// Log a formatted panic-level message; the process keeps running.
#[macro_export]
macro_rules! panicf {
    ($ctx:expr, $tag:expr, $($arg:tt)+) => {
        $crate::logf!($ctx, $crate::PANIC, $tag, $($arg)+)
    };
}

/// Log a formatted fatal-level message; termination is left to the caller.
#[macro_export]
macro_rules! fatalf {
    ($ctx:expr, $tag:expr, $($arg:tt)+) => {
        $crate::logf!($ctx, $crate::FATAL, $tag, $($arg)+)
    };
}
