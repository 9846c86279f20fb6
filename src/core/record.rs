//! Public recording API
//!
//! The hot path: resolve the tag's logger, check the level with no
//! allocation, capture the caller, resolve the timestamp and ambient
//! context through the configured hooks, then fill a pooled event and
//! hand it over.

use std::collections::HashMap;
use std::panic::Location;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;

use super::event::get_event;
use super::field::Field;
use super::level::{self, Level};
use super::logger::Logger as _;
use super::tag::Tag;

/// Ambient request context the hooks extract strings and fields from.
#[derive(Debug, Clone, Default)]
pub struct LogContext {
    values: HashMap<String, JsonValue>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> &str {
        self.values.get(key).and_then(|v| v.as_str()).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Overrides the wall clock, e.g. for deterministic tests.
pub type TimeNowFn = fn(&LogContext) -> DateTime<Utc>;
/// Extracts a pre-formatted string from the context.
pub type StringFromContextFn = fn(&LogContext) -> String;
/// Extracts structured fields (trace IDs, user IDs) from the context.
pub type FieldsFromContextFn = fn(&LogContext) -> Vec<Field>;

#[derive(Clone, Copy, Default)]
struct Hooks {
    time_now: Option<TimeNowFn>,
    string_from_context: Option<StringFromContextFn>,
    fields_from_context: Option<FieldsFromContextFn>,
}

static HOOKS: Lazy<RwLock<Hooks>> = Lazy::new(|| RwLock::new(Hooks::default()));

pub fn set_time_now(f: TimeNowFn) {
    HOOKS.write().time_now = Some(f);
}

pub fn set_string_from_context(f: StringFromContextFn) {
    HOOKS.write().string_from_context = Some(f);
}

pub fn set_fields_from_context(f: FieldsFromContextFn) {
    HOOKS.write().fields_from_context = Some(f);
}

/// Publish one record through the tag's logger.
///
/// This is the core the severity forms funnel into; it never reports
/// failures back to the caller.
pub fn record(
    ctx: &LogContext,
    level: Level,
    tag: &Tag,
    file: &'static str,
    line: u32,
    fields: Vec<Field>,
) {
    let logger = tag.logger();
    if !logger.enable_level(level) {
        return;
    }

    let hooks = *HOOKS.read();
    let now = hooks.time_now.map_or_else(Utc::now, |f| f(ctx));
    let ctx_string = hooks
        .string_from_context
        .map(|f| f(ctx))
        .unwrap_or_default();
    let ctx_fields = hooks
        .fields_from_context
        .map(|f| f(ctx))
        .unwrap_or_default();

    let mut e = get_event();
    e.level = level;
    e.time = now;
    e.file = file;
    e.line = line;
    e.tag = tag.name();
    e.fields = fields;
    e.ctx_string = ctx_string;
    e.ctx_fields = ctx_fields;
    logger.publish(e);
}

/// Backend of the `*f!` macros; formats only when the level is enabled.
pub fn logf(
    ctx: &LogContext,
    level: Level,
    tag: &Tag,
    file: &'static str,
    line: u32,
    args: std::fmt::Arguments<'_>,
) {
    if !tag.logger().enable_level(level) {
        return;
    }
    record(ctx, level, tag, file, line, vec![super::field::msg(args.to_string())]);
}

/// Log at TRACE with a lazy field-producing closure; the closure is not
/// invoked when the level is disabled.
#[track_caller]
pub fn trace(ctx: &LogContext, tag: &Tag, fields: impl FnOnce() -> Vec<Field>) {
    if tag.logger().enable_level(level::TRACE) {
        let loc = Location::caller();
        record(ctx, level::TRACE, tag, loc.file(), loc.line(), fields());
    }
}

/// Log at DEBUG with a lazy field-producing closure.
#[track_caller]
pub fn debug(ctx: &LogContext, tag: &Tag, fields: impl FnOnce() -> Vec<Field>) {
    if tag.logger().enable_level(level::DEBUG) {
        let loc = Location::caller();
        record(ctx, level::DEBUG, tag, loc.file(), loc.line(), fields());
    }
}

#[track_caller]
pub fn info(ctx: &LogContext, tag: &Tag, fields: Vec<Field>) {
    let loc = Location::caller();
    record(ctx, level::INFO, tag, loc.file(), loc.line(), fields);
}

#[track_caller]
pub fn warn(ctx: &LogContext, tag: &Tag, fields: Vec<Field>) {
    let loc = Location::caller();
    record(ctx, level::WARN, tag, loc.file(), loc.line(), fields);
}

#[track_caller]
pub fn error(ctx: &LogContext, tag: &Tag, fields: Vec<Field>) {
    let loc = Location::caller();
    record(ctx, level::ERROR, tag, loc.file(), loc.line(), fields);
}

/// Log at PANIC severity; the process is not interrupted.
#[track_caller]
pub fn panic(ctx: &LogContext, tag: &Tag, fields: Vec<Field>) {
    let loc = Location::caller();
    record(ctx, level::PANIC, tag, loc.file(), loc.line(), fields);
}

/// Log at FATAL severity; termination is left to the caller.
#[track_caller]
pub fn fatal(ctx: &LogContext, tag: &Tag, fields: Vec<Field>) {
    let loc = Location::caller();
    record(ctx, level::FATAL, tag, loc.file(), loc.line(), fields);
}
