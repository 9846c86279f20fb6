//! Interned routing tags
//!
//! A tag names a call site's routing key. Registration happens before the
//! one-shot configuration refresh; refresh installs the resolved logger
//! behind an atomic pointer that the hot path reads without locks.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::layout::TextLayout;
use super::level::{self, LevelRange};
use super::logger::{AppenderRef, BaseLogger, Logger, SyncLogger};
use crate::appenders::ConsoleAppender;

static TAG_REGISTRY: Lazy<RwLock<HashMap<String, &'static Tag>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

// Console logger serving every tag until refresh installs the real graph.
static DEFAULT_LOGGER: Lazy<Arc<dyn Logger>> = Lazy::new(|| {
    let console = Arc::new(ConsoleAppender {
        name: "console".to_string(),
        layout: Box::new(TextLayout::default()),
    });
    let r = AppenderRef::new("console", LevelRange::default());
    r.bind(console);
    Arc::new(SyncLogger::new(BaseLogger::new(
        "default",
        LevelRange::new(level::INFO, level::MAX),
        "",
        vec![r],
        None,
    )))
});

pub(crate) fn default_logger() -> Arc<dyn Logger> {
    Arc::clone(&DEFAULT_LOGGER)
}

/// A named routing key resolved to a logger.
pub struct Tag {
    name: &'static str,
    logger: ArcSwap<LoggerHolder>,
}

// Keeps the trait object behind a sized payload for the atomic swap.
struct LoggerHolder(Arc<dyn Logger>);

impl Tag {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The logger currently serving this tag.
    pub fn logger(&self) -> Arc<dyn Logger> {
        Arc::clone(&self.logger.load().0)
    }

    pub(crate) fn set_logger(&self, logger: Arc<dyn Logger>) {
        self.logger.store(Arc::new(LoggerHolder(logger)));
    }
}

/// Whether the tag satisfies the naming rules:
/// length 3..=36; only `[a-z0-9_]`; may start with an underscore;
/// splitting on `_` after stripping one leading underscore yields 1..=4
/// non-empty segments.
pub fn is_valid_tag(tag: &str) -> bool {
    if tag.len() < 3 || tag.len() > 36 {
        return false;
    }
    if !tag
        .bytes()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == b'_')
    {
        return false;
    }
    let segments: Vec<&str> = tag.strip_prefix('_').unwrap_or(tag).split('_').collect();
    (1..=4).contains(&segments.len()) && !segments.iter().any(|s| s.is_empty())
}

/// Create or retrieve a tag by name.
///
/// Must be called before refresh; panics afterwards and panics on an
/// invalid name. Registering the same name twice returns the same tag.
pub fn register_tag(tag: &str) -> &'static Tag {
    if super::refresh::initialized() {
        panic!("log refresh already done");
    }
    if !is_valid_tag(tag) {
        panic!("invalid tag name");
    }
    let mut registry = TAG_REGISTRY.write();
    if let Some(&t) = registry.get(tag) {
        return t;
    }
    let t: &'static Tag = Box::leak(Box::new(Tag {
        name: Box::leak(tag.to_string().into_boxed_str()),
        logger: ArcSwap::new(Arc::new(LoggerHolder(default_logger()))),
    }));
    registry.insert(tag.to_string(), t);
    t
}

/// Build `_<main>_<sub>` or `_<main>_<sub>_<action>`.
///
/// Panics when `sub` is empty.
pub fn build_tag(main: &str, sub: &str, action: &str) -> String {
    if sub.is_empty() {
        panic!("sub cannot be empty");
    }
    if action.is_empty() {
        format!("_{main}_{sub}")
    } else {
        format!("_{main}_{sub}_{action}")
    }
}

/// Tag for application-layer logs (framework events, lifecycle).
pub fn register_app_tag(sub: &str, action: &str) -> &'static Tag {
    register_tag(&build_tag("app", sub, action))
}

/// Tag for business-logic logs (use cases, domain events).
pub fn register_biz_tag(sub: &str, action: &str) -> &'static Tag {
    register_tag(&build_tag("biz", sub, action))
}

/// Tag for RPC or dependency logs.
pub fn register_rpc_tag(sub: &str, action: &str) -> &'static Tag {
    register_tag(&build_tag("rpc", sub, action))
}

/// Snapshot of all registered tags in sorted order.
pub(crate) fn all_tags() -> Vec<&'static Tag> {
    let registry = TAG_REGISTRY.read();
    let mut tags: Vec<&'static Tag> = registry.values().copied().collect();
    tags.sort_by_key(|t| t.name);
    tags
}

/// Rebind every registered tag to the pre-refresh default logger.
pub(crate) fn reset_tags_to_default() {
    for tag in TAG_REGISTRY.read().values() {
        tag.set_logger(default_logger());
    }
}

/// Pick the configured entry serving `tag`: exact match first, then the
/// nearest `_*` wildcard walking up the underscore hierarchy.
pub(crate) fn match_configured_tag<'a>(
    configured: &'a HashMap<String, Arc<dyn Logger>>,
    tag: &str,
) -> Option<&'a Arc<dyn Logger>> {
    if let Some(l) = configured.get(tag) {
        return Some(l);
    }
    let mut prefix = tag;
    while let Some(idx) = prefix.rfind('_') {
        prefix = &prefix[..idx];
        if prefix.is_empty() {
            break;
        }
        if let Some(l) = configured.get(&format!("{prefix}_*")) {
            return Some(l);
        }
    }
    None
}
