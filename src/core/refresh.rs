//! One-shot configuration refresh
//!
//! Refresh is the single transition from the registration phase to the
//! serving phase: it builds the appender and logger graph from the flat
//! configuration, validates it, starts lifecycles and installs routing.
//! A failed refresh unwinds everything it started and leaves the process
//! back in the registration phase.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};

use super::config::{to_camel_key, Storage};
use super::error::{LogError, Result};
use super::logger::Logger;
use super::plugin::{new_plugin, properties_snapshot, PluginKind, PluginValue};
use super::reader::read_config;
use super::tag;
use crate::appenders::Appender;

/// The name the root logger is configured under.
pub const ROOT_LOGGER_NAME: &str = "root";

static INITIALIZED: AtomicBool = AtomicBool::new(false);

struct Live {
    loggers: Vec<Arc<dyn Logger>>,
    appenders: Vec<Arc<dyn Appender>>,
}

static LIVE: Lazy<Mutex<Live>> = Lazy::new(|| {
    Mutex::new(Live {
        loggers: Vec::new(),
        appenders: Vec::new(),
    })
});

static LOGGER_WRAPPERS: Lazy<RwLock<HashMap<String, Arc<LoggerWrapper>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Whether the one-shot refresh has completed.
pub(crate) fn initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}

/// A named indirection to a logger, for integrations that want a raw byte
/// sink. Bound to its logger during refresh.
pub struct LoggerWrapper {
    name: String,
    logger: ArcSwapOption<WrapperHolder>,
}

struct WrapperHolder(Arc<dyn Logger>);

impl LoggerWrapper {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Forward raw bytes to the bound logger; dropped while unbound.
    pub fn write(&self, b: &[u8]) {
        if let Some(holder) = &*self.logger.load() {
            holder.0.write(b);
        }
    }

    fn bind(&self, logger: Arc<dyn Logger>) {
        self.logger.store(Some(Arc::new(WrapperHolder(logger))));
    }

    fn unbind(&self) {
        self.logger.store(None);
    }
}

impl std::io::Write for &LoggerWrapper {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        LoggerWrapper::write(self, buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Retrieve or create the named logger wrapper.
///
/// Must be called before refresh; panics afterwards. The same name
/// returns the same wrapper.
pub fn get_logger(name: &str) -> Arc<LoggerWrapper> {
    if initialized() {
        panic!("log refresh already done");
    }
    let mut wrappers = LOGGER_WRAPPERS.write();
    if let Some(w) = wrappers.get(name) {
        return Arc::clone(w);
    }
    let w = Arc::new(LoggerWrapper {
        name: name.to_string(),
        logger: ArcSwapOption::const_empty(),
    });
    wrappers.insert(name.to_string(), Arc::clone(&w));
    w
}

/// Load the logging configuration from a file, selecting the reader by
/// the file extension.
pub fn refresh_file(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let data = std::fs::read(path)?;
    refresh_config(read_config(&data, &ext)?)
}

/// Load the logging configuration from a reader, selecting the parser by
/// the given extension.
pub fn refresh_reader(mut r: impl Read, ext: &str) -> Result<()> {
    let mut data = Vec::new();
    r.read_to_end(&mut data)?;
    refresh_config(read_config(&data, ext)?)
}

/// Load the logging configuration from a flat key→string map.
pub fn refresh_config(map: HashMap<String, String>) -> Result<()> {
    let storage = Storage::from_map(map);

    let appender_names = storage
        .sub_keys("appender")
        .map_err(|e| e.wrap("read appenders section error"))?;
    if appender_names.is_empty() {
        return Err(LogError::config("appenders section not found"));
    }
    let logger_names = storage
        .sub_keys("logger")
        .map_err(|e| e.wrap("read loggers section error"))?;
    if !logger_names.iter().any(|n| n == ROOT_LOGGER_NAME) {
        return Err(LogError::config("logger 'root' not found"));
    }

    // The one-shot gate: only the first refresh may proceed.
    if INITIALIZED
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Err(LogError::AlreadyRefreshed);
    }

    match build_and_install(&storage, &appender_names, &logger_names) {
        Ok(()) => Ok(()),
        Err(err) => {
            INITIALIZED.store(false, Ordering::Release);
            Err(err)
        }
    }
}

fn instantiate(
    storage: &Storage,
    kind: PluginKind,
    section: &str,
    name: &str,
) -> Result<PluginValue> {
    let prefix = format!("{section}.{name}");
    let type_name = storage
        .get(&format!("{prefix}.type"))
        .ok_or_else(|| LogError::config("attribute 'type' not found"))?;
    new_plugin(kind, type_name, storage, &prefix)
}

fn build_and_install(
    storage: &Storage,
    appender_names: &[String],
    logger_names: &[String],
) -> Result<()> {
    // Build the whole graph before starting anything.
    let mut appenders: HashMap<String, Arc<dyn Appender>> = HashMap::new();
    for name in appender_names {
        match instantiate(storage, PluginKind::Appender, "appender", name)? {
            PluginValue::Appender(a) => {
                appenders.insert(name.clone(), a);
            }
            _ => return Err(LogError::config(format!("{name} is not an appender"))),
        }
    }

    let mut loggers: HashMap<String, Arc<dyn Logger>> = HashMap::new();
    let mut tag_table: HashMap<String, Arc<dyn Logger>> = HashMap::new();
    for name in logger_names {
        let logger = match instantiate(storage, PluginKind::Logger, "logger", name)? {
            PluginValue::Logger(l) => l,
            _ => return Err(LogError::config(format!("{name} is not a logger"))),
        };

        // Resolve appender refs against the appender table.
        for r in &logger.base().core.refs {
            let appender = appenders
                .get(&r.ref_name)
                .ok_or_else(|| LogError::AppenderNotFound(r.ref_name.clone()))?;
            r.bind(Arc::clone(appender));
        }

        // Validate and collect the tags attribute.
        let entries: Vec<String> = logger
            .base()
            .tags
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if name == ROOT_LOGGER_NAME {
            if !entries.is_empty() {
                return Err(LogError::config(
                    "root logger must not have attribute 'tags'",
                ));
            }
        } else {
            if entries.is_empty() {
                return Err(LogError::config("logger must have attribute 'tags'"));
            }
            for entry in entries {
                if entry.contains('*') && !entry.ends_with("_*") {
                    return Err(LogError::config(format!(
                        "invalid tag pattern {entry:?} in logger {name}"
                    )));
                }
                if let Some(prev) = tag_table.get(&entry) {
                    if !Arc::ptr_eq(prev, &logger) {
                        return Err(LogError::config(format!(
                            "tag '{}' already config in logger {}",
                            entry,
                            prev.name()
                        )));
                    }
                    continue;
                }
                tag_table.insert(entry, Arc::clone(&logger));
            }
        }
        loggers.insert(name.clone(), logger);
    }
    let root = Arc::clone(&loggers[ROOT_LOGGER_NAME]);

    // Start lifecycles in enumeration order; unwind on any failure.
    let mut started_appenders: Vec<Arc<dyn Appender>> = Vec::new();
    let mut started_loggers: Vec<Arc<dyn Logger>> = Vec::new();
    let unwind = |started_loggers: &[Arc<dyn Logger>], started_appenders: &[Arc<dyn Appender>]| {
        for l in started_loggers.iter().rev() {
            l.stop();
        }
        for a in started_appenders.iter().rev() {
            a.stop();
        }
    };

    for name in appender_names {
        let a = &appenders[name];
        if let Err(err) = a.start() {
            unwind(&started_loggers, &started_appenders);
            return Err(err.wrap(format!("appender {name} start error")));
        }
        started_appenders.push(Arc::clone(a));
    }
    for name in logger_names {
        let l = &loggers[name];
        if let Err(err) = l.start() {
            unwind(&started_loggers, &started_appenders);
            return Err(err.wrap(format!("logger {name} start error")));
        }
        started_loggers.push(Arc::clone(l));
    }

    // Bind named wrappers to their loggers.
    {
        let wrappers = LOGGER_WRAPPERS.read();
        for (name, wrapper) in wrappers.iter() {
            let Some(logger) = loggers.get(name) else {
                unwind(&started_loggers, &started_appenders);
                for w in wrappers.values() {
                    w.unbind();
                }
                return Err(LogError::LoggerNotFound(name.clone()));
            };
            wrapper.bind(Arc::clone(logger));
        }
    }

    // Install tag routing: exact entry, nearest wildcard, root fallback.
    for t in tag::all_tags() {
        match tag::match_configured_tag(&tag_table, t.name()) {
            Some(logger) => t.set_logger(Arc::clone(logger)),
            None => t.set_logger(Arc::clone(&root)),
        }
    }

    // Inject registered properties from their camel-cased keys.
    for (key, setter) in properties_snapshot() {
        let Some(value) = storage.get(&to_camel_key(&key)) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        if let Err(err) = setter(value) {
            unwind(&started_loggers, &started_appenders);
            tag::reset_tags_to_default();
            for w in LOGGER_WRAPPERS.read().values() {
                w.unbind();
            }
            return Err(err.wrap(format!("inject property {key} error")));
        }
    }

    // Publish the live lists for orderly shutdown.
    let mut live = LIVE.lock();
    live.loggers = logger_names.iter().map(|n| Arc::clone(&loggers[n])).collect();
    live.appenders = appender_names
        .iter()
        .map(|n| Arc::clone(&appenders[n]))
        .collect();
    Ok(())
}

/// Stop every live logger, then every live appender, rebind tags to the
/// pre-refresh default and return to the registration phase. A no-op
/// while uninitialised.
pub fn destroy() {
    if !initialized() {
        return;
    }
    let (loggers, appenders) = {
        let mut live = LIVE.lock();
        (
            std::mem::take(&mut live.loggers),
            std::mem::take(&mut live.appenders),
        )
    };
    for l in &loggers {
        l.stop();
    }
    for a in &appenders {
        a.stop();
    }
    tag::reset_tags_to_default();
    for w in LOGGER_WRAPPERS.read().values() {
        w.unbind();
    }
    INITIALIZED.store(false, Ordering::Release);
}
