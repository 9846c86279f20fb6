//! Declarative plugin wiring
//!
//! Plugins are registered per kind under a concrete name and built by a
//! factory that pulls attributes and nested elements out of the flat
//! configuration through an [`Injector`]. The injector implements the
//! declarative semantics: attribute lookup with defaults and `${…}`
//! placeholder substitution, converter dispatch by target type, and
//! scalar or collection element construction.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::Location;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::config::{parse_humanize_bytes, to_camel_key, HumanizeBytes, Storage};
use super::error::{LogError, Result};
use super::layout::{self, JsonLayout, Layout, TextLayout, DEFAULT_SEPARATOR};
use super::level::{Level, LevelRange};
use super::logger::{
    AppenderRef, AsyncLogger, BaseLogger, BufferFullPolicy, Logger, SyncLogger,
};
use crate::appenders::{
    parse_rotate_strategy, Appender, ConsoleAppender, DiscardAppender, FileAppender,
    LayoutAppender, LevelFilterAppender, MultiAppender, RollingFileAppender, RotateStrategy,
};

/// The namespaces plugin names live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Appender,
    Layout,
    Logger,
    AppenderRef,
}

impl PluginKind {
    fn as_str(&self) -> &'static str {
        match self {
            PluginKind::Appender => "Appender",
            PluginKind::Layout => "Layout",
            PluginKind::Logger => "Logger",
            PluginKind::AppenderRef => "AppenderRef",
        }
    }
}

/// A constructed plugin instance.
pub enum PluginValue {
    Appender(Arc<dyn Appender>),
    Layout(Box<dyn Layout>),
    Logger(Arc<dyn Logger>),
    AppenderRef(AppenderRef),
}

impl std::fmt::Debug for PluginValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginValue::Appender(_) => f.write_str("PluginValue::Appender(..)"),
            PluginValue::Layout(_) => f.write_str("PluginValue::Layout(..)"),
            PluginValue::Logger(_) => f.write_str("PluginValue::Logger(..)"),
            PluginValue::AppenderRef(_) => f.write_str("PluginValue::AppenderRef(..)"),
        }
    }
}

pub type PluginFactory = fn(&Injector<'_>) -> Result<PluginValue>;

struct PluginDescriptor {
    factory: PluginFactory,
    file: &'static str,
    line: u32,
}

static PLUGINS: Lazy<RwLock<HashMap<(PluginKind, String), PluginDescriptor>>> = Lazy::new(|| {
    let mut m = HashMap::new();
    let mut seed = |kind, name: &str, factory| {
        m.insert(
            (kind, name.to_string()),
            PluginDescriptor {
                factory,
                file: file!(),
                line: line!(),
            },
        );
    };
    seed(PluginKind::Layout, "TextLayout", text_layout_plugin as PluginFactory);
    seed(PluginKind::Layout, "JSONLayout", json_layout_plugin);
    seed(PluginKind::Appender, "Discard", discard_plugin);
    seed(PluginKind::Appender, "Console", console_plugin);
    seed(PluginKind::Appender, "File", file_plugin);
    seed(PluginKind::Appender, "RollingFile", rolling_file_plugin);
    seed(PluginKind::Appender, "LayoutAppender", layout_appender_plugin);
    seed(PluginKind::Appender, "LevelFilterAppender", level_filter_plugin);
    seed(PluginKind::Appender, "MultiAppender", multi_appender_plugin);
    seed(PluginKind::AppenderRef, "AppenderRef", appender_ref_plugin);
    seed(PluginKind::Logger, "Logger", sync_logger_plugin);
    seed(PluginKind::Logger, "AsyncLogger", async_logger_plugin);
    RwLock::new(m)
});

/// Register a plugin under `(kind, name)`.
///
/// Called from startup code, before refresh. Registering a name twice in
/// the same namespace panics, reporting both registration sites.
#[track_caller]
pub fn register_plugin(name: &str, kind: PluginKind, factory: PluginFactory) {
    let loc = Location::caller();
    let mut plugins = PLUGINS.write();
    if let Some(prev) = plugins.get(&(kind, name.to_string())) {
        panic!(
            "duplicate plugin {} in {}:{} and {}:{}",
            name,
            prev.file,
            prev.line,
            loc.file(),
            loc.line()
        );
    }
    plugins.insert(
        (kind, name.to_string()),
        PluginDescriptor {
            factory,
            file: loc.file(),
            line: loc.line(),
        },
    );
}

/// Instantiate the named plugin against a configuration prefix.
pub fn new_plugin(
    kind: PluginKind,
    name: &str,
    storage: &Storage,
    prefix: &str,
) -> Result<PluginValue> {
    let factory = {
        let plugins = PLUGINS.read();
        let Some(desc) = plugins.get(&(kind, name.to_string())) else {
            return Err(LogError::PluginNotFound(name.to_string()));
        };
        desc.factory
    };
    factory(&Injector {
        storage,
        prefix: prefix.to_string(),
    })
    .map_err(|e| e.wrap(format!("create plugin {name} error")))
}

// ---------------------------------------------------------------------------
// converters

type ConverterMap = HashMap<TypeId, Box<dyn Any + Send + Sync>>;

static CONVERTERS: Lazy<RwLock<ConverterMap>> = Lazy::new(|| {
    let mut m = ConverterMap::new();
    let mut seed = |id, f: Box<dyn Any + Send + Sync>| {
        m.insert(id, f);
    };
    seed(
        TypeId::of::<Level>(),
        Box::new(super::level::parse_level as fn(&str) -> Result<Level>),
    );
    seed(
        TypeId::of::<LevelRange>(),
        Box::new(LevelRange::parse as fn(&str) -> Result<LevelRange>),
    );
    seed(
        TypeId::of::<BufferFullPolicy>(),
        Box::new(BufferFullPolicy::parse as fn(&str) -> Result<BufferFullPolicy>),
    );
    seed(
        TypeId::of::<RotateStrategy>(),
        Box::new(parse_rotate_strategy as fn(&str) -> Result<RotateStrategy>),
    );
    seed(
        TypeId::of::<HumanizeBytes>(),
        Box::new(parse_humanize_bytes as fn(&str) -> Result<HumanizeBytes>),
    );
    RwLock::new(m)
});

/// Register a string-to-`T` converter used for attributes of type `T`,
/// preferred over the primitive parsing rules.
pub fn register_converter<T: 'static>(f: fn(&str) -> Result<T>) {
    CONVERTERS.write().insert(TypeId::of::<T>(), Box::new(f));
}

fn converter_for<T: 'static>() -> Option<fn(&str) -> Result<T>> {
    CONVERTERS
        .read()
        .get(&TypeId::of::<T>())
        .and_then(|f| f.downcast_ref::<fn(&str) -> Result<T>>())
        .copied()
}

// ---------------------------------------------------------------------------
// properties

type PropertySetter = Arc<dyn Fn(&str) -> Result<()> + Send + Sync>;

static PROPERTIES: Lazy<RwLock<HashMap<String, PropertySetter>>> = Lazy::new(|| {
    let mut m: HashMap<String, PropertySetter> = HashMap::new();
    m.insert(
        "bufferCap".to_string(),
        Arc::new(|v: &str| {
            let bytes = parse_humanize_bytes(v)
                .map_err(|e| e.wrap(format!("invalid bufferCap: {v:?}")))?;
            layout::set_buffer_cap(bytes.0 as usize);
            Ok(())
        }),
    );
    RwLock::new(m)
});

/// Register a setter invoked during refresh with the value found at the
/// camel-cased key, if present.
pub fn register_property(
    key: &str,
    setter: impl Fn(&str) -> Result<()> + Send + Sync + 'static,
) {
    PROPERTIES
        .write()
        .insert(key.to_string(), Arc::new(setter));
}

pub(crate) fn properties_snapshot() -> Vec<(String, PropertySetter)> {
    let props = PROPERTIES.read();
    let mut entries: Vec<(String, PropertySetter)> = props
        .iter()
        .map(|(k, v)| (k.clone(), Arc::clone(v)))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

// ---------------------------------------------------------------------------
// attribute parsing

/// Attribute target types parseable without a registered converter.
pub trait FromAttr: Sized + 'static {
    fn from_attr(s: &str) -> Result<Self>;
}

impl FromAttr for String {
    fn from_attr(s: &str) -> Result<Self> {
        Ok(s.to_string())
    }
}

impl FromAttr for bool {
    fn from_attr(s: &str) -> Result<Self> {
        s.parse()
            .map_err(|_| LogError::config(format!("invalid bool {s:?}")))
    }
}

macro_rules! impl_from_attr_int {
    ($($t:ty),+) => {$(
        impl FromAttr for $t {
            fn from_attr(s: &str) -> Result<Self> {
                let r = if let Some(hex) = s.strip_prefix("0x") {
                    <$t>::from_str_radix(hex, 16)
                } else {
                    s.parse()
                };
                r.map_err(|_| LogError::config(format!("invalid integer {s:?}")))
            }
        }
    )+};
}

impl_from_attr_int!(i32, i64, u32, u64, usize);

impl FromAttr for f64 {
    fn from_attr(s: &str) -> Result<Self> {
        s.parse()
            .map_err(|_| LogError::config(format!("invalid float {s:?}")))
    }
}

// Converter-backed attribute types.
macro_rules! impl_from_attr_converted {
    ($($t:ty),+) => {$(
        impl FromAttr for $t {
            fn from_attr(s: &str) -> Result<Self> {
                match converter_for::<$t>() {
                    Some(f) => f(s),
                    None => Err(LogError::config(format!(
                        "no converter for attribute value {s:?}"
                    ))),
                }
            }
        }
    )+};
}

impl_from_attr_converted!(Level, LevelRange, BufferFullPolicy, RotateStrategy, HumanizeBytes);

// ---------------------------------------------------------------------------
// injector

/// Resolves a plugin's attributes and nested elements against the flat
/// configuration at a given prefix.
pub struct Injector<'a> {
    storage: &'a Storage,
    prefix: String,
}

impl<'a> Injector<'a> {
    pub fn new(storage: &'a Storage, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    /// The special `name` attribute: the last dotted segment of the prefix.
    pub fn name(&self) -> String {
        self.prefix
            .rsplit('.')
            .next()
            .unwrap_or(&self.prefix)
            .to_string()
    }

    /// Resolve an attribute: prefix lookup, then the default, then `${…}`
    /// substitution, then converter or primitive parsing.
    pub fn attr<T: FromAttr>(&self, name: &str, default: Option<&str>) -> Result<T> {
        let key = format!("{}.{}", self.prefix, to_camel_key(name));
        let raw = match self.storage.get(&key) {
            Some(v) => v,
            None => default.ok_or_else(|| {
                LogError::config(format!("found no attribute '{name}' at {}", self.prefix))
            })?,
        };
        let raw = raw.trim();
        let resolved = if let Some(inner) = raw
            .strip_prefix("${")
            .and_then(|r| r.strip_suffix('}'))
        {
            self.storage
                .get(&to_camel_key(inner))
                .ok_or_else(|| LogError::config(format!("property {raw} not found")))?
        } else {
            raw
        };
        let parse = converter_for::<T>().unwrap_or(T::from_attr);
        parse(resolved).map_err(|e| e.wrap(format!("inject attribute '{name}' error")))
    }

    // Resolve the concrete plugin name for a scalar element.
    fn element_type(&self, key: &str, default: Option<&str>) -> Result<Option<String>> {
        if self.storage.has(key) {
            match self.storage.get(&format!("{key}.type")) {
                Some(t) => Ok(Some(t.to_string())),
                None => Err(LogError::config("attribute 'type' not found")),
            }
        } else {
            Ok(default.map(str::to_string))
        }
    }

    /// Build the scalar element of the given kind, or fail when neither
    /// configuration nor a default names a plugin.
    pub fn element(
        &self,
        kind: PluginKind,
        default: Option<&str>,
    ) -> Result<PluginValue> {
        self.element_opt(kind, default)?.ok_or_else(|| {
            LogError::config(format!(
                "found no plugin element '{}' at {}",
                kind.as_str(),
                self.prefix
            ))
        })
    }

    /// Like [`Injector::element`], but absence is legal.
    pub fn element_opt(
        &self,
        kind: PluginKind,
        default: Option<&str>,
    ) -> Result<Option<PluginValue>> {
        let key = format!("{}.{}", self.prefix, to_camel_key(kind.as_str()));
        match self.element_type(&key, default)? {
            Some(type_name) => Ok(Some(new_plugin(kind, &type_name, self.storage, &key)?)),
            None => Ok(None),
        }
    }

    /// Build the collection element of the given kind: `<prefix>.<kind>[i]`
    /// entries, or a single unindexed entry. Each entry's `type` attribute
    /// (or the kind itself) selects the class.
    pub fn elements(&self, kind: PluginKind) -> Result<Vec<PluginValue>> {
        let key = format!("{}.{}", self.prefix, to_camel_key(kind.as_str()));
        // An entry without an explicit type is an instance of the kind.
        let entry_type = |sub_key: &str| {
            self.storage
                .get(&format!("{sub_key}.type"))
                .unwrap_or(kind.as_str())
                .to_string()
        };
        let mut out = Vec::new();
        if self.storage.has(&format!("{key}[0]")) {
            let mut i = 0;
            loop {
                let sub_key = format!("{key}[{i}]");
                if !self.storage.has(&sub_key) {
                    break;
                }
                out.push(new_plugin(kind, &entry_type(&sub_key), self.storage, &sub_key)?);
                i += 1;
            }
        } else if self.storage.has(&key) {
            out.push(new_plugin(kind, &entry_type(&key), self.storage, &key)?);
        }
        Ok(out)
    }

    pub fn layout_element(&self, default: Option<&str>) -> Result<Box<dyn Layout>> {
        match self.element(PluginKind::Layout, default)? {
            PluginValue::Layout(l) => Ok(l),
            _ => Err(LogError::config("element is not a layout")),
        }
    }

    pub fn layout_element_opt(&self) -> Result<Option<Box<dyn Layout>>> {
        match self.element_opt(PluginKind::Layout, None)? {
            Some(PluginValue::Layout(l)) => Ok(Some(l)),
            Some(_) => Err(LogError::config("element is not a layout")),
            None => Ok(None),
        }
    }

    pub fn appender_element(&self) -> Result<Arc<dyn Appender>> {
        match self.element(PluginKind::Appender, None)? {
            PluginValue::Appender(a) => Ok(a),
            _ => Err(LogError::config("element is not an appender")),
        }
    }

    pub fn appender_elements(&self) -> Result<Vec<Arc<dyn Appender>>> {
        self.elements(PluginKind::Appender)?
            .into_iter()
            .map(|v| match v {
                PluginValue::Appender(a) => Ok(a),
                _ => Err(LogError::config("element is not an appender")),
            })
            .collect()
    }

    pub fn appender_ref_elements(&self) -> Result<Vec<AppenderRef>> {
        self.elements(PluginKind::AppenderRef)?
            .into_iter()
            .map(|v| match v {
                PluginValue::AppenderRef(r) => Ok(r),
                _ => Err(LogError::config("element is not an appender ref")),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// built-in factories

fn text_layout_plugin(inj: &Injector<'_>) -> Result<PluginValue> {
    Ok(PluginValue::Layout(Box::new(TextLayout {
        file_line_length: inj.attr("fileLineLength", Some("48"))?,
        separator: inj.attr("separator", Some(DEFAULT_SEPARATOR))?,
    })))
}

fn json_layout_plugin(inj: &Injector<'_>) -> Result<PluginValue> {
    Ok(PluginValue::Layout(Box::new(JsonLayout {
        file_line_length: inj.attr("fileLineLength", Some("48"))?,
    })))
}

fn discard_plugin(inj: &Injector<'_>) -> Result<PluginValue> {
    Ok(PluginValue::Appender(Arc::new(DiscardAppender {
        name: inj.name(),
    })))
}

fn console_plugin(inj: &Injector<'_>) -> Result<PluginValue> {
    Ok(PluginValue::Appender(Arc::new(ConsoleAppender {
        name: inj.name(),
        layout: inj.layout_element(Some("TextLayout"))?,
    })))
}

fn file_plugin(inj: &Injector<'_>) -> Result<PluginValue> {
    Ok(PluginValue::Appender(Arc::new(FileAppender::new(
        inj.name(),
        inj.layout_element(Some("TextLayout"))?,
        inj.attr::<String>("fileDir", Some("./logs"))?,
        inj.attr::<String>("fileName", None)?,
    ))))
}

fn rolling_file_plugin(inj: &Injector<'_>) -> Result<PluginValue> {
    Ok(PluginValue::Appender(Arc::new(RollingFileAppender::new(
        inj.name(),
        inj.layout_element(Some("TextLayout"))?,
        inj.attr::<String>("fileDir", Some("./logs"))?,
        inj.attr::<String>("fileName", None)?,
        inj.attr("rotation", None)?,
        inj.attr("maxAge", None)?,
    ))))
}

fn layout_appender_plugin(inj: &Injector<'_>) -> Result<PluginValue> {
    Ok(PluginValue::Appender(Arc::new(LayoutAppender {
        name: inj.name(),
        layout: inj.layout_element(Some("TextLayout"))?,
        appender: inj.appender_element()?,
    })))
}

fn level_filter_plugin(inj: &Injector<'_>) -> Result<PluginValue> {
    Ok(PluginValue::Appender(Arc::new(LevelFilterAppender {
        name: inj.name(),
        level: inj.attr("level", Some(""))?,
        appender: inj.appender_element()?,
    })))
}

fn multi_appender_plugin(inj: &Injector<'_>) -> Result<PluginValue> {
    let appenders = inj.appender_elements()?;
    if appenders.is_empty() {
        return Err(LogError::config(format!(
            "found no plugin element 'Appender' at {}",
            inj.prefix
        )));
    }
    Ok(PluginValue::Appender(Arc::new(MultiAppender {
        name: inj.name(),
        appenders,
    })))
}

fn appender_ref_plugin(inj: &Injector<'_>) -> Result<PluginValue> {
    Ok(PluginValue::AppenderRef(AppenderRef::new(
        inj.attr::<String>("ref", None)?,
        inj.attr("level", Some(""))?,
    )))
}

fn base_logger(inj: &Injector<'_>) -> Result<BaseLogger> {
    Ok(BaseLogger::new(
        inj.name(),
        inj.attr("level", None)?,
        inj.attr::<String>("tags", Some(""))?,
        inj.appender_ref_elements()?,
        inj.layout_element_opt()?,
    ))
}

fn sync_logger_plugin(inj: &Injector<'_>) -> Result<PluginValue> {
    Ok(PluginValue::Logger(Arc::new(SyncLogger::new(base_logger(
        inj,
    )?))))
}

fn async_logger_plugin(inj: &Injector<'_>) -> Result<PluginValue> {
    Ok(PluginValue::Logger(Arc::new(AsyncLogger::new(
        base_logger(inj)?,
        inj.attr("bufferSize", Some("10000"))?,
        inj.attr("bufferFullPolicy", Some("Discard"))?,
    ))))
}
