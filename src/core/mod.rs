//! Core pipeline types: data model, dispatchers and configuration

pub mod config;
pub mod encoder;
pub mod error;
pub mod event;
pub mod field;
pub mod layout;
pub mod level;
pub mod logger;
pub mod plugin;
pub mod reader;
pub mod record;
pub mod refresh;
pub mod tag;

pub use config::{parse_humanize_bytes, to_camel_key, HumanizeBytes, Storage};
pub use encoder::{Encoder, JsonEncoder, TextEncoder};
pub use error::{LogError, Result};
pub use event::{get_event, pool_counters, put_event, Event};
pub use field::{encode_fields, msg, ArrayValue, Field, FieldValue, MSG_KEY};
pub use layout::{JsonLayout, Layout, TextLayout, DEFAULT_FILE_LINE_LENGTH};
pub use level::{parse_level, register_level, Level, LevelRange};
pub use logger::{AppenderRef, AsyncLogger, BaseLogger, BufferFullPolicy, Logger, SyncLogger};
pub use plugin::{
    register_converter, register_plugin, register_property, FromAttr, Injector, PluginKind,
    PluginValue,
};
pub use reader::{read_json, read_properties, register_reader, Reader};
pub use record::{
    debug, error, fatal, info, logf, panic, record, set_fields_from_context,
    set_string_from_context, set_time_now, trace, warn, FieldsFromContextFn, LogContext,
    StringFromContextFn, TimeNowFn,
};
pub use refresh::{
    destroy, get_logger, refresh_config, refresh_file, refresh_reader, LoggerWrapper,
    ROOT_LOGGER_NAME,
};
pub use tag::{
    build_tag, is_valid_tag, register_app_tag, register_biz_tag, register_rpc_tag, register_tag,
    Tag,
};
