//! End-to-end pipeline scenarios
//!
//! Refresh installs process-wide state, so the refreshing tests serialize
//! on a shared lock and tear down with `destroy`. Both tests that build a
//! graph configure loggers named `root` and `myLogger` so the named
//! wrappers used here bind under every configuration.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value as JsonValue;
use tempfile::tempdir;

use taglog::{debugf, msg, Field, LogContext, Logger as _};

static SERIAL: Mutex<()> = Mutex::new(());

#[derive(Clone)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }

    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn fixed_time(_ctx: &LogContext) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
}

fn no_ctx_string(_ctx: &LogContext) -> String {
    String::new()
}

fn trace_fields(ctx: &LogContext) -> Vec<Field> {
    vec![
        Field::string("trace_id", ctx.get_str("trace_id").to_string()),
        Field::string("span_id", ctx.get_str("span_id").to_string()),
    ]
}

fn install_hooks() {
    taglog::set_time_now(fixed_time);
    taglog::set_string_from_context(no_ctx_string);
    taglog::set_fields_from_context(trace_fields);
}

const TS: &str = "2025-06-01T00:00:00.000";
const TRACE_ID: &str = "0a882193682db71edd48044db54cae88";
const SPAN_ID: &str = "50ef0724418c0a66";

fn json_line(level: &str, line: u32, tag: &str, msg: &str) -> String {
    format!(
        "{{\"level\":\"{level}\",\"time\":\"{TS}\",\"fileLine\":\"{}:{line}\",\
         \"tag\":\"{tag}\",\"trace_id\":\"{TRACE_ID}\",\"span_id\":\"{SPAN_ID}\",\
         \"msg\":\"{msg}\"}}\n",
        file!()
    )
}

#[test]
fn tag_routed_pipeline_end_to_end() {
    let _guard = SERIAL.lock().unwrap();
    install_hooks();

    let tag_def = taglog::register_tag("_def");
    let tag_in = taglog::register_tag("_com_request_in");
    let tag_out = taglog::register_tag(&taglog::build_tag("com", "request", "out"));
    let tag_other = taglog::register_tag("_biz_uncovered");

    let root_wrapper = taglog::get_logger(taglog::ROOT_LOGGER_NAME);
    let my_wrapper = taglog::get_logger("myLogger");

    let stdout = SharedBuf::new();
    taglog::set_stdout(Box::new(stdout.clone()));

    // Before refresh every tag is served by the default console logger.
    let ctx = LogContext::new();
    let l_pre = line!() + 1;
    taglog::info(&ctx, tag_def, vec![msg("hello world")]);

    let dir = tempdir().unwrap();
    let json = format!(
        r#"{{
          "bufferSize": 1000,
          "appender": {{
            "file": {{
              "type": "File",
              "fileDir": {dir:?},
              "fileName": "log.txt",
              "layout": {{ "type": "JSONLayout" }}
            }},
            "console": {{ "type": "Console", "layout": {{ "type": "TextLayout" }} }}
          }},
          "logger": {{
            "root": {{
              "type": "Logger",
              "level": "warn",
              "appenderRef": {{ "ref": "console" }}
            }},
            "myLogger": {{
              "type": "AsyncLogger",
              "level": "trace",
              "tags": "_com_request_in,_com_request_*",
              "bufferSize": "${{bufferSize}}",
              "appenderRef": [ {{ "ref": "file" }} ]
            }}
          }}
        }}"#,
        dir = dir.path().display().to_string()
    );
    taglog::refresh_reader(json.as_bytes(), ".json").unwrap();

    // Registration is closed once refresh is done.
    assert!(std::panic::catch_unwind(|| taglog::register_tag("_biz_late")).is_err());
    assert!(std::panic::catch_unwind(|| taglog::get_logger("late")).is_err());

    // Wildcard routing binds the whole _com_request hierarchy to one
    // logger; uncovered tags fall back to root.
    assert!(Arc::ptr_eq(&tag_out.logger(), &tag_in.logger()));
    assert!(Arc::ptr_eq(&tag_other.logger(), &tag_def.logger()));
    assert!(!Arc::ptr_eq(&tag_out.logger(), &tag_def.logger()));

    let ctx = LogContext::new()
        .with_value("trace_id", TRACE_ID)
        .with_value("span_id", SPAN_ID);

    // myLogger covers trace and debug for the _com_request hierarchy.
    let l_trace = line!() + 1;
    taglog::trace(&ctx, tag_out, || vec![msg("hello world")]);
    let l_debug = line!() + 1;
    debugf!(&ctx, tag_out, "hello {}", "world");
    let l_info = line!() + 1;
    taglog::info(&ctx, tag_in, vec![msg("hello world")]);

    // The root logger starts at warn: this info line goes nowhere.
    taglog::info(&ctx, tag_def, vec![msg("hello world")]);

    let l_err = line!() + 1;
    taglog::error(&ctx, tag_def, vec![msg("hello world")]);

    // Map fields expand in sorted key order, without an enclosing key.
    let mut map = HashMap::new();
    map.insert("key2".to_string(), JsonValue::from("value2"));
    map.insert("key1".to_string(), JsonValue::from("value1"));
    let l_map = line!() + 1;
    taglog::error(&ctx, tag_def, vec![Field::from_map(map)]);

    // Named wrappers expose the raw byte surface.
    root_wrapper.write(b"this message is written directly\n");
    my_wrapper.write(b"this message is written directly\n");

    taglog::destroy();

    let expected_stdout = format!(
        "[INFO][{TS}][{file}:{l_pre}] _def||trace_id=||span_id=||msg=hello world\n\
         [ERROR][{TS}][{file}:{l_err}] _def||trace_id={TRACE_ID}||span_id={SPAN_ID}||msg=hello world\n\
         [ERROR][{TS}][{file}:{l_map}] _def||trace_id={TRACE_ID}||span_id={SPAN_ID}||key1=value1||key2=value2\n\
         this message is written directly\n",
        file = file!()
    );
    assert_eq!(stdout.contents(), expected_stdout);

    let expected_file = format!(
        "{}{}{}this message is written directly\n",
        json_line("trace", l_trace, "_com_request_out", "hello world"),
        json_line("debug", l_debug, "_com_request_out", "hello world"),
        json_line("info", l_info, "_com_request_in", "hello world"),
    );
    let content = fs::read_to_string(dir.path().join("log.txt")).unwrap();
    assert_eq!(content, expected_file);

    // Destroyed: tags are back on the default logger, so a fresh refresh
    // in another test starts clean.
}

#[test]
fn async_discard_accounting_over_destroy() {
    let _guard = SERIAL.lock().unwrap();
    install_hooks();

    let tag = taglog::register_tag("_biz_flood");
    let dir = tempdir().unwrap();

    let mut config = HashMap::new();
    for (k, v) in [
        ("appender.console.type", "Console"),
        ("appender.file.type", "File"),
        ("appender.file.fileDir", dir.path().to_str().unwrap()),
        ("appender.file.fileName", "flood.log"),
        ("appender.file.layout.type", "JSONLayout"),
        ("logger.root.type", "Logger"),
        ("logger.root.level", "warn"),
        ("logger.root.appenderRef.ref", "console"),
        ("logger.myLogger.type", "AsyncLogger"),
        ("logger.myLogger.level", "info"),
        ("logger.myLogger.tags", "_biz_flood"),
        ("logger.myLogger.bufferSize", "100"),
        ("logger.myLogger.bufferFullPolicy", "Discard"),
        ("logger.myLogger.appenderRef.ref", "file"),
    ] {
        config.insert(k.to_string(), v.to_string());
    }
    taglog::refresh_config(config).unwrap();

    let logger = tag.logger();
    let ctx = LogContext::new();
    const PRODUCED: usize = 5000;
    for i in 0..PRODUCED {
        taglog::infof!(&ctx, tag, "event {}", i);
    }
    taglog::destroy();

    let content = fs::read_to_string(dir.path().join("flood.log")).unwrap();
    let delivered = content.lines().count();
    let discarded = logger.discard_counter() as usize;
    assert_eq!(
        delivered + discarded,
        PRODUCED,
        "delivered {delivered} + discarded {discarded} must equal {PRODUCED}"
    );
}

#[test]
fn wrapper_appenders_and_rolling_file_compose() {
    let _guard = SERIAL.lock().unwrap();
    install_hooks();

    let tag_def = taglog::register_tag("_def");
    let tag_aux = taglog::register_tag("_biz_aux");
    let dir = tempdir().unwrap();

    let mut config = HashMap::new();
    for (k, v) in [
        ("appender.multi.type", "MultiAppender"),
        ("appender.multi.appender[0].type", "LevelFilterAppender"),
        ("appender.multi.appender[0].level", "error"),
        ("appender.multi.appender[0].appender.type", "File"),
        (
            "appender.multi.appender[0].appender.fileDir",
            dir.path().to_str().unwrap(),
        ),
        ("appender.multi.appender[0].appender.fileName", "errors.log"),
        ("appender.multi.appender[1].type", "File"),
        (
            "appender.multi.appender[1].fileDir",
            dir.path().to_str().unwrap(),
        ),
        ("appender.multi.appender[1].fileName", "all.log"),
        ("appender.rolling.type", "RollingFile"),
        ("appender.rolling.fileDir", dir.path().to_str().unwrap()),
        ("appender.rolling.fileName", "roll.log"),
        ("appender.rolling.rotation", "1h"),
        ("appender.rolling.maxAge", "24"),
        ("logger.root.type", "Logger"),
        ("logger.root.level", "debug"),
        ("logger.root.appenderRef.ref", "multi"),
        ("logger.myLogger.type", "Logger"),
        ("logger.myLogger.level", "info"),
        ("logger.myLogger.tags", "_biz_aux"),
        ("logger.myLogger.appenderRef.ref", "rolling"),
    ] {
        config.insert(k.to_string(), v.to_string());
    }
    taglog::refresh_config(config).unwrap();

    let ctx = LogContext::new();
    taglog::warn(&ctx, tag_def, vec![msg("warned")]);
    taglog::error(&ctx, tag_def, vec![msg("failed")]);
    taglog::info(&ctx, tag_aux, vec![msg("rolled")]);

    taglog::destroy();

    let all = fs::read_to_string(dir.path().join("all.log")).unwrap();
    assert_eq!(all.lines().count(), 2);
    assert!(all.contains("msg=warned"));
    assert!(all.contains("msg=failed"));

    // The level filter only forwards [error, max).
    let errors = fs::read_to_string(dir.path().join("errors.log")).unwrap();
    assert_eq!(errors.lines().count(), 1);
    assert!(errors.contains("msg=failed"));

    let rolled: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_str().unwrap().to_string())
        .filter(|n| n.starts_with("roll.log."))
        .collect();
    assert_eq!(rolled.len(), 1);
    let content = fs::read_to_string(dir.path().join(&rolled[0])).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(content.contains("msg=rolled"));
}

#[test]
fn invalid_utf8_bytes_render_as_replacement_escapes() {
    // Layout-level check, no global state involved.
    let layout = taglog::core::JsonLayout::default();
    let mut e = taglog::Event::default();
    e.level = taglog::ERROR;
    e.time = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    e.file = "file.rs";
    e.line = 1;
    e.tag = "_def";
    e.fields
        .push(Field::string_bytes("msg", vec![0x80, 0xC2, 0xED, 0xA0, 0x08]));

    let out = String::from_utf8(taglog::Layout::to_bytes(&layout, &e)).unwrap();
    assert!(
        out.contains("\"msg\":\"\\ufffd\\ufffd\\ufffd\\ufffd\\u0008\""),
        "{out}"
    );
}
