//! Refresh error-path coverage
//!
//! Refresh is one-shot global state, so every test here serializes on a
//! shared lock and cleans up with `destroy` when it succeeds.

use std::collections::HashMap;
use std::sync::Mutex;

use taglog::{destroy, refresh_config, refresh_reader};

static SERIAL: Mutex<()> = Mutex::new(());

fn config(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn refresh_err(pairs: &[(&str, &str)]) -> String {
    refresh_config(config(pairs)).unwrap_err().to_string()
}

const VALID: &[(&str, &str)] = &[
    ("appender.console.type", "Console"),
    ("appender.console.layout.type", "TextLayout"),
    ("logger.root.type", "Logger"),
    ("logger.root.level", "debug"),
    ("logger.root.appenderRef.ref", "console"),
];

#[test]
fn unsupported_file_type() {
    let _guard = SERIAL.lock().unwrap();
    let err = refresh_reader(&b""[..], ".toml").unwrap_err();
    assert_eq!(err.to_string(), "unsupported file type .toml");
}

#[test]
fn appenders_section_not_found() {
    let _guard = SERIAL.lock().unwrap();
    assert_eq!(
        refresh_err(&[("logger.root.type", "Logger")]),
        "appenders section not found"
    );
}

#[test]
fn appenders_section_conflict() {
    let _guard = SERIAL.lock().unwrap();
    assert_eq!(
        refresh_err(&[
            ("appender", "ERROR_PROPERTY"),
            ("logger.root.type", "Logger"),
        ]),
        "read appenders section error << property conflict at path appender"
    );
}

#[test]
fn loggers_section_conflict() {
    let _guard = SERIAL.lock().unwrap();
    assert_eq!(
        refresh_err(&[
            ("appender.console.type", "Console"),
            ("logger", "ERROR_PROPERTY"),
        ]),
        "read loggers section error << property conflict at path logger"
    );
}

#[test]
fn root_logger_missing() {
    let _guard = SERIAL.lock().unwrap();
    assert_eq!(
        refresh_err(&[
            ("appender.console.type", "Console"),
            ("logger.myLogger.type", "Logger"),
        ]),
        "logger 'root' not found"
    );
}

#[test]
fn unknown_appender_plugin() {
    let _guard = SERIAL.lock().unwrap();
    assert_eq!(
        refresh_err(&[
            ("appender.console.type", "NonExistentAppender"),
            ("logger.root.type", "Logger"),
        ]),
        "plugin NonExistentAppender not found"
    );
}

#[test]
fn appender_without_type() {
    let _guard = SERIAL.lock().unwrap();
    assert_eq!(
        refresh_err(&[
            ("appender.console.fileName", "x"),
            ("logger.root.type", "Logger"),
        ]),
        "attribute 'type' not found"
    );
}

#[test]
fn unknown_logger_plugin() {
    let _guard = SERIAL.lock().unwrap();
    let mut pairs = VALID.to_vec();
    pairs.push(("logger.myLogger.type", "NonExistentLogger"));
    assert_eq!(refresh_err(&pairs), "plugin NonExistentLogger not found");
}

#[test]
fn missing_appender_reference() {
    let _guard = SERIAL.lock().unwrap();
    assert_eq!(
        refresh_err(&[
            ("appender.console.type", "Console"),
            ("logger.root.type", "Logger"),
            ("logger.root.level", "debug"),
            ("logger.root.appenderRef.ref", "file"),
        ]),
        "appender file not found"
    );
}

#[test]
fn logger_without_level() {
    let _guard = SERIAL.lock().unwrap();
    let err = refresh_err(&[
        ("appender.console.type", "Console"),
        ("logger.root.type", "Logger"),
        ("logger.root.appenderRef.ref", "console"),
    ]);
    assert_eq!(
        err,
        "create plugin Logger error << found no attribute 'level' at logger.root"
    );
}

#[test]
fn non_root_logger_without_tags() {
    let _guard = SERIAL.lock().unwrap();
    let mut pairs = VALID.to_vec();
    pairs.extend([
        ("logger.myLogger.type", "Logger"),
        ("logger.myLogger.level", "info"),
        ("logger.myLogger.appenderRef.ref", "console"),
    ]);
    assert_eq!(refresh_err(&pairs), "logger must have attribute 'tags'");
}

#[test]
fn root_logger_with_tags() {
    let _guard = SERIAL.lock().unwrap();
    let mut pairs = VALID.to_vec();
    pairs.push(("logger.root.tags", "_app_root"));
    assert_eq!(
        refresh_err(&pairs),
        "root logger must not have attribute 'tags'"
    );
}

#[test]
fn invalid_tag_pattern_leaves_state_untouched() {
    let _guard = SERIAL.lock().unwrap();
    let mut pairs = VALID.to_vec();
    pairs.extend([
        ("logger.myLogger.type", "Logger"),
        ("logger.myLogger.level", "info"),
        ("logger.myLogger.tags", "**"),
        ("logger.myLogger.appenderRef.ref", "console"),
    ]);
    let err = refresh_err(&pairs);
    assert_eq!(err, "invalid tag pattern \"**\" in logger myLogger");

    // The failed refresh rolled the one-shot flag back: a valid refresh
    // still goes through.
    refresh_config(config(VALID)).unwrap();
    destroy();
}

#[test]
fn tag_bound_to_two_loggers() {
    let _guard = SERIAL.lock().unwrap();
    let mut pairs = VALID.to_vec();
    pairs.extend([
        ("logger.loggerA.type", "Logger"),
        ("logger.loggerA.level", "info"),
        ("logger.loggerA.tags", "_biz_shared"),
        ("logger.loggerA.appenderRef.ref", "console"),
        ("logger.loggerB.type", "Logger"),
        ("logger.loggerB.level", "info"),
        ("logger.loggerB.tags", "_biz_shared"),
        ("logger.loggerB.appenderRef.ref", "console"),
    ]);
    assert_eq!(
        refresh_err(&pairs),
        "tag '_biz_shared' already config in logger loggerA"
    );
}

#[test]
fn async_logger_start_failure_unwinds() {
    let _guard = SERIAL.lock().unwrap();
    let mut pairs = VALID.to_vec();
    pairs.extend([
        ("logger.myLogger.type", "AsyncLogger"),
        ("logger.myLogger.level", "info"),
        ("logger.myLogger.tags", "_biz_small"),
        ("logger.myLogger.bufferSize", "10"),
        ("logger.myLogger.appenderRef.ref", "console"),
    ]);
    assert_eq!(
        refresh_err(&pairs),
        "logger myLogger start error << bufferSize is too small"
    );

    refresh_config(config(VALID)).unwrap();
    destroy();
}

#[test]
fn property_injection_failure() {
    let _guard = SERIAL.lock().unwrap();
    let mut pairs = VALID.to_vec();
    pairs.push(("bufferCap", "1GB"));
    assert_eq!(
        refresh_err(&pairs),
        "inject property bufferCap error << invalid bufferCap: \"1GB\" << unhandled size name: \"GB\""
    );
}

#[test]
fn buffer_cap_property_applies() {
    let _guard = SERIAL.lock().unwrap();
    let mut pairs = VALID.to_vec();
    pairs.push(("bufferCap", "1KB"));
    refresh_config(config(&pairs)).unwrap();
    destroy();
}

#[test]
fn placeholder_substitution_reaches_attributes() {
    let _guard = SERIAL.lock().unwrap();
    let mut pairs = VALID.to_vec();
    pairs.extend([
        ("bufferSize", "1000"),
        ("logger.myLogger.type", "AsyncLogger"),
        ("logger.myLogger.level", "info"),
        ("logger.myLogger.tags", "_biz_buffered"),
        ("logger.myLogger.bufferSize", "${bufferSize}"),
        ("logger.myLogger.appenderRef.ref", "console"),
    ]);
    refresh_config(config(&pairs)).unwrap();
    destroy();
}

#[test]
fn second_refresh_fails() {
    let _guard = SERIAL.lock().unwrap();
    refresh_config(config(VALID)).unwrap();
    let err = refresh_config(config(VALID)).unwrap_err();
    assert_eq!(err.to_string(), "log refresh already done");
    destroy();

    // destroy is idempotent while uninitialised
    destroy();
}
