//! Severity levels and half-open level ranges

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::error::{LogError, Result};

/// No logging
pub const NONE: Level = Level::new(0, "NONE");
/// Very detailed logging, typically for debugging at a granular level
pub const TRACE: Level = Level::new(100, "TRACE");
/// Debugging information
pub const DEBUG: Level = Level::new(200, "DEBUG");
/// General informational messages
pub const INFO: Level = Level::new(300, "INFO");
/// Warnings that may indicate a potential problem
pub const WARN: Level = Level::new(400, "WARN");
/// Errors that allow the application to continue running
pub const ERROR: Level = Level::new(500, "ERROR");
/// Severe issues that may lead to a panic
pub const PANIC: Level = Level::new(600, "PANIC");
/// Critical issues that will cause application termination
pub const FATAL: Level = Level::new(700, "FATAL");
/// Upper bound of the severity scale, never produced by a log call
pub const MAX: Level = Level::new(999, "MAX");

static LEVELS: Lazy<RwLock<HashMap<String, Level>>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for l in [NONE, TRACE, DEBUG, INFO, WARN, ERROR, PANIC, FATAL, MAX] {
        m.insert(l.name.to_string(), l);
    }
    RwLock::new(m)
});

/// A logging severity level.
///
/// Each level pairs a numeric code, used for ordering and comparison, with
/// an uppercase name used for parsing and rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    code: i32,
    name: &'static str,
}

impl Level {
    const fn new(code: i32, name: &'static str) -> Self {
        Self { code, name }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl PartialOrd for Level {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Level {
    fn cmp(&self, other: &Self) -> Ordering {
        self.code.cmp(&other.code)
    }
}

/// Register a custom level so that `parse_level` can resolve it.
///
/// The name is stored uppercased. Registering an existing name replaces it.
pub fn register_level(code: i32, name: &str) -> Level {
    let name: &'static str = Box::leak(name.to_uppercase().into_boxed_str());
    let l = Level::new(code, name);
    LEVELS.write().insert(name.to_string(), l);
    l
}

/// Convert a string into a registered `Level`, case-insensitively.
pub fn parse_level(s: &str) -> Result<Level> {
    LEVELS
        .read()
        .get(&s.to_uppercase())
        .copied()
        .ok_or_else(|| LogError::InvalidLevel(s.to_string()))
}

/// A half-open severity interval `[min, max)`.
///
/// The empty grammar parses to `[NONE, MAX)`; `"INFO"` to `[INFO, MAX)`;
/// `"INFO~ERROR"` to `[INFO, ERROR)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelRange {
    pub min: Level,
    pub max: Level,
}

impl LevelRange {
    pub fn new(min: Level, max: Level) -> Self {
        Self { min, max }
    }

    /// Whether the level falls inside the interval.
    pub fn enable(&self, level: Level) -> bool {
        self.min.code <= level.code && level.code < self.max.code
    }

    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::default());
        }
        match s.split_once('~') {
            None => Ok(Self::new(parse_level(s)?, MAX)),
            Some((lo, hi)) => Ok(Self::new(parse_level(lo.trim())?, parse_level(hi.trim())?)),
        }
    }

    pub fn format(&self) -> String {
        if self.max == MAX {
            self.min.name.to_string()
        } else {
            format!("{}~{}", self.min, self.max)
        }
    }
}

impl Default for LevelRange {
    fn default() -> Self {
        Self::new(NONE, MAX)
    }
}

impl fmt::Display for LevelRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering() {
        let all = [NONE, TRACE, DEBUG, INFO, WARN, ERROR, PANIC, FATAL, MAX];
        for w in all.windows(2) {
            assert!(w[0] < w[1], "{} must sort below {}", w[0], w[1]);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(parse_level("info").unwrap(), INFO);
        assert_eq!(parse_level("Error").unwrap(), ERROR);
        assert_eq!(parse_level("FATAL").unwrap(), FATAL);
        assert_eq!(
            parse_level("verbose").unwrap_err().to_string(),
            "invalid level verbose"
        );
    }

    #[test]
    fn range_enable_bounds() {
        let r = LevelRange::parse("INFO~ERROR").unwrap();
        assert!(!r.enable(DEBUG));
        assert!(r.enable(INFO));
        assert!(r.enable(WARN));
        assert!(!r.enable(ERROR));
    }

    #[test]
    fn range_parse_grammar() {
        assert_eq!(LevelRange::parse("").unwrap(), LevelRange::new(NONE, MAX));
        assert_eq!(
            LevelRange::parse("info").unwrap(),
            LevelRange::new(INFO, MAX)
        );
        assert_eq!(
            LevelRange::parse("warn~fatal").unwrap(),
            LevelRange::new(WARN, FATAL)
        );
        assert!(LevelRange::parse("bogus").is_err());
        assert!(LevelRange::parse("info~bogus").is_err());
    }

    #[test]
    fn range_format_round_trip() {
        for s in ["NONE", "TRACE", "INFO", "INFO~ERROR", "WARN~PANIC"] {
            let r = LevelRange::parse(s).unwrap();
            assert_eq!(r.format(), s);
            assert_eq!(LevelRange::parse(&r.format()).unwrap(), r);
        }
    }

    #[test]
    fn custom_level_registration() {
        let audit = register_level(450, "audit450");
        assert_eq!(audit.name(), "AUDIT450");
        assert_eq!(parse_level("Audit450").unwrap(), audit);
        assert!(LevelRange::new(WARN, MAX).enable(audit));
    }
}
