//! Flattened configuration substrate
//!
//! The pipeline is wired from a flat mapping of dotted camelCase keys to
//! string values; how that map is produced (properties files, JSON, an
//! external parser) is opaque to the engine.

use std::collections::{BTreeMap, HashMap};

use super::error::{LogError, Result};

/// Flat key/value store with dotted-path structure on top.
#[derive(Debug, Default, Clone)]
pub struct Storage {
    data: BTreeMap<String, String>,
}

impl Storage {
    /// Build a storage from a raw map, normalizing keys to camelCase.
    pub fn from_map(map: HashMap<String, String>) -> Self {
        let mut data = BTreeMap::new();
        for (k, v) in map {
            data.insert(to_camel_key(&k), v);
        }
        Self { data }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// Whether a value exists at the key, or the key is the prefix of a
    /// nested branch.
    pub fn has(&self, key: &str) -> bool {
        if self.data.contains_key(key) {
            return true;
        }
        self.branch_keys(key).next().is_some()
    }

    /// Enumerate the distinct child names directly under a prefix.
    ///
    /// A plain value stored at the prefix itself conflicts with treating
    /// it as a section.
    pub fn sub_keys(&self, prefix: &str) -> Result<Vec<String>> {
        if self.data.contains_key(prefix) {
            return Err(LogError::config(format!(
                "property conflict at path {prefix}"
            )));
        }
        let mut names: Vec<String> = Vec::new();
        for rest in self.branch_keys(prefix) {
            let end = rest
                .find(['.', '['])
                .unwrap_or(rest.len());
            let name = &rest[..end];
            if !name.is_empty() && names.iter().all(|n| n != name) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    // Iterate the tails of keys nested under `prefix.`.
    fn branch_keys<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        let branch = format!("{prefix}.");
        self.data
            .range(branch.clone()..)
            .take_while(move |(k, _)| k.starts_with(&branch))
            .map(move |(k, _)| &k[prefix.len() + 1..])
    }
}

/// Convert a key like `buffer_full-policy` into `bufferFullPolicy`.
///
/// The first character and the character following each dot are
/// lowercased; `-` and `_` are dropped and uppercase the next character.
/// Already-camel keys pass through unchanged.
pub fn to_camel_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut lower_next = false;
    let mut upper_next = false;
    for (i, c) in key.chars().enumerate() {
        if i == 0 {
            out.push(c.to_ascii_lowercase());
            continue;
        }
        match c {
            '.' => {
                lower_next = true;
                out.push(c);
            }
            '-' | '_' => {
                upper_next = true;
            }
            _ if lower_next => {
                out.push(c.to_ascii_lowercase());
                lower_next = false;
            }
            _ if upper_next => {
                out.push(c.to_ascii_uppercase());
                upper_next = false;
            }
            _ => out.push(c),
        }
    }
    out
}

/// Byte size parsed from humanized `B`/`KB`/`MB` notation, 1024-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanizeBytes(pub u64);

/// Parse `"1024B"`, `"1KB"`, `"2MB"`; unit names are case-insensitive and
/// may be separated from the number by spaces.
pub fn parse_humanize_bytes(s: &str) -> Result<HumanizeBytes> {
    let s = s.trim();
    let split = s
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(s.len());
    let (num, unit) = s.split_at(split);
    let num = num.trim();
    let n: u64 = num
        .parse()
        .map_err(|_| LogError::config(format!("invalid size number: {num:?}")))?;
    let factor = match unit.trim().to_uppercase().as_str() {
        "B" => 1,
        "KB" => 1024,
        "MB" => 1024 * 1024,
        other => {
            return Err(LogError::config(format!(
                "unhandled size name: {other:?}"
            )))
        }
    };
    Ok(HumanizeBytes(n * factor))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(pairs: &[(&str, &str)]) -> Storage {
        Storage::from_map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn to_camel_key_conversions() {
        assert_eq!(to_camel_key("foo_bar-baz"), "fooBarBaz");
        assert_eq!(to_camel_key("buffer_size"), "bufferSize");
        assert_eq!(to_camel_key("Appender.File.Type"), "appender.file.type");
        assert_eq!(to_camel_key(""), "");
    }

    #[test]
    fn to_camel_key_is_idempotent_on_camel_keys() {
        for k in [
            "logger.root.appenderRef.ref",
            "appender.file.fileName",
            "bufferFullPolicy",
        ] {
            assert_eq!(to_camel_key(k), k);
            assert_eq!(to_camel_key(&to_camel_key(k)), k);
        }
    }

    #[test]
    fn sub_keys_enumerates_children() {
        let s = storage(&[
            ("appender.file.type", "File"),
            ("appender.file.fileName", "log.txt"),
            ("appender.console.type", "Console"),
            ("logger.root.type", "Logger"),
            ("logger.myLogger.appenderRef[0].ref", "file"),
        ]);
        assert_eq!(s.sub_keys("appender").unwrap(), vec!["console", "file"]);
        assert_eq!(s.sub_keys("logger").unwrap(), vec!["myLogger", "root"]);
        assert_eq!(s.sub_keys("missing").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn sub_keys_detects_leaf_conflict() {
        let s = storage(&[("appender", "ERROR_PROPERTY")]);
        assert_eq!(
            s.sub_keys("appender").unwrap_err().to_string(),
            "property conflict at path appender"
        );
    }

    #[test]
    fn has_sees_both_leaves_and_branches() {
        let s = storage(&[("a.b.c", "1")]);
        assert!(s.has("a.b.c"));
        assert!(s.has("a.b"));
        assert!(s.has("a"));
        assert!(!s.has("a.b.c.d"));
        assert!(!s.has("x"));
    }

    #[test]
    fn humanize_bytes_table() {
        assert_eq!(parse_humanize_bytes("1024B").unwrap(), HumanizeBytes(1024));
        assert_eq!(parse_humanize_bytes("1KB").unwrap(), HumanizeBytes(1024));
        assert_eq!(
            parse_humanize_bytes("2MB").unwrap(),
            HumanizeBytes(2 * 1024 * 1024)
        );
        assert_eq!(parse_humanize_bytes("1kb").unwrap(), HumanizeBytes(1024));
        assert_eq!(parse_humanize_bytes("1 KB").unwrap(), HumanizeBytes(1024));
        assert_eq!(parse_humanize_bytes("1KB ").unwrap(), HumanizeBytes(1024));
    }

    #[test]
    fn humanize_bytes_errors() {
        assert!(parse_humanize_bytes("abcKB").is_err());
        assert_eq!(
            parse_humanize_bytes("1024").unwrap_err().to_string(),
            "unhandled size name: \"\""
        );
        assert_eq!(
            parse_humanize_bytes("1GB").unwrap_err().to_string(),
            "unhandled size name: \"GB\""
        );
    }
}
