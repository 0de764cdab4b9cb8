//! Dotted-key configuration store with three layers of precedence:
//! built-in defaults, a config file, then `-o` overrides — each layer
//! applied as a plain map overwrite, so the last write to a key always
//! wins (the override-idempotence property: applying the same key twice
//! keeps only the final value).

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration key '{key}' is not set")]
    Missing { key: String },

    #[error("configuration key '{key}' has value '{value}' which cannot be parsed as the requested type")]
    Parse { key: String, value: String },

    #[error("malformed override '{entry}': expected NAME=VALUE")]
    MalformedOverride { entry: String },

    #[error("cannot read configuration file '{path}': {reason}")]
    Io { path: String, reason: String },
}

/// Dotted keys to raw string values. Serializable so `-d`/`--dump-configuration`
/// can hand the resolved store to `serde_json` (or any other `serde` format)
/// instead of the driver hand-rolling its own dump syntax.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ConfigStore {
    values: BTreeMap<String, String>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a built-in default. Called by each component at wiring
    /// time, before any file or override is applied, so later layers can
    /// freely shadow it.
    pub fn register_default(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_insert_with(|| value.into());
    }

    fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Loads `name = value` lines from a config file's text, `#`
    /// comments and blank lines ignored. Each line overwrites whatever
    /// default or earlier file line set the same key.
    pub fn load_file(&mut self, text: &str) -> Result<(), ConfigError> {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| ConfigError::MalformedOverride { entry: line.to_string() })?;
            self.set(key.trim(), value.trim());
        }
        Ok(())
    }

    /// Applies a single `NAME=VALUE` CLI override, as produced by `-o`.
    pub fn apply_override(&mut self, entry: &str) -> Result<(), ConfigError> {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| ConfigError::MalformedOverride { entry: entry.to_string() })?;
        self.set(key, value);
        Ok(())
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Typed lookup; fails if the key is unset or doesn't parse as `T`.
    pub fn get<T: FromStr>(&self, key: &str) -> Result<T, ConfigError> {
        let raw = self.raw(key).ok_or_else(|| ConfigError::Missing { key: key.to_string() })?;
        raw.parse().map_err(|_| ConfigError::Parse { key: key.to_string(), value: raw.to_string() })
    }

    pub fn get_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Splits a whitespace-separated value into its words, as the
    /// original's `getWordList` does for e.g. `MonitorSampleVariables`.
    pub fn word_list(&self, key: &str) -> Vec<String> {
        self.raw(key).map(|v| v.split_whitespace().map(String::from).collect()).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_shadow_defaults_and_overrides_shadow_both() {
        let mut store = ConfigStore::new();
        store.register_default("MonitorSampleDelay", "1.0");
        store.load_file("MonitorSampleDelay = 0.5\n").unwrap();
        assert_eq!(store.get::<f64>("MonitorSampleDelay").unwrap(), 0.5);

        store.apply_override("MonitorSampleDelay=0.25").unwrap();
        assert_eq!(store.get::<f64>("MonitorSampleDelay").unwrap(), 0.25);
    }

    #[test]
    fn applying_the_same_override_twice_keeps_only_the_last_value() {
        let mut store = ConfigStore::new();
        store.apply_override("x=1").unwrap();
        store.apply_override("x=2").unwrap();
        assert_eq!(store.get::<u32>("x").unwrap(), 2);
    }

    #[test]
    fn missing_key_is_an_error() {
        let store = ConfigStore::new();
        assert!(store.get::<u32>("nope").is_err());
    }

    #[test]
    fn comments_and_blank_lines_are_skipped_in_config_files() {
        let mut store = ConfigStore::new();
        store.load_file("# comment\n\nfoo = bar\n").unwrap();
        assert_eq!(store.raw("foo"), Some("bar"));
    }

    #[test]
    fn word_list_splits_on_whitespace() {
        let mut store = ConfigStore::new();
        store.apply_override("MonitorSampleVariables=kernel.cycle fpu0.queued").unwrap();
        assert_eq!(store.word_list("MonitorSampleVariables"), vec!["kernel.cycle", "fpu0.queued"]);
    }

    #[test]
    fn round_trips_through_serde_json() {
        let mut store = ConfigStore::new();
        store.apply_override("DCacheAssociativity=4").unwrap();
        let json = serde_json::to_string(&store).unwrap();
        let restored: ConfigStore = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.get::<u32>("DCacheAssociativity").unwrap(), 4);
    }
}
