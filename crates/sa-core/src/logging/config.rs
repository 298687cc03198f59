//! Logger settings resolved from the environment and host overrides.
//!
//! Precedence, lowest first: defaults, `RUST_LOG`, `SA_LOG`,
//! `SA_LOG_FORMAT`, explicit arguments.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::filter::LevelFilter;

/// Crates whose events the default filter admits.
const AUDIT_TARGETS: [&str; 3] = ["sa_core", "sa_config", "sa_common"];

/// Record layout on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per event, for log shippers.
    Jsonl,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Human => "human",
            LogFormat::Jsonl => "jsonl",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(LogFormat::Human),
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            other => Err(format!("unrecognised log format '{other}'")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verbosity, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-window simulation progress.
    Trace,
    Debug,
    /// Detector summaries.
    #[default]
    Info,
    /// Policy fallbacks and truncated or failed calibration.
    Warn,
    Error,
    Off,
}

const LEVEL_NAMES: [(LogLevel, &str); 6] = [
    (LogLevel::Trace, "trace"),
    (LogLevel::Debug, "debug"),
    (LogLevel::Info, "info"),
    (LogLevel::Warn, "warn"),
    (LogLevel::Error, "error"),
    (LogLevel::Off, "off"),
];

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        LEVEL_NAMES
            .iter()
            .find(|(level, _)| level == self)
            .map_or("info", |(_, name)| name)
    }

    /// Most verbose level named by a `RUST_LOG`-style directive list, e.g.
    /// `warn,sa_core=debug` gives `Debug`. Unparseable entries are skipped.
    pub fn from_directives(directives: &str) -> Option<LogLevel> {
        directives
            .split(',')
            .filter_map(|directive| {
                let level = directive.rsplit('=').next()?;
                level.parse::<LogLevel>().ok()
            })
            .min()
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s == "warning" {
            return Ok(LogLevel::Warn);
        }
        LEVEL_NAMES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(level, _)| *level)
            .ok_or_else(|| format!("unrecognised log level '{s}'"))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

/// Resolved logger settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Prefix human records with a timestamp.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LogLevel::Info,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Settings from the process environment, then `level` / `format`.
    pub fn from_env(level: Option<LogLevel>, format: Option<LogFormat>) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), level, format)
    }

    fn from_lookup<F>(lookup: F, level: Option<LogLevel>, format: Option<LogFormat>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_level = lookup("SA_LOG")
            .and_then(|v| v.parse().ok())
            .or_else(|| lookup("RUST_LOG").and_then(|v| LogLevel::from_directives(&v)));
        let env_format = lookup("SA_LOG_FORMAT").and_then(|v| v.parse().ok());

        let defaults = LogConfig::default();
        LogConfig {
            level: level.or(env_level).unwrap_or(defaults.level),
            format: format.or(env_format).unwrap_or(defaults.format),
            timestamps: defaults.timestamps,
        }
    }

    /// `EnvFilter` directive admitting the audit crates at `level` and
    /// everything else at `warn` or quieter.
    pub fn directive(&self) -> String {
        let others = self.level.max(LogLevel::Warn);
        let mut parts = vec![others.as_str().to_string()];
        parts.extend(
            AUDIT_TARGETS
                .iter()
                .map(|target| format!("{target}={}", self.level)),
        );
        parts.join(",")
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn format_names_round_trip() {
        for format in [LogFormat::Human, LogFormat::Jsonl] {
            assert_eq!(format.to_string().parse::<LogFormat>().unwrap(), format);
        }
        assert_eq!(" JSON ".parse::<LogFormat>().unwrap(), LogFormat::Jsonl);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn level_names_round_trip() {
        for (level, _) in LEVEL_NAMES {
            assert_eq!(level.to_string().parse::<LogLevel>().unwrap(), level);
        }
        assert_eq!("Warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn directives_pick_most_verbose_level() {
        assert_eq!(
            LogLevel::from_directives("warn,sa_core=debug"),
            Some(LogLevel::Debug)
        );
        assert_eq!(LogLevel::from_directives("error"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_directives("sa_core::detect"), None);
    }

    #[test]
    fn sa_log_wins_over_rust_log() {
        let config = LogConfig::from_lookup(
            env(&[("SA_LOG", "error"), ("RUST_LOG", "sa_core=trace")]),
            None,
            None,
        );
        assert_eq!(config.level, LogLevel::Error);

        let config = LogConfig::from_lookup(env(&[("RUST_LOG", "sa_core=trace")]), None, None);
        assert_eq!(config.level, LogLevel::Trace);
    }

    #[test]
    fn arguments_override_environment() {
        let config = LogConfig::from_lookup(
            env(&[("SA_LOG", "warn"), ("SA_LOG_FORMAT", "jsonl")]),
            Some(LogLevel::Trace),
            Some(LogFormat::Human),
        );
        assert_eq!(config.level, LogLevel::Trace);
        assert_eq!(config.format, LogFormat::Human);

        let config = LogConfig::from_lookup(env(&[("SA_LOG", "shouty")]), None, None);
        assert_eq!(config, LogConfig::default());
    }

    #[test]
    fn directive_scopes_verbosity_to_audit_crates() {
        let config = LogConfig::default().with_level(LogLevel::Debug);
        assert_eq!(
            config.directive(),
            "warn,sa_core=debug,sa_config=debug,sa_common=debug"
        );
        let quiet = LogConfig::default().with_level(LogLevel::Off);
        assert!(quiet.directive().starts_with("off,"));
    }
}
