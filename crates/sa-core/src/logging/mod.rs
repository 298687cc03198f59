//! Structured logging for the detectors.
//!
//! Output goes to stderr, either human-readable or as JSON lines. The engine
//! itself only emits `tracing` events; hosts that already install a
//! subscriber never need to call [`init_logging`].
//!
//! ```ignore
//! use sa_core::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::from_env(None, None));
//! ```

pub mod config;

pub use config::{LogConfig, LogFormat, LogLevel};

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Stable event names attached to detector log records as the `event` field.
pub mod event_names {
    pub const BURSTS_STARTED: &str = "bursts.started";
    pub const BURSTS_WINDOW_TESTED: &str = "bursts.window_tested";
    pub const BURSTS_FINISHED: &str = "bursts.finished";

    pub const SWINGS_STARTED: &str = "swings.started";
    pub const SWINGS_WINDOW_TESTED: &str = "swings.window_tested";
    pub const SWINGS_PROFILES_BUILT: &str = "swings.profiles_built";
    pub const SWINGS_FINISHED: &str = "swings.finished";

    pub const CALIBRATION_WINDOW_SIMULATED: &str = "calibration.window_simulated";
    pub const CALIBRATION_TRUNCATED: &str = "calibration.truncated";
    pub const CALIBRATION_FAILED: &str = "calibration.failed";
    pub const POLICY_FALLBACK: &str = "policy.fallback";
}

/// Install the global subscriber.
///
/// `RUST_LOG` directives, when present, replace the filter built from
/// `config`. A second call keeps the first subscriber.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.directive()));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Human => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal());
            if config.timestamps {
                registry.with(layer).try_init()
            } else {
                registry.with(layer.without_time()).try_init()
            }
        }
        LogFormat::Jsonl => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
    };
    if installed.is_ok() {
        tracing::debug!(format = %config.format, level = %config.level, "logging initialised");
    }
}

/// Initialize logging from the environment (for tests and simple hosts).
pub fn init_default_logging() {
    init_logging(&LogConfig::from_env(None, None));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_logging(&LogConfig::default().with_level(LogLevel::Off));
        init_default_logging();
        tracing::info!(event = event_names::BURSTS_STARTED, "still usable");
    }

    #[test]
    fn event_names_are_namespaced() {
        for name in [
            event_names::BURSTS_FINISHED,
            event_names::SWINGS_FINISHED,
            event_names::CALIBRATION_TRUNCATED,
            event_names::POLICY_FALLBACK,
        ] {
            assert!(name.contains('.'), "{name} should be dotted");
        }
    }
}
