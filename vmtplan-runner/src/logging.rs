//! Logging configuration and subscriber setup.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// `[logging]` section of a plan file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingConfig {
    /// Filter directive in effect: `RUST_LOG` when set, otherwise the configured level.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }

    /// Install the global subscriber. Logs go to stderr so command output on
    /// stdout stays machine readable. A second call is a no-op.
    pub fn init(&self) {
        let builder = fmt()
            .with_env_filter(self.filter())
            .with_writer(std::io::stderr);
        let installed = match self.format {
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.try_init(),
        };
        if installed.is_err() {
            tracing::debug!("tracing subscriber already installed");
        }
    }
}
