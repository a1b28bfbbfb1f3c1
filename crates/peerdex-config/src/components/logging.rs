//! Logging configuration

use serde::{Deserialize, Serialize};

/// Logging configuration consumed by the tracing subscriber setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `peerdex_observer=debug`
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Include the event target (module path) in each line
    pub with_target: bool,
}

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human readable single line
    #[default]
    Text,
    /// Abbreviated single line
    Compact,
    /// Multi-line, for development
    Pretty,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            with_target: true,
        }
    }
}
