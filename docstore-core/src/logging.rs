// logging.rs - tracing setup for embedders and tests
//
// The library only emits `tracing` events; installing a subscriber is left to
// the embedding application. `init_logging` is a convenience for binaries and
// test harnesses that want readable stderr output.

use tracing_subscriber::EnvFilter;

/// Log levels (ordered by severity)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Errors - backend failures surfaced to the caller
    Error,
    /// Warnings - potential issues that don't stop execution
    Warn,
    /// Info - collection lifecycle (create, drop)
    Info,
    /// Debug - one line per public operation
    Debug,
    /// Trace - per-document matching detail
    Trace,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<LogLevel> {
        match s.to_uppercase().as_str() {
            "ERROR" => Some(LogLevel::Error),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "INFO" => Some(LogLevel::Info),
            "DEBUG" => Some(LogLevel::Debug),
            "TRACE" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    /// Convert to the directive string understood by `EnvFilter`
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Warn
    }
}

/// Install a global fmt subscriber writing to stderr
///
/// `RUST_LOG` takes precedence over `level` when it is set. Returns `false`
/// when a global subscriber was already installed (the call is then a no-op).
pub fn init_logging(level: LogLevel) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("docstore_core={}", level.as_str())));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
