//! Logging setup
//!
//! The library itself only emits `tracing` events. Binaries and tests call
//! [`init`] (or [`init_with`]) to install a subscriber. Only the first call
//! installs one; later calls are no-ops.

use std::sync::OnceLock;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static INIT: OnceLock<()> = OnceLock::new();

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line human readable output
    Pretty,
    /// Single-line human readable output
    Compact,
    /// One JSON object per line
    Json,
    /// Pretty in debug builds, JSON in release builds
    #[default]
    Auto,
}

/// Observability configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Filter used when `RUST_LOG` is not set
    pub default_filter: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let default_filter = if cfg!(debug_assertions) {
            "debug,mailhook=trace"
        } else {
            "info"
        };
        Self {
            default_filter: default_filter.to_string(),
            format: LogFormat::Auto,
        }
    }
}

impl ObservabilityConfig {
    /// Create a config with an explicit default filter
    pub fn new(default_filter: impl Into<String>) -> Self {
        Self {
            default_filter: default_filter.into(),
            ..Default::default()
        }
    }

    /// Set the output format
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn resolved_format(&self) -> LogFormat {
        match self.format {
            LogFormat::Auto if cfg!(debug_assertions) => LogFormat::Pretty,
            LogFormat::Auto => LogFormat::Json,
            other => other,
        }
    }
}

/// Initialize logging with defaults
///
/// `RUST_LOG` wins over the built-in filter.
///
/// # Example
///
/// ```rust,no_run
/// use mailhook::observability;
///
/// # fn main() -> anyhow::Result<()> {
/// observability::init()?;
/// tracing::info!("Application started");
/// # Ok(())
/// # }
/// ```
pub fn init() -> anyhow::Result<()> {
    init_with(&ObservabilityConfig::default())
}

/// Initialize logging from an explicit configuration
///
/// Does nothing if logging was already initialized, including by a
/// subscriber installed outside this crate.
///
/// # Errors
///
/// Fails if the default filter does not parse
pub fn init_with(config: &ObservabilityConfig) -> anyhow::Result<()> {
    if INIT.get().is_some() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))?;

    let fmt_layer = match config.resolved_format() {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer().compact().boxed(),
        LogFormat::Pretty | LogFormat::Auto => tracing_subscriber::fmt::layer().pretty().boxed(),
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        tracing::debug!(error = %e, "Global subscriber already installed");
    }
    let _ = INIT.set(());

    Ok(())
}
