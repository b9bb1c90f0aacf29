//! Centralised tracing initialisation for mspec hosts.
//!
//! Call [`init_tracing`] once at program start to configure the global
//! subscriber with an `EnvFilter` and optional JSON formatting.
//!
//! Safe to call more than once; subsequent calls are silently ignored
//! (the global subscriber can only be set once per process).

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG: &str = "MSPEC_LOG";
pub const ENV_LOG_FORMAT: &str = "MSPEC_LOG_FORMAT";

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    /// Newline-delimited JSON, for log aggregation pipelines.
    Json,
}

impl LogFormat {
    /// `MSPEC_LOG_FORMAT=json` selects JSON; anything else is pretty.
    pub fn from_env() -> Self {
        Self::parse(std::env::var(ENV_LOG_FORMAT).ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initialise the global tracing subscriber.
///
/// The filter comes from `MSPEC_LOG`, then `RUST_LOG`, then falls back to
/// `level`.
pub fn init_tracing(format: LogFormat, level: Level) {
    let env_filter = EnvFilter::try_from_env(ENV_LOG)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_target(false).json())
                .try_init()
                .ok();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_target(false))
                .try_init()
                .ok();
        }
    }
}
