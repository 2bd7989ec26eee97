//! Tracing subscriber setup.

use crate::error::{Error, Result};
use std::str::FromStr;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event
    Json,
    /// Human-readable lines
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(Error::Config {
                key: "APP_LOG_FORMAT".to_string(),
                reason: format!("expected json or pretty, got {other:?}"),
            }),
        }
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` directives apply on top of `strata_core=info`. Calling this
/// again after a subscriber is installed does nothing.
pub fn init_tracing(format: LogFormat) {
    let filter = match "strata_core=info".parse::<Directive>() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
}
