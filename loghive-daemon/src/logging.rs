//! Process-wide tracing setup.
//!
//! `[general].log_format` selects the output layer and `[general].log_level`
//! the default filter. A set `RUST_LOG` replaces the filter as a whole.

use std::str::FromStr;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use loghive_core::config::GeneralConfig;

/// Client libraries held at `warn` when the daemon itself runs at debug/trace.
const CHATTY_TARGETS: &[&str] = &["hyper=warn", "reqwest=warn", "rdkafka=warn", "redis=warn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    /// One JSON object per line, for log shippers.
    Json,
    /// Multi-line colored output for a terminal.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => anyhow::bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
        }
    }
}

fn default_filter(level: &str) -> Result<EnvFilter> {
    let mut filter =
        EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'"))?;
    if matches!(level, "debug" | "trace") {
        for directive in CHATTY_TARGETS {
            filter = filter.add_directive(directive.parse()?);
        }
    }
    Ok(filter)
}

/// Install the global subscriber. Call once, before the first event.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let format: LogFormat = config.log_format.parse()?;
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => default_filter(&config.log_level)?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };
    installed.context("tracing subscriber already installed")
}
