//! Structured logging setup using the `tracing` ecosystem.
//!
//! Configures a `tracing-subscriber` from the `logging` config section:
//! JSON or pretty output, a level filter, optional caller location, and a
//! timer that renders the configured [`TimeFormat`]. `--json` / `--pretty`
//! on the command line take precedence over `json_format`.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::model::{LoggingConfig, TimeFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[must_use]
pub const fn resolve_format(config: &LoggingConfig, pretty: bool, json: bool) -> LogFormat {
    if json {
        LogFormat::Json
    } else if pretty {
        LogFormat::Pretty
    } else if config.json_format {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    }
}

/// Event timestamp in the configured [`TimeFormat`].
#[derive(Debug, Clone, Copy)]
pub struct Timestamp(pub TimeFormat);

impl FormatTime for Timestamp {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let since_epoch = || SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        match self.0 {
            TimeFormat::Rfc3339 => fmt::time::SystemTime.format_time(w),
            TimeFormat::Unix => write!(w, "{}", since_epoch().as_secs()),
            TimeFormat::UnixMs => write!(w, "{}", since_epoch().as_millis()),
            TimeFormat::UnixMicro => write!(w, "{}", since_epoch().as_micros()),
        }
    }
}

pub fn init(config: &LoggingConfig, format: LogFormat) {
    let filter = tracing_subscriber::filter::Targets::new()
        .with_default(config.level.to_level_filter());
    let timer = Timestamp(config.time_format);

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_timer(timer)
                        .with_target(false)
                        .with_file(config.with_caller)
                        .with_line_number(config.with_caller),
                )
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .pretty()
                        .with_timer(timer)
                        .with_file(config.with_caller)
                        .with_line_number(config.with_caller),
                )
                .init();
        }
    }
}
