//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, validate), and their associated argument structs.
//! Every `run` flag has an environment variable equivalent for container
//! deployments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(
    name = "prom2json-gateway",
    version,
    about = "Serve Prometheus exposition metrics as JSON",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        prom2json-gateway run                           Start with ./config.yaml\n  \
        prom2json-gateway run -c gateway.yaml           Start with a specific config\n  \
        prom2json-gateway validate gateway.yaml         Check a config without starting"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway
    Run(RunArgs),

    /// Validate a config file and its TLS material without starting
    Validate(ValidateArgs),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        prom2json-gateway run                              Use ./config.yaml\n  \
        prom2json-gateway run -c gateway.yaml -p 9000      Override the listen port\n  \
        prom2json-gateway run --pretty -l info             Local dev mode")]
pub struct RunArgs {
    /// Config file path (.yaml, .yml, .json)
    #[arg(short, long = "config-file", env = "CONFIG_FILE", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Listen port (overrides server.port)
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    // -- Logging --
    /// Log level (overrides logging.level)
    #[arg(short, long, env = "LOG_LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Config file to validate
    #[arg(default_value = "config.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    #[default]
    Debug,
    Info,
    Warn,
    /// Also accepts `fatal` and `panic`.
    #[serde(alias = "fatal", alias = "panic")]
    #[value(aliases = ["fatal", "panic"])]
    Error,
    #[serde(alias = "disabled")]
    #[value(alias = "disabled")]
    Off,
}

impl LogLevel {
    #[must_use]
    pub const fn to_level_filter(&self) -> LevelFilter {
        match self {
            Self::Trace => LevelFilter::TRACE,
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warn => LevelFilter::WARN,
            Self::Error => LevelFilter::ERROR,
            Self::Off => LevelFilter::OFF,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}
