//! prom2json-gateway serves Prometheus exposition metrics as JSON.
//!
//! Every configured upstream gets its own `GET` path. A request on that
//! path fetches the upstream's exposition text, decodes it into metric
//! families, and answers with them as a JSON array. On SIGTERM / Ctrl+C
//! the server stops accepting, lets in-flight requests finish within a
//! fixed grace period, and reports whether shutdown was clean.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, validate).
//! - [`config`] -- Config file loading, defaulting, and validation.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`gateway`] -- Per-route handlers and the router registry.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`server`] -- Listening socket, accept loop, and graceful shutdown.
//! - [`upstream`] -- Per-upstream HTTP/TLS clients and metric family decoding.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod server;
pub mod upstream;
