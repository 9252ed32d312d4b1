//! Unified error types for the gateway.
//!
//! Defines [`GatewayError`] (the crate-level error enum surfaced by the
//! subcommands), [`ClientError`] for upstream client construction,
//! [`FetchError`] for per-request upstream failures, [`ServerError`] for
//! the serving lifecycle, and [`ValidationError`] for config validation
//! failures. All enums use `thiserror` for `Display` and `Error` derives.

use std::path::PathBuf;
use std::time::Duration;

use hyper::StatusCode;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub route: String,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  route {}: {}: {}", self.route, self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Cannot build upstream client for route {path}: {source}")]
    Client {
        path: String,
        #[source]
        source: ClientError,
    },

    #[error("Route {path} is registered more than once")]
    DuplicateRoute { path: String },

    #[error("Route '{path}' cannot be mounted: {reason}")]
    InvalidRoute { path: String, reason: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Failure to build an upstream client from its spec.
///
/// Always a startup error: nothing here can happen once serving has begun.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ClientError {
    #[error("'{url}' is not a valid URL: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    #[error("{present} is set but {missing} is not; client certificate and key must be given together")]
    UnpairedKeyPair {
        present: &'static str,
        missing: &'static str,
    },

    #[error("cannot read {}: {source}", path.display())]
    ReadPem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificate found in {}", path.display())]
    NoCertificate { path: PathBuf },

    #[error("no private key found in {}", path.display())]
    NoPrivateKey { path: PathBuf },

    #[error("TLS configuration rejected: {0}")]
    Tls(#[from] rustls::Error),
}

/// A single failed upstream fetch.
///
/// Callers log it and answer with a generic error; the variants exist for
/// the log line, not for branching.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FetchError {
    #[error("failed to build upstream request: {0}")]
    Request(#[from] http::Error),

    #[error("upstream request failed: {0}")]
    Transport(#[source] hyper_util::client::legacy::Error),

    #[error("upstream responded with status {0}")]
    Status(StatusCode),

    #[error("failed to read upstream body: {0}")]
    Body(#[source] hyper::Error),

    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),

    #[error("upstream body is not valid exposition text: {0}")]
    Decode(#[source] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("accept loop failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("{connections} connection(s) still open after the {grace_period:?} grace period, closed forcibly")]
    GracePeriodExceeded {
        grace_period: Duration,
        connections: usize,
    },
}
