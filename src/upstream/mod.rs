//! Upstream metrics sources.
//!
//! An [`UpstreamSpec`] describes one configured source; [`UpstreamClient`]
//! is the HTTP implementation of [`MetricsSource`] built from it. The
//! [`family`] submodule turns a decoded exposition payload into the
//! [`MetricFamily`] values the gateway serves, and [`tls`] builds the
//! per-upstream rustls configuration.

pub mod client;
pub mod family;
pub mod tls;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;

pub use client::UpstreamClient;
pub use family::{MetricFamily, MetricKind, MetricSample};

/// Immutable description of one upstream route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamSpec {
    /// Path the gateway serves this upstream on.
    pub path: String,
    pub url: String,
    /// Upper bound for one fetch, connect through body.
    pub timeout: Duration,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    /// Accept any server certificate.
    pub tls_insecure_verify: bool,
}

// async_trait is required here because route handlers hold sources as
// Arc<dyn MetricsSource> and native async fn in traits does not support
// dyn dispatch.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Where the metrics come from, for logging.
    fn target(&self) -> &str;

    /// Fetch and decode the current metrics. One attempt, no retries.
    async fn fetch(&self) -> Result<Vec<MetricFamily>, FetchError>;
}
