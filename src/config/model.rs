//! Serde data structures for the gateway configuration file.
//!
//! Contains [`Config`] (the root), [`LoggingConfig`], [`ServerConfig`] and
//! [`MetricConfig`]. All types derive `Serialize` and `Deserialize` with
//! `deny_unknown_fields` for strict parsing. Missing sections and fields
//! take serde defaults; [`Config::apply_defaults`] additionally replaces
//! empty strings and zero values, which are otherwise valid YAML.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::LogLevel;
use crate::upstream::UpstreamSpec;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HANDLER_PATH: &str = "/metrics";
pub const DEFAULT_METRICS_URL: &str = "http://localhost:9090/metrics";
pub const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 10;

const fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_handler_path() -> String {
    DEFAULT_HANDLER_PATH.to_string()
}

fn default_metrics_url() -> String {
    DEFAULT_METRICS_URL.to_string()
}

const fn default_response_timeout() -> u64 {
    DEFAULT_RESPONSE_TIMEOUT_SECS
}

fn default_metrics() -> Vec<MetricConfig> {
    vec![MetricConfig::default()]
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, alias = "log")]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default = "default_metrics")]
    pub metrics: Vec<MetricConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
            metrics: default_metrics(),
        }
    }
}

impl Config {
    /// Replace empty strings and zero values with their defaults.
    pub fn apply_defaults(&mut self) {
        if self.server.port == 0 {
            self.server.port = DEFAULT_PORT;
        }
        for metric in &mut self.metrics {
            metric.apply_defaults();
        }
    }

    #[must_use]
    pub fn upstream_specs(&self) -> Vec<UpstreamSpec> {
        self.metrics.iter().map(UpstreamSpec::from).collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default)]
    pub time_format: TimeFormat,

    #[serde(default)]
    pub level: LogLevel,

    #[serde(default, skip_serializing_if = "is_false")]
    pub json_format: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub with_caller: bool,
}

/// Timestamp rendering for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFormat {
    // empty string keeps the default
    #[default]
    #[serde(alias = "", alias = "2006-01-02T15:04:05Z07:00")]
    Rfc3339,
    Unix,
    UnixMs,
    UnixMicro,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricConfig {
    #[serde(default = "default_handler_path")]
    pub handler_path: String,

    #[serde(default = "default_metrics_url")]
    pub url: String,

    /// Seconds.
    #[serde(default = "default_response_timeout")]
    pub response_timeout: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_cert: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_key: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub tls_insecure_verify: bool,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            handler_path: default_handler_path(),
            url: default_metrics_url(),
            response_timeout: default_response_timeout(),
            tls_cert: None,
            tls_key: None,
            tls_insecure_verify: false,
        }
    }
}

impl MetricConfig {
    fn apply_defaults(&mut self) {
        if self.handler_path.is_empty() {
            self.handler_path = default_handler_path();
        }
        if self.url.is_empty() {
            self.url = default_metrics_url();
        }
        if self.response_timeout == 0 {
            self.response_timeout = default_response_timeout();
        }
        if self.tls_cert.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            self.tls_cert = None;
        }
        if self.tls_key.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            self.tls_key = None;
        }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout)
    }
}

impl From<&MetricConfig> for UpstreamSpec {
    fn from(cfg: &MetricConfig) -> Self {
        Self {
            path: cfg.handler_path.clone(),
            url: cfg.url.clone(),
            timeout: cfg.timeout(),
            tls_cert: cfg.tls_cert.clone(),
            tls_key: cfg.tls_key.clone(),
            tls_insecure_verify: cfg.tls_insecure_verify,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_one_route() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.metrics.len(), 1);
        assert_eq!(config.metrics[0].handler_path, "/metrics");
        assert_eq!(config.metrics[0].url, "http://localhost:9090/metrics");
        assert_eq!(config.metrics[0].timeout(), Duration::from_secs(10));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.time_format, TimeFormat::Rfc3339);
    }

    #[test]
    fn apply_defaults_fills_empty_values() {
        let mut config = Config {
            logging: LoggingConfig::default(),
            server: ServerConfig { port: 0 },
            metrics: vec![MetricConfig {
                handler_path: String::new(),
                url: String::new(),
                response_timeout: 0,
                tls_cert: Some(PathBuf::new()),
                tls_key: Some(PathBuf::new()),
                tls_insecure_verify: false,
            }],
        };
        config.apply_defaults();

        assert_eq!(config.server.port, DEFAULT_PORT);
        let metric = &config.metrics[0];
        assert_eq!(metric.handler_path, DEFAULT_HANDLER_PATH);
        assert_eq!(metric.url, DEFAULT_METRICS_URL);
        assert_eq!(metric.response_timeout, DEFAULT_RESPONSE_TIMEOUT_SECS);
        assert!(metric.tls_cert.is_none());
        assert!(metric.tls_key.is_none());
    }

    #[test]
    fn spec_carries_route_settings() {
        let metric = MetricConfig {
            handler_path: "/node".into(),
            url: "https://node:9100/metrics".into(),
            response_timeout: 3,
            tls_cert: Some("client.pem".into()),
            tls_key: Some("client.key".into()),
            tls_insecure_verify: true,
        };
        let spec = UpstreamSpec::from(&metric);
        assert_eq!(spec.path, "/node");
        assert_eq!(spec.url, "https://node:9100/metrics");
        assert_eq!(spec.timeout, Duration::from_secs(3));
        assert_eq!(spec.tls_cert.as_deref(), Some(std::path::Path::new("client.pem")));
        assert!(spec.tls_insecure_verify);
    }
}
