//! HTTP implementation of [`MetricsSource`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{ACCEPT, USER_AGENT};
use http_body_util::{BodyExt, Empty};
use hyper::Uri;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use url::Url;

use super::family::{self, MetricFamily};
use super::tls::{self, ClientIdentity};
use super::{MetricsSource, UpstreamSpec};
use crate::error::{ClientError, FetchError};

pub type HttpsConnector = hyper_rustls::HttpsConnector<HttpConnector>;
pub type HttpClient = Client<HttpsConnector, Empty<Bytes>>;

const ACCEPT_EXPOSITION: &str = "text/plain;version=0.0.4;q=1,*/*;q=0.1";

/// Pooled client bound to one upstream.
///
/// Built once at startup and shared by every request on its route; the
/// underlying hyper pool handles concurrent use.
#[derive(Clone)]
pub struct UpstreamClient {
    url: String,
    uri: Uri,
    timeout: Duration,
    client: HttpClient,
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl UpstreamClient {
    pub fn new(spec: &UpstreamSpec) -> Result<Self, ClientError> {
        let url = Url::parse(&spec.url).map_err(|e| ClientError::InvalidUrl {
            url: spec.url.clone(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(ClientError::UnsupportedScheme(other.to_string())),
        }
        let uri: Uri = url.as_str().parse().map_err(|e: http::uri::InvalidUri| {
            ClientError::InvalidUrl {
                url: spec.url.clone(),
                reason: e.to_string(),
            }
        })?;

        let identity = match (&spec.tls_cert, &spec.tls_key) {
            (Some(cert), Some(key)) => Some(ClientIdentity::load(cert, key)?),
            (Some(_), None) => {
                return Err(ClientError::UnpairedKeyPair {
                    present: "tls_cert",
                    missing: "tls_key",
                })
            }
            (None, Some(_)) => {
                return Err(ClientError::UnpairedKeyPair {
                    present: "tls_key",
                    missing: "tls_cert",
                })
            }
            (None, None) => None,
        };
        let tls_config = tls::client_config(identity, spec.tls_insecure_verify)?;

        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(30))
            .build(https);

        Ok(Self {
            url: url.to_string(),
            uri,
            timeout: spec.timeout,
            client,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_once(&self) -> Result<Vec<MetricFamily>, FetchError> {
        let request = hyper::Request::get(self.uri.clone())
            .header(ACCEPT, ACCEPT_EXPOSITION)
            .header(USER_AGENT, concat!("prom2json-gateway/", env!("CARGO_PKG_VERSION")))
            .body(Empty::new())?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(FetchError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(FetchError::Body)?
            .to_bytes();
        let text = std::str::from_utf8(&body).map_err(|e| {
            FetchError::Decode(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        family::decode(text).map_err(FetchError::Decode)
    }
}

#[async_trait]
impl MetricsSource for UpstreamClient {
    fn target(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<Vec<MetricFamily>, FetchError> {
        tokio::time::timeout(self.timeout, self.fetch_once())
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
    }
}
