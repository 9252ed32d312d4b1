//! Per-route request handling.
//!
//! A [`RouteHandler`] fetches from its bound [`MetricsSource`] on every
//! request and answers with the decoded families as a JSON array, or with
//! an [`ErrorEnvelope`] carrying a fixed message when anything fails.

use std::sync::Arc;

use axum::http::header::{CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::upstream::MetricsSource;

pub const GET_METRICS_ERROR: &str = "get metrics error";
pub const MARSHAL_JSON_ERROR: &str = "marshal json data error";

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerError {
    GetMetrics,
    MarshalJson,
}

impl HandlerError {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::GetMetrics => GET_METRICS_ERROR,
            Self::MarshalJson => MARSHAL_JSON_ERROR,
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorEnvelope {
                message: self.message().to_string(),
            }),
        )
            .into_response()
    }
}

pub struct RouteHandler {
    path: String,
    source: Arc<dyn MetricsSource>,
    span: tracing::Span,
}

impl RouteHandler {
    #[must_use]
    pub fn new(path: impl Into<String>, source: Arc<dyn MetricsSource>) -> Self {
        let path = path.into();
        let span = tracing::info_span!("route", path = %path, upstream = %source.target());
        Self { path, source, span }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn target(&self) -> &str {
        self.source.target()
    }

    pub async fn handle(&self, headers: &HeaderMap) -> Response {
        let correlation_id = headers
            .get("x-correlation-id")
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);
        let host = headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        let span = tracing::info_span!(parent: &self.span, "request", correlation_id = %correlation_id);

        match self.render(host).instrument(span).await {
            Ok(body) => (
                [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                body,
            )
                .into_response(),
            Err(e) => e.into_response(),
        }
    }

    async fn render(&self, host: &str) -> Result<Vec<u8>, HandlerError> {
        tracing::info!(host = %host, url = %self.source.target(), "fetch metrics");

        let families = self.source.fetch().await.map_err(|e| {
            tracing::error!(error = %e, "get metrics error");
            HandlerError::GetMetrics
        })?;

        let body = serde_json::to_vec(&families).map_err(|e| {
            tracing::error!(error = %e, "marshal json data error");
            HandlerError::MarshalJson
        })?;

        tracing::debug!(families = families.len(), bytes = body.len(), "metrics served");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::to_bytes;

    use super::*;
    use crate::error::FetchError;
    use crate::upstream::{MetricFamily, MetricKind, MetricSample};

    struct Fixed(Vec<MetricFamily>);

    #[async_trait]
    impl MetricsSource for Fixed {
        fn target(&self) -> &str {
            "fixed"
        }

        async fn fetch(&self) -> Result<Vec<MetricFamily>, FetchError> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl MetricsSource for Failing {
        fn target(&self) -> &str {
            "failing"
        }

        async fn fetch(&self) -> Result<Vec<MetricFamily>, FetchError> {
            Err(FetchError::Timeout(Duration::from_secs(1)))
        }
    }

    fn gauge(name: &str, value: &str) -> MetricFamily {
        MetricFamily {
            name: name.into(),
            help: String::new(),
            kind: MetricKind::Gauge,
            metrics: vec![MetricSample::Scalar {
                labels: Default::default(),
                value: value.into(),
            }],
        }
    }

    async fn body_of(resp: Response) -> Vec<u8> {
        to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    #[tokio::test]
    async fn serves_families_in_order() {
        let families = vec![gauge("b", "2"), gauge("a", "1"), gauge("c", "3")];
        let handler = RouteHandler::new("/metrics", Arc::new(Fixed(families.clone())));

        let resp = handler.handle(&HeaderMap::new()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");

        let decoded: Vec<MetricFamily> = serde_json::from_slice(&body_of(resp).await).unwrap();
        assert_eq!(decoded, families);
    }

    #[tokio::test]
    async fn empty_source_serves_empty_array() {
        let handler = RouteHandler::new("/metrics", Arc::new(Fixed(vec![])));
        let resp = handler.handle(&HeaderMap::new()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_of(resp).await, b"[]");
    }

    #[tokio::test]
    async fn fetch_failure_is_a_fixed_500() {
        let handler = RouteHandler::new("/metrics", Arc::new(Failing));

        let resp = handler.handle(&HeaderMap::new()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");

        let envelope: ErrorEnvelope = serde_json::from_slice(&body_of(resp).await).unwrap();
        assert_eq!(envelope.message, "get metrics error");
    }

    #[tokio::test]
    async fn marshal_error_has_its_own_message() {
        let resp = HandlerError::MarshalJson.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");

        let envelope: ErrorEnvelope = serde_json::from_slice(&body_of(resp).await).unwrap();
        assert_eq!(envelope.message, "marshal json data error");
    }
}
