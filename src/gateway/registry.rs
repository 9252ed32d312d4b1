//! Composition of route handlers into the single HTTP router.
//!
//! [`RouteRegistry`] is filled once at startup, before any socket is
//! opened, and then turned into an axum [`Router`]. Non-literal or
//! duplicate paths and client construction failures are rejected here
//! rather than at request time or inside the router.

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handler::RouteHandler;
use crate::config::validation;
use crate::error::GatewayError;
use crate::upstream::{MetricsSource, UpstreamClient, UpstreamSpec};

#[derive(Default)]
pub struct RouteRegistry {
    handlers: Vec<Arc<RouteHandler>>,
}

impl RouteRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one [`UpstreamClient`] per spec and register it under the spec's path.
    pub fn from_specs(specs: &[UpstreamSpec]) -> Result<Self, GatewayError> {
        let mut registry = Self::new();
        for spec in specs {
            registry.check_path(&spec.path)?;
            let client = UpstreamClient::new(spec).map_err(|source| GatewayError::Client {
                path: spec.path.clone(),
                source,
            })?;
            registry.register(spec.path.clone(), Arc::new(client))?;
        }
        Ok(registry)
    }

    pub fn register(
        &mut self,
        path: impl Into<String>,
        source: Arc<dyn MetricsSource>,
    ) -> Result<(), GatewayError> {
        let path = path.into();
        self.check_path(&path)?;

        let handler = RouteHandler::new(path, source);
        tracing::info!(path = %handler.path(), url = %handler.target(), "register handler");
        self.handlers.push(Arc::new(handler));
        Ok(())
    }

    fn check_path(&self, path: &str) -> Result<(), GatewayError> {
        validation::validate_path(path).map_err(|reason| GatewayError::InvalidRoute {
            path: path.to_string(),
            reason,
        })?;
        if self.handlers.iter().any(|h| h.path() == path) {
            return Err(GatewayError::DuplicateRoute {
                path: path.to_string(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|h| h.path())
    }

    /// Mount every handler as a `GET` route.
    pub fn into_router(self) -> Router {
        let router = self.handlers.into_iter().fold(Router::new(), |router, handler| {
            let path = handler.path().to_string();
            router.route(
                &path,
                get(move |headers: HeaderMap| async move { handler.handle(&headers).await }),
            )
        });

        router.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
    }
}
