//! Listening socket ownership, the accept loop, and graceful shutdown.
//!
//! [`Server`] moves through [`ServerState`]: it is `Created` by
//! [`Server::bind`], `Serving` inside [`Server::serve`] until the cancel
//! future resolves, then `ShuttingDown` while open connections finish
//! their in-flight request, and finally `Stopped`. Connections still open
//! when the grace period runs out are aborted and reported as
//! [`ServerError::GracePeriodExceeded`]. [`shutdown_signal`] provides the
//! SIGTERM / Ctrl+C cancel future used by the binary.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::error::ServerError;

/// How long in-flight requests may run once shutdown begins.
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Serving,
    ShuttingDown,
    Stopped,
}

pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    grace_period: Duration,
    state: watch::Sender<ServerState>,
    span: tracing::Span,
}

impl Server {
    pub async fn bind(addr: SocketAddr) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self {
            listener,
            local_addr,
            grace_period: SHUTDOWN_GRACE_PERIOD,
            state: watch::Sender::new(ServerState::Created),
            span: tracing::info_span!("server", addr = %local_addr),
        })
    }

    /// Override [`SHUTDOWN_GRACE_PERIOD`].
    #[must_use]
    pub const fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Observe lifecycle transitions.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Serve `router` until `cancel` resolves, then drain.
    ///
    /// Returns the first error of the accept loop or, failing that, of the
    /// shutdown. Consumes the server: a stopped server cannot be restarted.
    pub async fn serve<F>(self, router: Router, cancel: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let span = self.span.clone();
        self.run(router, cancel).instrument(span).await
    }

    async fn run<F>(self, router: Router, cancel: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            listener,
            grace_period,
            state,
            ..
        } = self;

        let graceful = GracefulShutdown::new();
        let mut connections = JoinSet::new();
        tokio::pin!(cancel);

        state.send_replace(ServerState::Serving);
        tracing::info!("serving");

        let accept_outcome = loop {
            tokio::select! {
                () = &mut cancel => {
                    tracing::info!("shutdown requested");
                    break Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        let service = TowerToHyperService::new(router.clone());
                        let conn = http1::Builder::new()
                            .timer(TokioTimer::new())
                            .serve_connection(TokioIo::new(stream), service);
                        let conn = graceful.watch(conn);
                        connections.spawn(async move {
                            if let Err(e) = conn.await {
                                tracing::debug!(remote = %remote, error = %e, "connection closed with error");
                            }
                        });
                    }
                    Err(e) if is_connection_error(&e) => {
                        tracing::debug!(error = %e, "accept failed for one connection");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept loop failed");
                        break Err(ServerError::Accept(e));
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        };

        drop(listener);
        state.send_replace(ServerState::ShuttingDown);
        while connections.try_join_next().is_some() {}
        tracing::info!(
            connections = connections.len(),
            grace_period = ?grace_period,
            "server stopped accepting, waiting for in-flight requests"
        );

        let shutdown_outcome = match tokio::time::timeout(grace_period, graceful.shutdown()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                while connections.try_join_next().is_some() {}
                let remaining = connections.len();
                connections.abort_all();
                tracing::warn!(connections = remaining, "grace period elapsed, closing connections");
                Err(ServerError::GracePeriodExceeded {
                    grace_period,
                    connections: remaining,
                })
            }
        };
        while connections.join_next().await.is_some() {}

        state.send_replace(ServerState::Stopped);
        tracing::info!("server stopped");

        accept_outcome.and(shutdown_outcome)
    }
}

/// Errors that only concern the connection being accepted, not the listener.
fn is_connection_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::Interrupted
    )
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
