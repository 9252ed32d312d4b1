//! `prom2json-gateway run`: start the gateway.
//!
//! Loads the config file, applies command-line overrides, installs the
//! tracing subscriber, builds every upstream client, and serves until
//! SIGTERM / Ctrl+C, draining in-flight requests before returning.

use std::net::{Ipv4Addr, SocketAddr};

use crate::cli::RunArgs;
use crate::config;
use crate::error::GatewayError;
use crate::gateway::RouteRegistry;
use crate::logging;
use crate::server::{self, Server};

pub async fn execute(args: RunArgs) -> Result<(), GatewayError> {
    let mut config = config::load(&args.config).await?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    let log_format = logging::resolve_format(&config.logging, args.pretty, args.json);
    logging::init(&config.logging, log_format);

    tracing::info!(path = %args.config.display(), "config loaded");

    let registry = RouteRegistry::from_specs(&config.upstream_specs())?;
    let route_count = registry.len();

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.server.port));
    let server = Server::bind(addr).await?;

    tracing::info!(
        addr = %server.local_addr(),
        routes = route_count,
        "prom2json-gateway started"
    );

    server
        .serve(registry.into_router(), server::shutdown_signal())
        .await?;

    tracing::info!("prom2json-gateway stopped");
    Ok(())
}
