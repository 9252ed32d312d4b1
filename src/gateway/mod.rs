//! The HTTP side of the gateway.
//!
//! [`handler`] turns one upstream fetch into one JSON response, and
//! [`registry`] mounts a handler per configured path on the router that
//! [`crate::server::Server`] serves.

pub mod handler;
pub mod registry;

pub use handler::{ErrorEnvelope, RouteHandler};
pub use registry::RouteRegistry;
