//! mozpay receiver. It accepts provider postbacks and chargebacks over HTTP.
//!
//! Signature, schema and time checks live in the core [`mozpay`] crate; this
//! crate mounts the two notice endpoints on actix-web and adds the server
//! plumbing around them.
//!
//! # Modules
//!
//! - [`routes`]: [`WebhookRoutes`](routes::WebhookRoutes) plus `/health` and `/metrics`
//! - [`config`]: env-driven [`ServerConfig`](config::ServerConfig)
//! - [`metrics`]: Prometheus counters for notices and subscriber failures
//! - [`security`]: constant-time bearer token comparison

pub mod config;
pub mod metrics;
pub mod routes;
pub mod security;

pub use config::{ConfigError, ServerConfig};
pub use routes::{MetricsAccess, WebhookRoutes};
