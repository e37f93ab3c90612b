//! HTTP API: server, routing, and error boundary.

pub mod app;
pub mod authz;
pub mod config;
pub mod middleware;
