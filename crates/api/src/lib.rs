//! HTTP API: session routes, the authorization gate, and request context.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
