//! Vivid Vision HTTP server.
//!
//! Wires the storefront core, a storage backend, and the HTTP routes into an
//! Axum application: the JSON API under `/api`, Google sign-in under
//! `/auth`, the admin back-office, and the HTML pages and assets from the
//! public directory.

pub mod app;
pub mod captcha;
pub mod config;
pub mod error;
pub mod middleware;
pub mod notify;
pub mod oauth;
pub mod routes;
pub mod state;
pub mod sweep;
