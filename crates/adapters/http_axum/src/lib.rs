//! # unictl-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a **JSON API** for programmatic access
//!   (`/api/entities`, `/api/templates/preview`, `/api/events/stream`, …)
//! - Serve a **server-side-rendered HTML dashboard** that works with
//!   **zero JavaScript**: plain links, POST forms with redirect (PRG), and
//!   `<meta http-equiv="refresh">` for live updates
//! - Map HTTP requests into application service calls (driving adapter)
//! - Map application results and errors into HTTP responses
//!
//! ## Dependency rule
//! Depends on `unictl-app` (for port traits and services) and `unictl-domain`
//! (for domain types used in request/response mapping). Never leaks axum types
//! into the domain.

pub mod api;
pub mod dashboard;
pub mod error;
pub mod router;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;
