//! # unictl-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the [`EntityStore`](unictl_app::ports::EntityStore) port
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `unictl-app` (for port traits) and `unictl-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod entity_store;
pub mod error;
pub mod pool;

pub use entity_store::SqliteEntityStore;
pub use pool::{Config, Database};
