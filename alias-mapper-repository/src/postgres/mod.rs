//! PostgreSQL implementation of the mapping, checkpoint, entity and record
//! stores.
//!
//! All SQL is runtime-checked (`sqlx::query`, not `sqlx::query!`) so building
//! the crate never needs a live database.

mod schema;
mod store;

pub use store::PostgresStore;
