//! PostgreSQL adapter for `compass_core`.
//!
//! [`repo`] holds the generic tenant-aware statement builders, [`entity`]
//! composes them into one repository per table, and [`transaction`] binds
//! the core `Transactioner` port to a `PgPool`.

pub mod config;
pub mod entity;
pub mod error;
pub mod repo;
pub mod transaction;

pub use config::{mask_database_url, DatabaseConfig};
pub use entity::repositories;
pub use transaction::{PgTransaction, PgTransactioner};

/// Embedded schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
