//! Compass director core.
//!
//! Domain models, repository ports, services and resolvers for the director,
//! plus the destination sync service. Storage is reached only through the
//! traits in [`ports`] and [`transaction`]; `compass_postgres` implements them
//! with sqlx and [`memory`] implements them in-process.

pub mod error;
pub mod graphql;
pub mod memory;
pub mod model;
pub mod pagination;
pub mod ports;
pub mod resolver;
pub mod resource;
pub mod service;
pub mod tenant;
pub mod transaction;
pub mod uid;

pub use error::{CompassError, Result};
