//! Compass director REST server.
//!
//! Serves the destination-fetcher API and the director's REST surface over
//! `compass_core` resolvers, and runs the periodic destination sync job.

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
pub mod sync_job;

#[cfg(test)]
pub(crate) mod testing;
