//! SportMonks News - a proxy and dashboard for the SportMonks football news API
//!
//! This crate re-exposes the upstream's five news endpoints, walks paginated results,
//! merges the upcoming and post-match feeds, and filters articles by league.

pub mod aggregate;
pub mod config;
pub mod envelope;
pub mod filter;
pub mod routes;
pub mod stats;
pub mod upstream;
pub mod view;
pub mod walker;
