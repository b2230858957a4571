//! Content-addressed, cache-backed pagination buckets.
//!
//! A bucket snapshots either a whole item collection or the query that
//! produces one under a deterministic ID, so later requests can page
//! through the same result set by passing only that ID.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
