//! # gh-triage
//!
//! Local-first triage for the GitHub notification inbox.
//!
//! **Purpose:** Sync notifications into a local SQLite cache, rank them
//! with a deterministic priority score, and serve any front end from
//! the cache with zero perceived network latency. User actions go back
//! upstream through a single background worker, never from the UI path.
//!
//! **Architecture:** One worker task owns all network and cache-write
//! I/O; front ends read the cache directly and talk to the worker over
//! a typed request/response channel pair.

pub mod config;
pub mod db;
pub mod error;
pub mod github;
pub mod messages;
pub mod priority;
pub mod sync;
pub mod types;
pub mod worker;

pub use error::{Error, Result};
