//! Shared types and services for the field event measurement system.
//!
//! - `results` - competition data exchanged with the results server
//! - `results_client` - blocking HTTP client for that server
//! - `result_cache` - durable cache of undelivered results
//! - `timed_ring` - bounded time-stamped sample buffer
//! - `config_storage` - user-scoped storage layout

pub mod config_storage;
pub mod result_cache;
pub mod results;
pub mod results_client;
pub mod timed_ring;

pub use config_storage::ConfigStorage;
pub use result_cache::ResultCache;
pub use results::{Athlete, Event, EventRules, Performance, ResultPayload};
pub use results_client::{ResultsClient, ResultsError};
pub use timed_ring::TimedRing;
