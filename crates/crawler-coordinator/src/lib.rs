//! Frontier/lease coordinator: the single source of truth for which URLs
//! have been seen, which are pending, which are leased to a worker, and
//! which have permanently failed. Exposed over HTTP so fetch workers and
//! operators never touch the frontier state directly.

mod frontier;
pub mod http;
pub mod snapshot;

pub use frontier::{CompleteOutcome, Frontier, FrontierError, FrontierStats, TaskTransport};
