//! Durable inverted index with concurrent document upserts and ranked
//! multi-field queries. A single writer lock serializes `upsert`; readers
//! take an `Arc` snapshot of the index state at the start of a query and
//! never block on, or observe, an in-progress write.

mod analysis;
mod document;
mod index;
mod persistence;
mod query;
mod scoring;
mod snippet;
mod state;

pub mod http;

pub use document::{Document, DocId, Field};
pub use index::{Index, IndexError, IndexRuntimeConfig, IndexStats, SearchHit};
pub use persistence::{load as load_index, save as save_index, PersistedIndex};
pub use state::IndexState;
pub use query::{parse_query, Query, QueryError};
