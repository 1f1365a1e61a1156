//! Shared domain types for the crawl control plane and the index.
//!
//! Every crate in this workspace that crosses a process boundary (HTTP
//! handlers, worker loops, the index) speaks in terms of the types defined
//! here instead of ad hoc strings, so that the error taxonomy and URL
//! canonicalization rules live in exactly one place.

mod canonical_url;
mod error;
mod fetch;
mod ids;

pub use canonical_url::{CanonicalUrl, UrlError};
pub use error::{FetchError, FetchErrorKind};
pub use fetch::{FetchDocument, FetchResult};
pub use ids::{LeaseId, WorkerId};
