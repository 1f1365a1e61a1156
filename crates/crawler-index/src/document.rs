use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Internal document identifier, stable across an upsert that replaces an
/// existing URL's content (so postings can be removed and re-added under
/// the same id rather than treating an update as a brand new document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Title,
    Body,
}

/// A document as submitted for indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub title: String,
    pub body: String,
    pub host: String,
    #[serde(default = "Utc::now")]
    pub crawl_timestamp: DateTime<Utc>,
}
