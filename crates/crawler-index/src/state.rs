use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{DocId, Field};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub doc_id: DocId,
    pub url: String,
    pub title: String,
    pub body: String,
    pub host: String,
    pub crawl_timestamp: DateTime<Utc>,
    pub title_len: u32,
    pub body_len: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingEntry {
    pub doc_id: DocId,
    pub field: Field,
    pub term_freq: u32,
}

/// One fully-committed view of the index. Readers hold an `Arc` of this;
/// writers build the next one and swap it in under the writer lock. Not
/// itself `Serialize` (its `documents` map is keyed by `DocId`, which JSON
/// maps cannot use as a key); see `persistence::PersistedIndex` for the
/// on-disk form.
#[derive(Debug, Clone, Default)]
pub struct IndexState {
    pub documents: HashMap<DocId, StoredDocument>,
    pub url_to_doc: HashMap<String, DocId>,
    pub postings: HashMap<String, Vec<PostingEntry>>,
    pub title_total_len: u64,
    pub body_total_len: u64,
}

impl IndexState {
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn avg_title_length(&self) -> f64 {
        if self.documents.is_empty() {
            0.0
        } else {
            self.title_total_len as f64 / self.documents.len() as f64
        }
    }

    pub fn avg_body_length(&self) -> f64 {
        if self.documents.is_empty() {
            0.0
        } else {
            self.body_total_len as f64 / self.documents.len() as f64
        }
    }
}
