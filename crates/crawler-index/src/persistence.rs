//! On-disk form of the index. `IndexState` keys its document map by
//! `DocId`, which `serde_json` cannot use as an object key, so persistence
//! goes through this flat, self-describing DTO instead: a document list
//! plus the postings rebuilt from it on load.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::document::DocId;
use crate::state::{IndexState, PostingEntry, StoredDocument};

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedIndex {
    pub schema_version: u32,
    pub next_doc_id: u64,
    pub documents: Vec<StoredDocument>,
}

impl PersistedIndex {
    pub fn from_state(state: &IndexState, next_doc_id: u64) -> Self {
        let mut documents: Vec<StoredDocument> = state.documents.values().cloned().collect();
        documents.sort_by_key(|d| d.doc_id);
        Self {
            schema_version: SCHEMA_VERSION,
            next_doc_id,
            documents,
        }
    }

    pub fn into_state(self) -> (IndexState, u64) {
        let mut state = IndexState::default();
        for doc in self.documents {
            state.title_total_len += doc.title_len as u64;
            state.body_total_len += doc.body_len as u64;
            state.url_to_doc.insert(doc.url.clone(), doc.doc_id);
            add_postings(&mut state.postings, &doc);
            state.documents.insert(doc.doc_id, doc);
        }
        (state, self.next_doc_id)
    }
}

fn add_postings(postings: &mut HashMap<String, Vec<PostingEntry>>, doc: &StoredDocument) {
    for term in crate::analysis::analyze(&doc.title) {
        push_entry(postings, term, doc.doc_id, crate::document::Field::Title);
    }
    for term in crate::analysis::analyze(&doc.body) {
        push_entry(postings, term, doc.doc_id, crate::document::Field::Body);
    }
}

fn push_entry(postings: &mut HashMap<String, Vec<PostingEntry>>, term: String, doc_id: DocId, field: crate::document::Field) {
    let entries = postings.entry(term).or_default();
    if let Some(existing) = entries.iter_mut().find(|e| e.doc_id == doc_id && e.field == field) {
        existing.term_freq += 1;
    } else {
        entries.push(PostingEntry {
            doc_id,
            field,
            term_freq: 1,
        });
    }
}

pub fn save(path: &Path, state: &IndexState, next_doc_id: u64) -> std::io::Result<()> {
    let persisted = PersistedIndex::from_state(state, next_doc_id);
    let tmp_path = path.with_extension("tmp");
    let bytes = serde_json::to_vec_pretty(&persisted)?;
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn load(path: &Path) -> std::io::Result<Option<(IndexState, u64)>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path)?;
    let persisted: PersistedIndex = serde_json::from_slice(&bytes)?;
    Ok(Some(persisted.into_state()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_state() -> (IndexState, u64) {
        let mut state = IndexState::default();
        let doc = StoredDocument {
            doc_id: DocId(1),
            url: "https://a.test/".to_string(),
            title: "rust crawler".to_string(),
            body: "a fast web crawler".to_string(),
            host: "a.test".to_string(),
            crawl_timestamp: Utc::now(),
            title_len: 2,
            body_len: 4,
        };
        state.title_total_len = 2;
        state.body_total_len = 4;
        state.url_to_doc.insert(doc.url.clone(), doc.doc_id);
        state.documents.insert(doc.doc_id, doc);
        (state, 2)
    }

    #[test]
    fn round_trips_through_json() {
        let (state, next_id) = sample_state();
        let persisted = PersistedIndex::from_state(&state, next_id);
        let bytes = serde_json::to_vec(&persisted).unwrap();
        let restored: PersistedIndex = serde_json::from_slice(&bytes).unwrap();
        let (restored_state, restored_next) = restored.into_state();
        assert_eq!(restored_next, next_id);
        assert_eq!(restored_state.document_count(), 1);
        assert!(restored_state.postings.contains_key("crawler"));
    }

    #[test]
    fn save_then_load_round_trips_to_disk() {
        let (state, next_id) = sample_state();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        save(&path, &state, next_id).unwrap();
        let (loaded, loaded_next) = load(&path).unwrap().unwrap();
        assert_eq!(loaded_next, next_id);
        assert_eq!(loaded.document_count(), 1);
    }

    #[test]
    fn load_of_missing_path_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(load(&path).unwrap().is_none());
    }
}
