use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::analysis::analyze;
use crate::document::{DocId, Document, Field};
use crate::query::{parse_query, Query, QueryError};
use crate::scoring::{field_term_score, idf, Bm25Params};
use crate::snippet::build_snippet;
use crate::state::{IndexState, PostingEntry, StoredDocument};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid query: {0}")]
    Query(#[from] QueryError),
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub score: f64,
    pub host: String,
    pub crawl_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub documents_indexed: usize,
    pub bytes_on_disk: u64,
    pub searches_performed: u64,
    pub last_upsert: Option<DateTime<Utc>>,
}

pub struct IndexRuntimeConfig {
    pub title_weight: f64,
    pub body_weight: f64,
    pub default_k: usize,
    pub snippet_max_fragments: usize,
    pub snippet_fallback_chars: usize,
    pub bm25: Bm25Params,
}

impl From<&crawler_config::IndexConfig> for IndexRuntimeConfig {
    fn from(cfg: &crawler_config::IndexConfig) -> Self {
        Self {
            title_weight: cfg.title_weight,
            body_weight: cfg.body_weight,
            default_k: cfg.default_k,
            snippet_max_fragments: cfg.snippet_max_fragments,
            snippet_fallback_chars: cfg.snippet_fallback_chars,
            bm25: Bm25Params::default(),
        }
    }
}

/// The durable inverted index. `upsert` is serialized by `writer`;
/// `search` takes a cheap `Arc` clone of the current state and never
/// blocks on a concurrent writer.
pub struct Index {
    inner: RwLock<Arc<IndexState>>,
    writer: Mutex<()>,
    next_doc_id: AtomicU64,
    config: IndexRuntimeConfig,
    searches_performed: AtomicU64,
    last_upsert: Mutex<Option<DateTime<Utc>>>,
    bytes_on_disk: AtomicU64,
}

impl Index {
    pub fn new(config: IndexRuntimeConfig) -> Self {
        Self {
            inner: RwLock::new(Arc::new(IndexState::default())),
            writer: Mutex::new(()),
            next_doc_id: AtomicU64::new(1),
            config,
            searches_performed: AtomicU64::new(0),
            last_upsert: Mutex::new(None),
            bytes_on_disk: AtomicU64::new(0),
        }
    }

    pub fn restore(config: IndexRuntimeConfig, state: IndexState, next_doc_id: u64) -> Self {
        Self {
            inner: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
            next_doc_id: AtomicU64::new(next_doc_id),
            config,
            searches_performed: AtomicU64::new(0),
            last_upsert: Mutex::new(None),
            bytes_on_disk: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> Arc<IndexState> {
        self.inner.read().expect("index read lock poisoned").clone()
    }

    /// Insert or replace the document for `doc.url`. Serialized against
    /// other writers; never visible to readers half-applied.
    pub fn upsert(&self, doc: Document) {
        let _guard = self.writer.lock().expect("index writer lock poisoned");

        let previous = self.snapshot();
        let mut next = (*previous).clone();

        let doc_id = if let Some(existing_id) = next.url_to_doc.get(&doc.url).copied() {
            self.remove_doc_postings(&mut next, existing_id);
            existing_id
        } else {
            let id = DocId(self.next_doc_id.fetch_add(1, Ordering::SeqCst));
            next.url_to_doc.insert(doc.url.clone(), id);
            id
        };

        let title_tokens = analyze(&doc.title);
        let body_tokens = analyze(&doc.body);

        let stored = StoredDocument {
            doc_id,
            url: doc.url.clone(),
            title: doc.title,
            body: doc.body,
            host: doc.host,
            crawl_timestamp: doc.crawl_timestamp,
            title_len: title_tokens.len() as u32,
            body_len: body_tokens.len() as u32,
        };

        next.title_total_len += stored.title_len as u64;
        next.body_total_len += stored.body_len as u64;

        add_postings(&mut next.postings, doc_id, Field::Title, &title_tokens);
        add_postings(&mut next.postings, doc_id, Field::Body, &body_tokens);

        next.documents.insert(doc_id, stored);

        let bytes = estimate_bytes(&next);
        self.bytes_on_disk.store(bytes, Ordering::Relaxed);

        *self.inner.write().expect("index write lock poisoned") = Arc::new(next);
        *self.last_upsert.lock().expect("last-upsert lock poisoned") = Some(Utc::now());
    }

    fn remove_doc_postings(&self, state: &mut IndexState, doc_id: DocId) {
        if let Some(old) = state.documents.get(&doc_id) {
            state.title_total_len = state.title_total_len.saturating_sub(old.title_len as u64);
            state.body_total_len = state.body_total_len.saturating_sub(old.body_len as u64);
        }
        state.postings.retain(|_, entries| {
            entries.retain(|e| e.doc_id != doc_id);
            !entries.is_empty()
        });
    }

    pub fn search(&self, query_str: &str, max: Option<usize>) -> Result<Vec<SearchHit>, IndexError> {
        let query = parse_query(query_str)?;
        self.searches_performed.fetch_add(1, Ordering::Relaxed);

        let state = self.snapshot();
        let limit = max.unwrap_or(self.config.default_k);

        let universe: HashSet<DocId> = state.documents.keys().copied().collect();
        let candidates = eval(&query, &state, &universe);

        let mut positive_terms = Vec::new();
        collect_positive_terms(&query, &mut positive_terms);

        let doc_count = state.document_count().max(1);
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for (_, term) in &positive_terms {
            let df = state
                .postings
                .get(term)
                .map(|entries| entries.iter().map(|e| e.doc_id).collect::<HashSet<_>>().len())
                .unwrap_or(0);
            doc_freq.insert(term.as_str(), df);
        }

        let matched_terms: HashSet<String> = positive_terms.iter().map(|(_, t)| t.clone()).collect();

        let mut scored: Vec<(f64, DocId)> = candidates
            .into_iter()
            .map(|doc_id| {
                let doc = &state.documents[&doc_id];
                let score = score_document(&state, doc, &positive_terms, &doc_freq, doc_count, &self.config);
                (score, doc_id)
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(score, doc_id)| {
                let doc = &state.documents[&doc_id];
                let snippet = build_snippet(
                    &doc.body,
                    &matched_terms,
                    self.config.snippet_max_fragments,
                    self.config.snippet_fallback_chars,
                );
                SearchHit {
                    url: doc.url.clone(),
                    title: doc.title.clone(),
                    snippet,
                    score,
                    host: doc.host.clone(),
                    crawl_timestamp: doc.crawl_timestamp,
                }
            })
            .collect())
    }

    pub fn stats(&self) -> IndexStats {
        let state = self.snapshot();
        IndexStats {
            documents_indexed: state.document_count(),
            bytes_on_disk: self.bytes_on_disk.load(Ordering::Relaxed),
            searches_performed: self.searches_performed.load(Ordering::Relaxed),
            last_upsert: *self.last_upsert.lock().expect("last-upsert lock poisoned"),
        }
    }

    pub fn snapshot_state(&self) -> Arc<IndexState> {
        self.snapshot()
    }

    pub fn next_doc_id(&self) -> u64 {
        self.next_doc_id.load(Ordering::SeqCst)
    }
}

fn add_postings(postings: &mut HashMap<String, Vec<PostingEntry>>, doc_id: DocId, field: Field, tokens: &[String]) {
    let mut freq: HashMap<&str, u32> = HashMap::new();
    for t in tokens {
        *freq.entry(t.as_str()).or_insert(0) += 1;
    }
    for (term, term_freq) in freq {
        postings.entry(term.to_string()).or_default().push(PostingEntry {
            doc_id,
            field,
            term_freq,
        });
    }
}

fn estimate_bytes(state: &IndexState) -> u64 {
    let doc_bytes: usize = state
        .documents
        .values()
        .map(|d| d.url.len() + d.title.len() + d.body.len() + d.host.len())
        .sum();
    let posting_bytes = state.postings.len() * 48
        + state
            .postings
            .values()
            .map(|v| v.len() * std::mem::size_of::<PostingEntry>())
            .sum::<usize>();
    (doc_bytes + posting_bytes) as u64
}

fn eval(query: &Query, state: &IndexState, universe: &HashSet<DocId>) -> HashSet<DocId> {
    match query {
        Query::Term { field, term } => postings_doc_ids(state, *field, term),
        Query::And(parts) => {
            let mut iter = parts.iter();
            let Some(first) = iter.next() else {
                return HashSet::new();
            };
            let mut acc = eval(first, state, universe);
            for part in iter {
                let next = eval(part, state, universe);
                acc = acc.intersection(&next).copied().collect();
            }
            acc
        }
        Query::Or(parts) => parts.iter().fold(HashSet::new(), |mut acc, part| {
            acc.extend(eval(part, state, universe));
            acc
        }),
        Query::Not(inner) => {
            let excluded = eval(inner, state, universe);
            universe.difference(&excluded).copied().collect()
        }
    }
}

fn postings_doc_ids(state: &IndexState, field: Option<Field>, term: &str) -> HashSet<DocId> {
    state
        .postings
        .get(term)
        .map(|entries| {
            entries
                .iter()
                .filter(|e| field.is_none_or_eq(e.field))
                .map(|e| e.doc_id)
                .collect()
        })
        .unwrap_or_default()
}

trait FieldFilter {
    fn is_none_or_eq(&self, other: Field) -> bool;
}

impl FieldFilter for Option<Field> {
    fn is_none_or_eq(&self, other: Field) -> bool {
        self.map(|f| f == other).unwrap_or(true)
    }
}

fn collect_positive_terms(query: &Query, out: &mut Vec<(Option<Field>, String)>) {
    match query {
        Query::Term { field, term } => out.push((*field, term.clone())),
        Query::And(parts) | Query::Or(parts) => {
            for p in parts {
                collect_positive_terms(p, out);
            }
        }
        Query::Not(_) => {}
    }
}

fn score_document(
    state: &IndexState,
    doc: &StoredDocument,
    positive_terms: &[(Option<Field>, String)],
    doc_freq: &HashMap<&str, usize>,
    doc_count: usize,
    config: &IndexRuntimeConfig,
) -> f64 {
    let mut score = 0.0;
    for (field_filter, term) in positive_terms {
        let Some(entries) = state.postings.get(term) else {
            continue;
        };
        let df = *doc_freq.get(term.as_str()).unwrap_or(&0);
        if df == 0 {
            continue;
        }
        let idf_value = idf(doc_count, df);
        for entry in entries.iter().filter(|e| e.doc_id == doc.doc_id) {
            if !field_filter.is_none_or_eq(entry.field) {
                continue;
            }
            let (field_len, avg_len, weight) = match entry.field {
                Field::Title => (doc.title_len, state.avg_title_length(), config.title_weight),
                Field::Body => (doc.body_len, state.avg_body_length(), config.body_weight),
            };
            score += idf_value * field_term_score(entry.term_freq, field_len, avg_len, weight, config.bm25);
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(url: &str, title: &str, body: &str) -> Document {
        Document {
            url: url.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            host: "example.com".to_string(),
            crawl_timestamp: Utc::now(),
        }
    }

    fn test_index() -> Index {
        Index::new(IndexRuntimeConfig {
            title_weight: 2.0,
            body_weight: 1.0,
            default_k: 10,
            snippet_max_fragments: 2,
            snippet_fallback_chars: 200,
            bm25: Bm25Params::default(),
        })
    }

    #[test]
    fn upsert_then_search_finds_document() {
        let idx = test_index();
        idx.upsert(doc("https://a.test/", "Rust Crawler", "a fast web crawler written in rust"));
        let hits = idx.search("crawler", None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://a.test/");
    }

    #[test]
    fn upsert_is_idempotent() {
        let idx = test_index();
        idx.upsert(doc("https://a.test/", "Rust Crawler", "a fast web crawler"));
        idx.upsert(doc("https://a.test/", "Rust Crawler", "a fast web crawler"));
        assert_eq!(idx.stats().documents_indexed, 1);
        let hits = idx.search("crawler", None).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn upsert_replaces_prior_content() {
        let idx = test_index();
        idx.upsert(doc("https://a.test/", "Old Title", "old content about widgets"));
        idx.upsert(doc("https://a.test/", "New Title", "new content about gadgets"));
        assert!(idx.search("widgets", None).unwrap().is_empty());
        assert_eq!(idx.search("gadgets", None).unwrap().len(), 1);
    }

    #[test]
    fn title_matches_score_higher_than_body_only() {
        let idx = test_index();
        idx.upsert(doc("https://title.test/", "crawler", "nothing relevant here at all"));
        idx.upsert(doc("https://body.test/", "unrelated", "this page mentions crawler in the body"));
        let hits = idx.search("crawler", None).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://title.test/");
    }

    #[test]
    fn boolean_not_excludes_matches() {
        let idx = test_index();
        idx.upsert(doc("https://a.test/", "a", "rust and python"));
        idx.upsert(doc("https://b.test/", "b", "rust only"));
        let hits = idx.search("rust NOT python", None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://b.test/");
    }

    #[test]
    fn field_prefix_restricts_match() {
        let idx = test_index();
        idx.upsert(doc("https://a.test/", "rust", "nothing about that topic"));
        let hits = idx.search("title:rust", None).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(idx.search("body:rust", None).unwrap().is_empty());
    }
}
