use serde::{Deserialize, Serialize};

use crate::canonical_url::CanonicalUrl;

/// The extracted page content the fetcher hands to the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchDocument {
    pub title: Option<String>,
    pub body: String,
}

/// The successful outcome of fetching one URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub final_url: CanonicalUrl,
    pub links: Vec<CanonicalUrl>,
    pub document: FetchDocument,
}
