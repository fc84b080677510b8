//! Full-text search collaborator
//!
//! The registry hands package documents to a [`SearchIndex`] after they are
//! written and asks it for ranked, fuzzy name matches. The engine's ranking is
//! its own business; the registry only consumes `(score, name)` hits.

use crate::types::SearchHit;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Failure reported by the search engine, carried as a single value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct SearchError(pub String);

/// What the registry sends to the engine for indexing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDocument {
    pub name: String,
    pub author: String,
    pub description: Option<String>,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn index(&self, document: PackageDocument) -> Result<(), SearchError>;

    async fn remove(&self, name: &str) -> Result<(), SearchError>;

    /// Fuzzy match on package name, best hits first, at most `limit` of them
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// Score assigned to substring matches that fall outside the edit budget
const SUBSTRING_SCORE: f64 = 0.25;

/// In-process index with edit-distance fuzziness
#[derive(Default)]
pub struct MemorySearchIndex {
    documents: RwLock<BTreeMap<String, PackageDocument>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

/// Edits tolerated for a query term of the given length
fn edit_budget(term_len: usize) -> usize {
    match term_len {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Relevance of `name` for `query`, `None` when it does not match
pub fn fuzzy_score(query: &str, name: &str) -> Option<f64> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }
    let distance = levenshtein(&query, name);
    if distance <= edit_budget(query.chars().count()) {
        Some(1.0 / (1.0 + distance as f64))
    } else if name.contains(&query) {
        Some(SUBSTRING_SCORE)
    } else {
        None
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn index(&self, document: PackageDocument) -> Result<(), SearchError> {
        debug!(package = %document.name, "Indexing package");
        self.documents
            .write()
            .await
            .insert(document.name.clone(), document);
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), SearchError> {
        self.documents.write().await.remove(name);
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let documents = self.documents.read().await;
        let mut hits: Vec<SearchHit> = documents
            .keys()
            .filter_map(|name| {
                fuzzy_score(query, name).map(|score| SearchHit {
                    score,
                    name: name.clone(),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        hits.truncate(limit);
        Ok(hits)
    }
}
