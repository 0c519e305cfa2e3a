//! # Index Module
//!
//! In-memory search engine behind `memory://` URLs. Indexes advanced records by
//! name and answers the textual lookups used by search-based linking and fusing.

use crate::driver::{Driver, SearchEngineClient, SearchEngineDriver, SearchHit};
use crate::error::Result;
use crate::model::{RecordAlterOperation, SpgRecord, SpgRecordManipulateCmd};
use crate::schema::SpgTypeIdentifier;
use dashmap::DashMap;
use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

const EXACT_NAME_SCORE: f64 = 1.0;
const EXACT_ID_SCORE: f64 = 0.9;
const TOKEN_OVERLAP_WEIGHT: f64 = 0.8;

#[derive(Debug, Clone)]
struct SearchDoc {
    id: String,
    name: String,
    tokens: HashSet<String>,
}

impl SearchDoc {
    fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            tokens: tokenize(name),
        }
    }

    /// Exact name beats exact id beats token overlap (Jaccard).
    fn score(&self, query: &str, query_tokens: &HashSet<String>) -> f64 {
        if self.name.trim().eq_ignore_ascii_case(query) {
            return EXACT_NAME_SCORE;
        }
        if self.id == query {
            return EXACT_ID_SCORE;
        }
        if self.tokens.is_empty() || query_tokens.is_empty() {
            return 0.0;
        }
        let shared = self.tokens.intersection(query_tokens).count();
        let union = self.tokens.union(query_tokens).count();
        TOKEN_OVERLAP_WEIGHT * shared as f64 / union as f64
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Documents grouped by type, each group in insertion order.
#[derive(Debug, Default)]
pub struct MemorySearchEngine {
    docs: RwLock<HashMap<String, IndexMap<String, SearchDoc>>>,
}

impl MemorySearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a document directly.
    pub fn put(&self, spg_type: &str, id: &str, name: &str) {
        self.docs
            .write()
            .entry(spg_type.to_string())
            .or_default()
            .insert(id.to_string(), SearchDoc::new(id, name));
    }

    pub fn len(&self) -> usize {
        self.docs.read().values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, spg_type: &str, id: &str) -> bool {
        self.docs
            .read()
            .get(spg_type)
            .map(|group| group.contains_key(id))
            .unwrap_or(false)
    }
}

impl SearchEngineClient for MemorySearchEngine {
    fn manipulate_record(&self, cmd: &SpgRecordManipulateCmd) -> Result<()> {
        let mut docs = self.docs.write();
        for item in &cmd.items {
            // relations are not searchable
            let SpgRecord::Advanced(record) = &item.record else {
                continue;
            };
            let group = docs.entry(record.type_name().to_string()).or_default();
            match item.operation {
                RecordAlterOperation::Upsert => {
                    group.insert(record.id.clone(), SearchDoc::new(&record.id, &record.name()));
                }
                RecordAlterOperation::Delete => {
                    group.shift_remove(&record.id);
                }
            }
        }
        debug!(items = cmd.items.len(), "search engine applied command");
        Ok(())
    }

    fn search(
        &self,
        spg_type: &SpgTypeIdentifier,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let query = text.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let query_tokens = tokenize(query);
        let docs = self.docs.read();
        let Some(group) = docs.get(spg_type.as_str()) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<SearchHit> = group
            .values()
            .filter_map(|doc| {
                let score = doc.score(query, &query_tokens);
                (score > 0.0).then(|| SearchHit {
                    id: doc.id.clone(),
                    name: doc.name.clone(),
                    score,
                })
            })
            .collect();
        // stable: equal scores keep insertion order
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// `memory://` driver. Every distinct URL maps to one shared engine instance.
#[derive(Debug, Default)]
pub struct MemorySearchEngineDriver {
    instances: DashMap<String, Arc<MemorySearchEngine>>,
}

impl MemorySearchEngineDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instance(&self, url: &str) -> Arc<MemorySearchEngine> {
        Arc::clone(
            self.instances
                .entry(url.to_string())
                .or_insert_with(|| Arc::new(MemorySearchEngine::new()))
                .value(),
        )
    }
}

impl Driver for MemorySearchEngineDriver {
    fn driver_name(&self) -> &str {
        "memory-search-engine"
    }

    fn accepts_scheme(&self, scheme: &str) -> bool {
        scheme == "memory"
    }
}

impl SearchEngineDriver for MemorySearchEngineDriver {
    fn connect(&self, url: &str) -> Result<Arc<dyn SearchEngineClient>> {
        Ok(self.instance(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city() -> SpgTypeIdentifier {
        "Demo.City".into()
    }

    #[test]
    fn test_exact_name_ranks_first() {
        let engine = MemorySearchEngine::new();
        engine.put("Demo.City", "c9", "Beijing Capital Region");
        engine.put("Demo.City", "c1", "Beijing");
        engine.put("Demo.City", "c2", "Shanghai");

        let hits = engine.search(&city(), " beijing ", 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "c1");
        assert_eq!(hits[0].score, EXACT_NAME_SCORE);
        assert_eq!(hits[1].id, "c9");
    }

    #[test]
    fn test_search_scoped_by_type_and_top_k() {
        let engine = MemorySearchEngine::new();
        engine.put("Demo.City", "c1", "Beijing North");
        engine.put("Demo.City", "c2", "Beijing South");
        engine.put("Demo.Person", "p1", "Beijing");

        let hits = engine.search(&city(), "Beijing", 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "c1");
        assert!(engine.search(&"Demo.Other".into(), "Beijing", 5).unwrap().is_empty());
        assert!(engine.search(&city(), "  ", 5).unwrap().is_empty());
    }

    #[test]
    fn test_exact_id_match() {
        let engine = MemorySearchEngine::new();
        engine.put("Demo.City", "BJ", "Peking");
        let hits = engine.search(&city(), "BJ", 5).unwrap();
        assert_eq!(hits[0].score, EXACT_ID_SCORE);
    }
}
