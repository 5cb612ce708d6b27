//! Secondary semantic index over agent outputs and extracted facts.
//!
//! Entries are keyed `{workflow}_{agent}_output` for full outputs and
//! `{workflow}_{agent}_fact_{i}` for facts, so re-storing is an upsert.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::embedding::{cosine_similarity, Embedder};
use crate::error::Result;

/// `item_type` of an entry holding an agent's complete output.
pub const FULL_OUTPUT: &str = "full_output";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub workflow_id: String,
    pub agent_id: String,
    #[serde(default)]
    pub agent_role: Option<String>,
    /// `full_output`, or the fact kind (`fact`, `decision`, ...).
    pub item_type: String,
    pub content: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl IndexEntry {
    pub fn output(workflow_id: &str, agent_id: &str, content: &str) -> Self {
        Self {
            id: format!("{}_{}_output", workflow_id, agent_id),
            workflow_id: workflow_id.to_string(),
            agent_id: agent_id.to_string(),
            agent_role: None,
            item_type: FULL_OUTPUT.to_string(),
            content: content.to_string(),
            confidence: None,
            timestamp: Utc::now(),
        }
    }

    pub fn is_output(&self) -> bool {
        self.item_type == FULL_OUTPUT
    }

    pub fn in_scope(&self, scope: IndexScope) -> bool {
        match scope {
            IndexScope::Outputs => self.is_output(),
            IndexScope::Facts => !self.is_output(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexScope {
    Outputs,
    Facts,
}

#[derive(Debug, Clone)]
pub struct IndexFilter {
    pub workflow_id: String,
    pub scope: IndexScope,
    pub exclude_agents: Vec<String>,
}

impl IndexFilter {
    pub fn matches(&self, entry: &IndexEntry) -> bool {
        entry.workflow_id == self.workflow_id
            && entry.in_scope(self.scope)
            && !self.exclude_agents.iter().any(|a| a == &entry.agent_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub entry: IndexEntry,
    /// Cosine similarity to the query.
    pub score: f32,
}

#[async_trait]
pub trait SemanticIndex: Send + Sync {
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()>;

    async fn search(&self, query: &str, k: usize, filter: &IndexFilter) -> Result<Vec<IndexHit>>;

    /// Remove an agent's entries within one workflow, optionally limited to a scope.
    async fn delete_agent_items(
        &self,
        workflow_id: &str,
        agent_id: &str,
        scope: Option<IndexScope>,
    ) -> Result<usize>;

    async fn count(&self) -> Result<usize>;

    async fn clear(&self, workflow_id: &str) -> Result<()>;
}

/// Score candidates against the query vector and keep the best `k` above `min_score`.
pub(crate) fn rank_candidates(
    query: &[f32],
    candidates: impl IntoIterator<Item = (IndexEntry, Vec<f32>)>,
    k: usize,
    min_score: f32,
) -> Vec<IndexHit> {
    let mut hits: Vec<IndexHit> = candidates
        .into_iter()
        .map(|(entry, vector)| IndexHit {
            score: cosine_similarity(query, &vector),
            entry,
        })
        .filter(|hit| hit.score > min_score)
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entry.id.cmp(&b.entry.id))
    });
    hits.truncate(k);
    hits
}

/// Process-local index. Contents live as long as the value.
pub struct InMemoryIndex {
    embedder: Arc<dyn Embedder>,
    min_score: f32,
    entries: RwLock<BTreeMap<String, (IndexEntry, Vec<f32>)>>,
}

impl InMemoryIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            min_score: 0.0,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }
}

#[async_trait]
impl SemanticIndex for InMemoryIndex {
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let embedded: Vec<_> = entries
            .into_iter()
            .map(|e| {
                let v = self.embedder.embed(&e.content);
                (e, v)
            })
            .collect();
        let mut map = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for (entry, vector) in embedded {
            map.insert(entry.id.clone(), (entry, vector));
        }
        Ok(())
    }

    async fn search(&self, query: &str, k: usize, filter: &IndexFilter) -> Result<Vec<IndexHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let q = self.embedder.embed(query);
        let map = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let candidates = map
            .values()
            .filter(|(entry, _)| filter.matches(entry))
            .map(|(entry, vector)| (entry.clone(), vector.clone()));
        Ok(rank_candidates(&q, candidates, k, self.min_score))
    }

    async fn delete_agent_items(
        &self,
        workflow_id: &str,
        agent_id: &str,
        scope: Option<IndexScope>,
    ) -> Result<usize> {
        let mut map = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = map.len();
        map.retain(|_, (entry, _)| {
            !(entry.workflow_id == workflow_id
                && entry.agent_id == agent_id
                && scope.map_or(true, |s| entry.in_scope(s)))
        });
        Ok(before - map.len())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().unwrap_or_else(PoisonError::into_inner).len())
    }

    async fn clear(&self, workflow_id: &str) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, (entry, _)| entry.workflow_id != workflow_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::embedding::HashingEmbedder;

    fn index() -> InMemoryIndex {
        InMemoryIndex::new(Arc::new(HashingEmbedder::default()))
    }

    fn fact(wf: &str, agent: &str, i: usize, content: &str) -> IndexEntry {
        IndexEntry {
            id: format!("{}_{}_fact_{}", wf, agent, i),
            workflow_id: wf.to_string(),
            agent_id: agent.to_string(),
            agent_role: Some("Analyst".to_string()),
            item_type: "decision".to_string(),
            content: content.to_string(),
            confidence: Some(0.7),
            timestamp: Utc::now(),
        }
    }

    fn filter(scope: IndexScope, exclude: &[&str]) -> IndexFilter {
        IndexFilter {
            workflow_id: "wf".to_string(),
            scope,
            exclude_agents: exclude.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let idx = index();
        idx.upsert(vec![IndexEntry::output("wf", "a", "first draft")]).await.unwrap();
        idx.upsert(vec![IndexEntry::output("wf", "a", "second draft")]).await.unwrap();
        assert_eq!(idx.count().await.unwrap(), 1);

        let hits = idx.search("second draft", 5, &filter(IndexScope::Outputs, &[])).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.content, "second draft");
    }

    #[tokio::test]
    async fn test_search_respects_scope_exclusion_and_threshold() {
        let idx = index();
        idx.upsert(vec![
            IndexEntry::output("wf", "a", "premium pricing strategy"),
            IndexEntry::output("wf", "b", "pricing for enterprise customers"),
            IndexEntry::output("other", "c", "pricing pricing pricing"),
            fact("wf", "a", 0, "We recommend premium pricing"),
        ])
        .await
        .unwrap();

        let hits = idx.search("pricing", 10, &filter(IndexScope::Outputs, &["b"])).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.agent_id, "a");

        let facts = idx.search("pricing", 10, &filter(IndexScope::Facts, &[])).await.unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].entry.item_type, "decision");

        let none = idx.search("weather forecast", 10, &filter(IndexScope::Outputs, &[])).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_delete_agent_facts_only() {
        let idx = index();
        idx.upsert(vec![
            IndexEntry::output("wf", "a", "output text"),
            fact("wf", "a", 0, "fact zero"),
            fact("wf", "a", 1, "fact one"),
        ])
        .await
        .unwrap();

        let removed = idx.delete_agent_items("wf", "a", Some(IndexScope::Facts)).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(idx.count().await.unwrap(), 1);

        idx.clear("wf").await.unwrap();
        assert_eq!(idx.count().await.unwrap(), 0);
    }
}
