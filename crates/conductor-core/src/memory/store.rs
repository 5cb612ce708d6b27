//! `MemoryStore`: the per-run record of agent outputs and events.
//!
//! Outputs and the execution log are authoritative. The semantic index is a
//! secondary copy: writes to it never fail a store operation, and searches
//! degrade to empty results when it is absent or broken.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::index::{IndexEntry, IndexFilter, IndexScope, SemanticIndex};
use super::snapshot::MemorySnapshot;
use crate::error::{ConductorError, Result};
use crate::models::{EventKind, FactItem, FactKind, LogEvent};

/// A previous output found by similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputHit {
    pub agent_id: String,
    pub output: String,
    pub score: f32,
}

/// An extracted fact found by similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactHit {
    #[serde(flatten)]
    pub fact: FactItem,
    pub score: f32,
}

pub struct MemoryStore {
    workflow_id: String,
    state: RwLock<MemorySnapshot>,
    index: Option<Arc<dyn SemanticIndex>>,
    snapshot_dir: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        let workflow_id = workflow_id.into();
        Self {
            state: RwLock::new(MemorySnapshot::empty(&workflow_id)),
            workflow_id,
            index: None,
            snapshot_dir: None,
        }
    }

    pub fn with_index(mut self, index: Arc<dyn SemanticIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    pub fn snapshot_dir(&self) -> Option<&Path> {
        self.snapshot_dir.as_deref()
    }

    fn read(&self) -> RwLockReadGuard<'_, MemorySnapshot> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemorySnapshot> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Outputs ─────────────────────────────────────────────────────────

    /// Record an agent's output, overwriting any earlier one. Always succeeds.
    pub async fn store_output(&self, agent_id: &str, text: &str) {
        {
            let mut state = self.write();
            state.agent_outputs.insert(agent_id.to_string(), text.to_string());
            state.updated_at = Utc::now();
        }

        let indexed = match &self.index {
            Some(index) if text.trim().is_empty() => {
                // A blank output replaces whatever was indexed for this agent.
                let removed = index
                    .delete_agent_items(&self.workflow_id, agent_id, Some(IndexScope::Outputs))
                    .await
                    .map(|_| ());
                self.note_index_write(agent_id, removed);
                false
            }
            Some(index) => {
                let entry = IndexEntry::output(&self.workflow_id, agent_id, text);
                let written = index.upsert(vec![entry]).await;
                self.note_index_write(agent_id, written)
            }
            None => false,
        };

        tracing::debug!(
            "[Memory] Stored output for '{}' ({} chars, indexed: {})",
            agent_id,
            text.chars().count(),
            indexed
        );
    }

    fn note_index_write(&self, agent_id: &str, result: Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("[Memory] Index write failed for '{}': {}", agent_id, e);
                self.append_log(
                    LogEvent::for_agent(EventKind::IndexWriteFailed, agent_id)
                        .with("error", e.to_string()),
                );
                false
            }
        }
    }

    pub fn get_output(&self, agent_id: &str) -> Option<String> {
        self.read().agent_outputs.get(agent_id).cloned()
    }

    pub fn get_all_outputs(&self) -> BTreeMap<String, String> {
        self.read().agent_outputs.clone()
    }

    /// Exactly the requested ids that have a stored output.
    pub fn get_outputs_for(&self, ids: &[String]) -> BTreeMap<String, String> {
        let state = self.read();
        ids.iter()
            .filter_map(|id| state.agent_outputs.get(id).map(|o| (id.clone(), o.clone())))
            .collect()
    }

    // ── Execution log ───────────────────────────────────────────────────

    pub fn append_log(&self, event: LogEvent) {
        self.write().execution_log.push(event);
    }

    pub fn get_log(&self) -> Vec<LogEvent> {
        self.read().execution_log.clone()
    }

    // ── Persistent data ─────────────────────────────────────────────────

    pub fn set_persistent(&self, key: &str, value: impl Into<serde_json::Value>) {
        let mut state = self.write();
        state.persistent_data.insert(key.to_string(), value.into());
        state.updated_at = Utc::now();
    }

    pub fn get_persistent(&self, key: &str) -> Option<serde_json::Value> {
        self.read().persistent_data.get(key).cloned()
    }

    // ── Snapshots ───────────────────────────────────────────────────────

    pub fn snapshot(&self) -> MemorySnapshot {
        self.read().clone()
    }

    pub fn to_json(&self) -> Result<String> {
        self.snapshot().to_json()
    }

    /// Replace outputs, log and persistent data with a serialized snapshot.
    /// Returns `false` (and logs `memory_load_failed`) if it does not parse.
    pub async fn restore(&self, serialized: &str) -> bool {
        match MemorySnapshot::from_json(serialized) {
            Ok(snapshot) => {
                self.restore_snapshot(snapshot).await;
                true
            }
            Err(e) => {
                tracing::warn!("[Memory] Failed to restore snapshot: {}", e);
                self.append_log(
                    LogEvent::new(EventKind::MemoryLoadFailed).with("error", e.to_string()),
                );
                false
            }
        }
    }

    /// Wholesale replacement; the store keeps its own workflow id.
    pub async fn restore_snapshot(&self, snapshot: MemorySnapshot) {
        {
            let mut state = self.write();
            state.agent_outputs = snapshot.agent_outputs;
            state.execution_log = snapshot.execution_log;
            state.persistent_data = snapshot.persistent_data;
            state.created_at = snapshot.created_at;
            state.updated_at = Utc::now();
        }
        self.reindex_outputs().await;
    }

    /// Rebuild this workflow's index from the stored outputs. Facts are not
    /// part of a snapshot, so they are dropped along with the old entries.
    async fn reindex_outputs(&self) {
        let Some(index) = &self.index else {
            return;
        };
        self.clear_index().await;
        let entries: Vec<IndexEntry> = self
            .read()
            .agent_outputs
            .iter()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(agent_id, text)| IndexEntry::output(&self.workflow_id, agent_id, text))
            .collect();
        if entries.is_empty() {
            return;
        }
        let count = entries.len();
        match index.upsert(entries).await {
            Ok(()) => tracing::debug!("[Memory] Reindexed {} restored outputs", count),
            Err(e) => {
                tracing::warn!("[Memory] Failed to reindex restored outputs: {}", e);
                self.append_log(
                    LogEvent::new(EventKind::IndexWriteFailed).with("error", e.to_string()),
                );
            }
        }
    }

    /// Write `{workflow_id}.json` into the snapshot directory.
    pub fn save_to_file(&self) -> Result<PathBuf> {
        let dir = self.snapshot_dir.as_deref().ok_or_else(|| {
            ConductorError::Persistence("No snapshot directory configured".to_string())
        })?;
        let path = self.snapshot().write_to(dir)?;
        tracing::info!("[Memory] Saved snapshot to {}", path.display());
        Ok(path)
    }

    /// Load this workflow's snapshot file. A missing or corrupt file yields `false`.
    pub async fn load_from_file(&self) -> bool {
        let Some(dir) = self.snapshot_dir.as_deref() else {
            return false;
        };
        match MemorySnapshot::read_from(dir, &self.workflow_id) {
            Ok(Some(snapshot)) => {
                self.restore_snapshot(snapshot).await;
                tracing::info!("[Memory] Loaded snapshot for workflow {}", self.workflow_id);
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("[Memory] Failed to load snapshot: {}", e);
                self.append_log(
                    LogEvent::new(EventKind::MemoryLoadFailed).with("error", e.to_string()),
                );
                false
            }
        }
    }

    // ── Semantic index ──────────────────────────────────────────────────

    /// Index an agent's facts, replacing whatever it contributed before.
    /// Without an index this is a no-op.
    pub async fn store_facts(
        &self,
        agent_id: &str,
        agent_role: &str,
        facts: &[FactItem],
    ) -> Result<usize> {
        let Some(index) = &self.index else {
            return Ok(0);
        };

        index
            .delete_agent_items(&self.workflow_id, agent_id, Some(IndexScope::Facts))
            .await?;
        if facts.is_empty() {
            return Ok(0);
        }

        let entries = facts
            .iter()
            .enumerate()
            .map(|(i, fact)| IndexEntry {
                id: format!("{}_{}_fact_{}", self.workflow_id, agent_id, i),
                workflow_id: self.workflow_id.clone(),
                agent_id: agent_id.to_string(),
                agent_role: Some(agent_role.to_string()),
                item_type: fact.kind.as_str().to_string(),
                content: fact.content.clone(),
                confidence: Some(fact.confidence),
                timestamp: fact.timestamp,
            })
            .collect();
        index.upsert(entries).await?;

        tracing::debug!("[Memory] Indexed {} facts for '{}'", facts.len(), agent_id);
        Ok(facts.len())
    }

    /// Previous outputs most similar to `query`. Empty without an index or on error.
    pub async fn search_relevant_context(
        &self,
        query: &str,
        k: usize,
        exclude: &[String],
    ) -> Vec<OutputHit> {
        let Some(index) = &self.index else {
            return Vec::new();
        };
        let filter = IndexFilter {
            workflow_id: self.workflow_id.clone(),
            scope: IndexScope::Outputs,
            exclude_agents: exclude.to_vec(),
        };
        match index.search(query, k, &filter).await {
            Ok(hits) => hits
                .into_iter()
                .map(|hit| OutputHit {
                    agent_id: hit.entry.agent_id,
                    output: hit.entry.content,
                    score: hit.score,
                })
                .collect(),
            Err(e) => {
                tracing::warn!("[Memory] Output search failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Extracted facts most similar to `query`. Empty without an index or on error.
    pub async fn search_facts(&self, query: &str, k: usize, exclude: &[String]) -> Vec<FactHit> {
        let Some(index) = &self.index else {
            return Vec::new();
        };
        let filter = IndexFilter {
            workflow_id: self.workflow_id.clone(),
            scope: IndexScope::Facts,
            exclude_agents: exclude.to_vec(),
        };
        match index.search(query, k, &filter).await {
            Ok(hits) => hits
                .into_iter()
                .map(|hit| FactHit {
                    fact: FactItem {
                        kind: FactKind::from_str(&hit.entry.item_type).unwrap_or(FactKind::Fact),
                        content: hit.entry.content,
                        source_agent: hit.entry.agent_id,
                        source_role: hit.entry.agent_role.unwrap_or_default(),
                        confidence: hit.entry.confidence.unwrap_or(1.0),
                        timestamp: hit.entry.timestamp,
                    },
                    score: hit.score,
                })
                .collect(),
            Err(e) => {
                tracing::warn!("[Memory] Fact search failed: {}", e);
                Vec::new()
            }
        }
    }

    // ── Clearing ────────────────────────────────────────────────────────

    /// Drop all outputs (and their index entries); log and persistent data stay.
    pub async fn clear_outputs(&self) {
        {
            let mut state = self.write();
            state.agent_outputs.clear();
            state.updated_at = Utc::now();
        }
        self.clear_index().await;
        self.append_log(LogEvent::new(EventKind::MemoryCleared));
    }

    /// Drop everything except the workflow id.
    pub async fn clear_all(&self) {
        {
            let mut state = self.write();
            state.agent_outputs.clear();
            state.execution_log.clear();
            state.persistent_data.clear();
            state.updated_at = Utc::now();
        }
        self.clear_index().await;
    }

    async fn clear_index(&self) {
        if let Some(index) = &self.index {
            if let Err(e) = index.clear(&self.workflow_id).await {
                tracing::warn!("[Memory] Failed to clear index: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("workflow_id", &self.workflow_id)
            .field("agents", &self.read().agent_outputs.keys().collect::<Vec<_>>())
            .field("has_index", &self.has_index())
            .finish()
    }
}
