use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConductorError, Result};
use crate::models::LogEvent;

/// Serialized state of one workflow run, persisted as `{workflow_id}.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub workflow_id: String,
    #[serde(default)]
    pub agent_outputs: BTreeMap<String, String>,
    #[serde(default)]
    pub execution_log: Vec<LogEvent>,
    #[serde(default)]
    pub persistent_data: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemorySnapshot {
    pub fn empty(workflow_id: &str) -> Self {
        let now = Utc::now();
        Self {
            workflow_id: workflow_id.to_string(),
            agent_outputs: BTreeMap::new(),
            execution_log: Vec::new(),
            persistent_data: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn file_path(dir: &Path, workflow_id: &str) -> PathBuf {
        dir.join(format!("{}.json", workflow_id))
    }

    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|e| {
            ConductorError::Persistence(format!("Failed to create '{}': {}", dir.display(), e))
        })?;
        let path = Self::file_path(dir, &self.workflow_id);
        std::fs::write(&path, self.to_json()?).map_err(|e| {
            ConductorError::Persistence(format!("Failed to write '{}': {}", path.display(), e))
        })?;
        Ok(path)
    }

    /// `Ok(None)` when no snapshot exists for the workflow.
    pub fn read_from(dir: &Path, workflow_id: &str) -> Result<Option<Self>> {
        let path = Self::file_path(dir, workflow_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|e| {
            ConductorError::Persistence(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_json(&content).map(Some)
    }
}
