use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Everything the engine records in a workflow's execution log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    OrchestratorInitialized,
    ExecutionStart,
    ExecutionComplete,
    ExecutionFailed,
    AgentStart,
    AgentComplete,
    AgentError,
    IndexWriteFailed,
    FactExtractionFailed,
    ToolsLoaded,
    ToolsLoadFailed,
    SequentialStart,
    StepStart,
    StepComplete,
    StepFailed,
    SequentialComplete,
    ParallelStart,
    BranchStart,
    BranchComplete,
    BranchFailed,
    AggregatorStart,
    AggregatorComplete,
    AggregatorFailed,
    ParallelComplete,
    MemoryCleared,
    MemoryLoadFailed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrchestratorInitialized => "orchestrator_initialized",
            Self::ExecutionStart => "execution_start",
            Self::ExecutionComplete => "execution_complete",
            Self::ExecutionFailed => "execution_failed",
            Self::AgentStart => "agent_start",
            Self::AgentComplete => "agent_complete",
            Self::AgentError => "agent_error",
            Self::IndexWriteFailed => "index_write_failed",
            Self::FactExtractionFailed => "fact_extraction_failed",
            Self::ToolsLoaded => "tools_loaded",
            Self::ToolsLoadFailed => "tools_load_failed",
            Self::SequentialStart => "sequential_start",
            Self::StepStart => "step_start",
            Self::StepComplete => "step_complete",
            Self::StepFailed => "step_failed",
            Self::SequentialComplete => "sequential_complete",
            Self::ParallelStart => "parallel_start",
            Self::BranchStart => "branch_start",
            Self::BranchComplete => "branch_complete",
            Self::BranchFailed => "branch_failed",
            Self::AggregatorStart => "aggregator_start",
            Self::AggregatorComplete => "aggregator_complete",
            Self::AggregatorFailed => "aggregator_failed",
            Self::ParallelComplete => "parallel_complete",
            Self::MemoryCleared => "memory_cleared",
            Self::MemoryLoadFailed => "memory_load_failed",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the append-only execution log.
///
/// Event-specific fields are flattened next to `timestamp`/`event`/`agent_id`
/// so a persisted log reads as flat JSON objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub event: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl LogEvent {
    pub fn new(event: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
            agent_id: None,
            data: Map::new(),
        }
    }

    pub fn for_agent(event: EventKind, agent_id: &str) -> Self {
        Self {
            agent_id: Some(agent_id.to_string()),
            ..Self::new(event)
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}
