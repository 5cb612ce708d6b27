//! Orchestrator: the control authority for one workflow run.
//!
//! Strategies decide *who* runs next; the orchestrator is the only thing
//! that actually runs an agent. Every call goes through
//! [`AgentRunner::run_agent`], which:
//! 1. Resolves the agent and its tools
//! 2. Invokes the model with the context the strategy built
//! 3. Stores the raw output in memory
//! 4. Extracts and indexes facts on a best-effort basis
//!
//! `execute` turns every outcome, including configuration errors, into an
//! [`ExecutionResult`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentRegistry};
use crate::context::{AgentContext, ContextBuilder};
use crate::error::{ConductorError, Result};
use crate::extractor::FactExtractor;
use crate::llm::ProviderFactory;
use crate::memory::{
    HashingEmbedder, InMemoryIndex, MemorySnapshot, MemoryStore, SemanticIndex, SqliteIndex,
};
use crate::models::{EventKind, LogEvent};
use crate::strategy::{strategy_for, AgentRunner, StrategyScope};
use crate::tools::{LoadedTools, ToolRegistry, ToolSource};
use crate::workflow::schema::{
    ConductorConfig, ContextMode, MemoryConfig, WorkflowConfig,
};

/// Outcome of one `Orchestrator::execute` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub workflow_id: String,
    pub success: bool,
    pub final_output: String,
    pub agent_outputs: BTreeMap<String, String>,
    pub execution_log: Vec<LogEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_agent: Option<String>,
    /// Wall-clock seconds
    pub execution_time: f64,
}

pub struct Orchestrator {
    workflow_id: String,
    memory: Arc<MemoryStore>,
    agents: AgentRegistry,
    workflow: WorkflowConfig,
    contexts: ContextBuilder,
    tools: ToolRegistry,
    extractor: FactExtractor,
    extract_facts: bool,
}

/// A fresh workflow id: the first 8 characters of a v4 UUID.
pub fn generate_workflow_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Build an orchestrator from a parsed YAML configuration.
    ///
    /// Validates the whole configuration first, then creates one model
    /// provider per agent, the semantic index (when enabled) and the tool
    /// sources. Nothing is invoked until `execute`.
    pub fn from_config(config: &ConductorConfig, workflow_id: Option<&str>) -> Result<Self> {
        config.validate()?;

        let factory = ProviderFactory::new(config.models.clone());
        let agents = AgentRegistry::from_config(config, &factory)?;

        let mut builder = Self::builder()
            .agents(agents)
            .workflow(config.workflow.clone())
            .tools(ToolRegistry::from_config(&config.tool_servers))
            .extract_facts(config.memory.extract_facts);

        if let Some(id) = workflow_id {
            builder = builder.workflow_id(id);
        }
        if let Some(dir) = &config.memory.dir {
            builder = builder.snapshot_dir(dir);
        }
        if let Some(index) = build_index(&config.memory)? {
            builder = builder.index(index);
        } else if config.workflow.context.mode == ContextMode::Semantic {
            tracing::warn!(
                "[Orchestrator] Semantic context requested without 'memory.semantic_index'; using deterministic context"
            );
        }

        builder.build()
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn memory_state(&self) -> MemorySnapshot {
        self.memory.snapshot()
    }

    pub fn agent_output(&self, agent_id: &str) -> Option<String> {
        self.memory.get_output(agent_id)
    }

    pub fn execution_log(&self) -> Vec<LogEvent> {
        self.memory.get_log()
    }

    /// The tool discovery result, once tools have been loaded.
    pub fn loaded_tools(&self) -> Option<&LoadedTools> {
        self.tools.loaded()
    }

    /// Restore this workflow id's snapshot from the snapshot directory.
    pub async fn load_previous_memory(&self) -> bool {
        self.memory.load_from_file().await
    }

    /// Run the workflow on `query`.
    pub async fn execute(&self, query: &str) -> ExecutionResult {
        let started = Instant::now();
        tracing::info!(
            "[Orchestrator] Executing {} workflow {}",
            self.workflow.workflow_type,
            self.workflow_id
        );

        let outcome = self.run(query).await;

        let (success, final_output, error, failed_agent) = match outcome {
            Ok(output) => {
                self.memory.append_log(
                    LogEvent::new(EventKind::ExecutionComplete)
                        .with("output_length", output.chars().count()),
                );
                (true, output, None, None)
            }
            Err(e) => {
                tracing::error!("[Orchestrator] Workflow {} failed: {}", self.workflow_id, e);
                let failed_agent = e.agent_id().map(str::to_string);
                let mut event = LogEvent::new(EventKind::ExecutionFailed).with("error", e.to_string());
                if let Some(agent) = &failed_agent {
                    event = event.with("failed_agent", agent.as_str());
                }
                self.memory.append_log(event);
                (false, String::new(), Some(e.to_string()), failed_agent)
            }
        };

        if self.memory.snapshot_dir().is_some() {
            if let Err(e) = self.memory.save_to_file() {
                tracing::warn!("[Orchestrator] Failed to save snapshot: {}", e);
            }
        }

        let execution_time = started.elapsed().as_secs_f64();
        tracing::info!(
            "[Orchestrator] Workflow {} finished in {:.2}s (success: {})",
            self.workflow_id,
            execution_time,
            success
        );

        ExecutionResult {
            workflow_id: self.workflow_id.clone(),
            success,
            final_output,
            agent_outputs: self.memory.get_all_outputs(),
            execution_log: self.memory.get_log(),
            error,
            failed_agent,
            execution_time,
        }
    }

    async fn run(&self, query: &str) -> Result<String> {
        let definition = self.workflow.resolve(&self.agents)?;

        self.memory.append_log(
            LogEvent::new(EventKind::ExecutionStart)
                .with("query", query)
                .with("workflow_type", definition.kind()),
        );

        self.load_tools().await;

        let strategy = strategy_for(&definition);
        tracing::debug!("[Orchestrator] Using {} strategy", strategy.name());
        let scope = StrategyScope {
            agents: &self.agents,
            contexts: &self.contexts,
            runner: self,
        };
        strategy.execute(&definition, query, scope).await
    }

    async fn load_tools(&self) {
        if self.tools.source_count() == 0 || self.tools.loaded().is_some() {
            return;
        }
        let loaded = self.tools.load().await;
        for failure in &loaded.failures {
            self.memory.append_log(
                LogEvent::new(EventKind::ToolsLoadFailed)
                    .with("source", failure.source_id.as_str())
                    .with("error", failure.error.as_str()),
            );
        }
        self.memory.append_log(
            LogEvent::new(EventKind::ToolsLoaded)
                .with("count", loaded.len())
                .with("failed_sources", loaded.failures.len()),
        );
    }

    /// Extract facts from `output` and index them. Fails only on index errors.
    async fn index_facts(&self, agent: &Agent, output: &str) -> Result<usize> {
        let facts = self.extractor.extract(output, agent.id(), agent.role());
        self.memory.store_facts(agent.id(), agent.role(), &facts).await
    }
}

#[async_trait]
impl AgentRunner for Orchestrator {
    async fn run_agent(&self, agent_id: &str, context: AgentContext) -> Result<String> {
        let agent = self.agents.require(agent_id)?;
        self.memory.append_log(
            LogEvent::for_agent(EventKind::AgentStart, agent_id)
                .with("role", agent.role())
                .with("context_mode", context.mode()),
        );
        tracing::info!("[Orchestrator] Running agent '{}' ({})", agent_id, agent.role());
        tracing::debug!("[Orchestrator] Context for '{}':\n{}", agent_id, context.summary());

        let tools = self.tools.resolve(&agent.descriptor().tools);
        let output = match agent.execute(&context, &tools).await {
            Ok(output) => output,
            Err(e) => {
                let message = e.to_string();
                self.memory.append_log(
                    LogEvent::for_agent(EventKind::AgentError, agent_id).with("error", message.as_str()),
                );
                return Err(ConductorError::AgentExecution {
                    agent_id: agent_id.to_string(),
                    step: None,
                    message,
                });
            }
        };

        self.memory.store_output(agent_id, &output).await;

        let mut facts_extracted = 0;
        if self.extract_facts && self.memory.has_index() {
            match self.index_facts(agent, &output).await {
                Ok(n) => facts_extracted = n,
                Err(e) => {
                    tracing::warn!("[Orchestrator] Fact extraction failed for '{}': {}", agent_id, e);
                    self.memory.append_log(
                        LogEvent::for_agent(EventKind::FactExtractionFailed, agent_id)
                            .with("error", e.to_string()),
                    );
                }
            }
        }

        self.memory.append_log(
            LogEvent::for_agent(EventKind::AgentComplete, agent_id)
                .with("output_length", output.chars().count())
                .with("facts_extracted", facts_extracted),
        );
        Ok(output)
    }

    fn record(&self, event: LogEvent) {
        self.memory.append_log(event);
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("workflow_id", &self.workflow_id)
            .field("workflow_type", &self.workflow.workflow_type)
            .field("agents", &self.agents.ids())
            .field("has_index", &self.memory.has_index())
            .finish()
    }
}

/// The configured semantic index, if any.
fn build_index(config: &MemoryConfig) -> Result<Option<Arc<dyn SemanticIndex>>> {
    if !config.semantic_index {
        return Ok(None);
    }
    let embedder = Arc::new(HashingEmbedder::new(config.embedding_dims));
    let index: Arc<dyn SemanticIndex> = match &config.index_path {
        Some(path) => Arc::new(SqliteIndex::open(path, embedder)?.with_min_score(config.min_score)),
        None => Arc::new(InMemoryIndex::new(embedder).with_min_score(config.min_score)),
    };
    Ok(Some(index))
}

/// Programmatic construction, used by `from_config` and by tests.
pub struct OrchestratorBuilder {
    workflow_id: Option<String>,
    agents: AgentRegistry,
    workflow: Option<WorkflowConfig>,
    tools: ToolRegistry,
    index: Option<Arc<dyn SemanticIndex>>,
    snapshot_dir: Option<PathBuf>,
    extract_facts: bool,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self {
            workflow_id: None,
            agents: AgentRegistry::new(),
            workflow: None,
            tools: ToolRegistry::new(),
            index: None,
            snapshot_dir: None,
            extract_facts: true,
        }
    }
}

impl OrchestratorBuilder {
    pub fn workflow_id(mut self, id: &str) -> Self {
        self.workflow_id = Some(id.to_string());
        self
    }

    pub fn agent(mut self, agent: Agent) -> Self {
        self.agents.register(agent);
        self
    }

    pub fn agents(mut self, agents: AgentRegistry) -> Self {
        self.agents = agents;
        self
    }

    pub fn workflow(mut self, workflow: WorkflowConfig) -> Self {
        self.workflow = Some(workflow);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn tool_source(mut self, source: Arc<dyn ToolSource>) -> Self {
        self.tools = self.tools.with_source(source);
        self
    }

    pub fn index(mut self, index: Arc<dyn SemanticIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    pub fn extract_facts(mut self, enabled: bool) -> Self {
        self.extract_facts = enabled;
        self
    }

    /// Check the workflow against the registered agents and assemble the
    /// orchestrator. Configuration problems surface here, before any agent runs.
    pub fn build(self) -> Result<Orchestrator> {
        let workflow = self
            .workflow
            .ok_or_else(|| ConductorError::Config("No workflow configured".to_string()))?;
        let definition = workflow.resolve(&self.agents)?;

        let workflow_id = self.workflow_id.unwrap_or_else(generate_workflow_id);
        let mut memory = MemoryStore::new(workflow_id.clone());
        if let Some(index) = self.index {
            memory = memory.with_index(index);
        }
        if let Some(dir) = self.snapshot_dir {
            memory = memory.with_snapshot_dir(dir);
        }
        let memory = Arc::new(memory);

        let mut contexts = ContextBuilder::new(memory.clone());
        if workflow.context.mode == ContextMode::Semantic {
            contexts = contexts.with_semantic(workflow.context.top_k);
        }

        memory.append_log(
            LogEvent::new(EventKind::OrchestratorInitialized)
                .with("workflow_type", definition.kind())
                .with("agents", self.agents.len())
                .with("semantic_index", memory.has_index()),
        );
        tracing::info!(
            "[Orchestrator] Initialized workflow {} ({}, {} agents)",
            workflow_id,
            definition.kind(),
            self.agents.len()
        );

        Ok(Orchestrator {
            workflow_id,
            memory,
            agents: self.agents,
            workflow,
            contexts,
            tools: self.tools,
            extractor: FactExtractor::new(),
            extract_facts: self.extract_facts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StaticProvider;
    use crate::models::AgentDescriptor;
    use crate::workflow::schema::StepRef;

    fn agent(id: &str, provider: StaticProvider) -> Agent {
        Agent::new(
            AgentDescriptor::new(id, &format!("{} role", id), "goal"),
            Arc::new(provider),
        )
    }

    fn sequential(ids: &[&str]) -> WorkflowConfig {
        WorkflowConfig::sequential(ids.iter().map(|id| StepRef::Agent(id.to_string())).collect())
    }

    #[test]
    fn test_generated_workflow_id_is_eight_chars() {
        let id = generate_workflow_id();
        assert_eq!(id.len(), 8);
        assert_ne!(id, generate_workflow_id());
    }

    #[test]
    fn test_build_rejects_unknown_agent() {
        let err = Orchestrator::builder()
            .agent(agent("a", StaticProvider::reply("x")))
            .workflow(sequential(&["a", "ghost"]))
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_build_requires_workflow() {
        let err = Orchestrator::builder().build().unwrap_err();
        assert!(matches!(err, ConductorError::Config(_)));
    }

    #[tokio::test]
    async fn test_run_agent_records_start_and_complete() {
        let orchestrator = Orchestrator::builder()
            .workflow_id("wf1")
            .agent(agent("a", StaticProvider::reply("hello")))
            .workflow(sequential(&["a"]))
            .build()
            .unwrap();

        let result = orchestrator.execute("Q").await;
        assert!(result.success);
        assert_eq!(result.workflow_id, "wf1");
        assert_eq!(result.final_output, "hello");
        assert_eq!(orchestrator.agent_output("a").as_deref(), Some("hello"));

        let events: Vec<&str> = result.execution_log.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(
            events,
            vec![
                "orchestrator_initialized",
                "execution_start",
                "sequential_start",
                "step_start",
                "agent_start",
                "agent_complete",
                "step_complete",
                "sequential_complete",
                "execution_complete"
            ]
        );
        let complete = result
            .execution_log
            .iter()
            .find(|e| e.event == EventKind::AgentComplete)
            .unwrap();
        assert_eq!(complete.agent_id.as_deref(), Some("a"));
        assert_eq!(complete.get("output_length"), Some(&serde_json::json!(5)));
        assert_eq!(complete.get("facts_extracted"), Some(&serde_json::json!(0)));
    }

    #[tokio::test]
    async fn test_model_failure_becomes_agent_error() {
        let orchestrator = Orchestrator::builder()
            .agent(agent("a", StaticProvider::fail("quota exceeded")))
            .workflow(sequential(&["a"]))
            .build()
            .unwrap();

        let result = orchestrator.execute("Q").await;
        assert!(!result.success);
        assert_eq!(result.failed_agent.as_deref(), Some("a"));
        assert!(result.error.as_deref().unwrap().contains("quota exceeded"));
        assert!(result.final_output.is_empty());
        assert!(result
            .execution_log
            .iter()
            .any(|e| e.event == EventKind::AgentError));
        assert_eq!(
            result.execution_log.last().map(|e| e.event),
            Some(EventKind::ExecutionFailed)
        );
    }

    #[tokio::test]
    async fn test_facts_indexed_when_index_present() {
        let index = Arc::new(InMemoryIndex::new(Arc::new(HashingEmbedder::new(64))));
        let orchestrator = Orchestrator::builder()
            .workflow_id("wf")
            .agent(agent(
                "a",
                StaticProvider::reply(
                    "Findings:\n- The market grew twelve percent last year\n- Competitors raised prices in March",
                ),
            ))
            .workflow(sequential(&["a"]))
            .index(index.clone())
            .build()
            .unwrap();

        let result = orchestrator.execute("Q").await;
        assert!(result.success);
        // One full output plus two facts
        assert_eq!(index.count().await.unwrap(), 3);
        let complete = result
            .execution_log
            .iter()
            .find(|e| e.event == EventKind::AgentComplete)
            .unwrap();
        assert_eq!(complete.get("facts_extracted"), Some(&serde_json::json!(2)));
    }

    #[tokio::test]
    async fn test_fact_extraction_can_be_disabled() {
        let index = Arc::new(InMemoryIndex::new(Arc::new(HashingEmbedder::new(64))));
        let orchestrator = Orchestrator::builder()
            .workflow_id("wf")
            .agent(agent("a", StaticProvider::reply("- The market grew twelve percent")))
            .workflow(sequential(&["a"]))
            .index(index.clone())
            .extract_facts(false)
            .build()
            .unwrap();

        assert!(orchestrator.execute("Q").await.success);
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[test]
    fn test_from_config_builds_semantic_index() {
        let yaml = r#"
agents:
  - id: a
    role: Researcher
    goal: Research
    model: echo
workflow:
  type: sequential
  steps: [a]
  context:
    mode: semantic
memory:
  semantic_index: true
"#;
        let config = ConductorConfig::from_yaml(yaml).unwrap();
        let orchestrator = Orchestrator::from_config(&config, Some("abc")).unwrap();
        assert_eq!(orchestrator.workflow_id(), "abc");
        assert!(orchestrator.memory().has_index());
        assert_eq!(orchestrator.execution_log().len(), 1);
        assert_eq!(
            orchestrator.execution_log()[0].event,
            EventKind::OrchestratorInitialized
        );
    }
}
