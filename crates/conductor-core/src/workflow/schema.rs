//! YAML schema for workflow configuration files.
//!
//! ```yaml
//! name: "Market analysis"
//!
//! agents:
//!   - id: researcher
//!     role: Market Researcher
//!     goal: Collect market facts
//!     tools: ["server:search"]
//!   - id: writer
//!     role: Report Writer
//!     goal: Summarize the findings
//!     model: fast
//!
//! workflow:
//!   type: sequential          # sequential | parallel
//!   steps:
//!     - researcher
//!     - agent: writer
//!       input: "Write a one-page brief"
//!   context:
//!     mode: semantic          # deterministic (default) | semantic
//!     top_k: 5
//!
//! models:
//!   fast:
//!     provider: openai
//!     model: gpt-4o-mini
//!     api_key: "${OPENAI_API_KEY}"
//!
//! tool_servers:
//!   - id: search
//!     url: http://localhost:8080
//!
//! memory:
//!   dir: memory
//!   semantic_index: true
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{ConductorError, Result};
use crate::models::AgentDescriptor;

/// Provider names usable as a model reference without a `models:` entry.
pub const BUILTIN_PROVIDERS: &[&str] = &["claude", "anthropic", "openai", "gemini", "echo"];

/// Top-level configuration loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConductorConfig {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub agents: Vec<AgentDescriptor>,

    pub workflow: WorkflowConfig,

    /// Named model configurations referenced by `agent.model`
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,

    /// External tool sources, discovered once per run
    #[serde(default)]
    pub tool_servers: Vec<ToolServerConfig>,

    #[serde(default)]
    pub memory: MemoryConfig,
}

/// The `workflow:` block, as written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// "sequential" or "parallel"
    #[serde(rename = "type")]
    pub workflow_type: String,

    #[serde(default)]
    pub steps: Vec<StepRef>,

    #[serde(default)]
    pub branches: Vec<String>,

    /// Aggregator run after all parallel branches
    #[serde(default)]
    pub then: Option<StepRef>,

    #[serde(default)]
    pub context: ContextConfig,
}

/// A step is either a bare agent id or an agent with an input override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepRef {
    Agent(String),
    Detailed {
        agent: String,
        #[serde(default)]
        input: Option<String>,
    },
}

impl StepRef {
    pub fn agent(&self) -> &str {
        match self {
            StepRef::Agent(id) => id,
            StepRef::Detailed { agent, .. } => agent,
        }
    }

    pub fn input(&self) -> Option<&str> {
        match self {
            StepRef::Agent(_) => None,
            StepRef::Detailed { input, .. } => input.as_deref(),
        }
    }
}

impl std::fmt::Display for StepRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.agent())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    /// Agents see exactly the outputs the workflow shape grants them
    #[default]
    Deterministic,
    /// Agents see facts or outputs selected by similarity to the query
    Semantic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default)]
    pub mode: ContextMode,

    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            mode: ContextMode::default(),
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

/// A named model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// "anthropic" (alias "claude"), "openai", "gemini" or "echo"
    pub provider: String,

    /// Provider model id; the provider default when omitted
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// API key (supports `${ENV_VAR}` references)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f64 {
    0.7
}

/// An external tool source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolServerConfig {
    pub id: String,

    pub url: String,

    #[serde(default = "default_transport")]
    pub transport: String,

    /// Keep every discovered tool; otherwise only those named in `tools`
    #[serde(default = "default_true")]
    pub auto_discover: bool,

    #[serde(default)]
    pub tools: Vec<String>,
}

fn default_transport() -> String {
    "http".to_string()
}

fn default_true() -> bool {
    true
}

/// Memory, snapshot and semantic-index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Snapshot directory; no snapshot files are written when unset
    #[serde(default)]
    pub dir: Option<String>,

    #[serde(default)]
    pub semantic_index: bool,

    /// SQLite file for a persistent index; in-memory when unset
    #[serde(default)]
    pub index_path: Option<String>,

    #[serde(default = "default_embedding_dims")]
    pub embedding_dims: usize,

    /// Similarity hits must score strictly above this
    #[serde(default)]
    pub min_score: f32,

    #[serde(default = "default_true")]
    pub extract_facts: bool,
}

fn default_embedding_dims() -> usize {
    crate::memory::embedding::DEFAULT_EMBEDDING_DIMS
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dir: None,
            semantic_index: false,
            index_path: None,
            embedding_dims: default_embedding_dims(),
            min_score: 0.0,
            extract_facts: true,
        }
    }
}

impl ConductorConfig {
    /// Parse a configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| ConductorError::Config(format!("Failed to parse workflow YAML: {}", e)))
    }

    /// Load a configuration from a file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConductorError::Config(format!("Failed to read workflow file '{}': {}", path, e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn agent(&self, id: &str) -> Option<&AgentDescriptor> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Collect every consistency problem; all of them are reported at once.
    pub fn validate(&self) -> Result<()> {
        let errors = self.validation_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConductorError::Config(errors.join("; ")))
        }
    }

    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.agents.is_empty() {
            errors.push("No agents defined".to_string());
        }

        let mut agent_ids = HashSet::new();
        for agent in &self.agents {
            if !agent_ids.insert(agent.id.as_str()) {
                errors.push(format!("Duplicate agent id: '{}'", agent.id));
            }
        }

        let wf = &self.workflow;
        match wf.workflow_type.as_str() {
            "sequential" => {
                if wf.steps.is_empty() {
                    errors.push("Sequential workflow requires 'steps'".to_string());
                }
                for (i, step) in wf.steps.iter().enumerate() {
                    if !agent_ids.contains(step.agent()) {
                        errors.push(format!(
                            "Step {} references unknown agent: '{}'",
                            i + 1,
                            step.agent()
                        ));
                    }
                }
            }
            "parallel" => {
                if wf.branches.is_empty() {
                    errors.push("Parallel workflow requires 'branches'".to_string());
                }
                let mut seen = HashSet::new();
                for branch in &wf.branches {
                    if !agent_ids.contains(branch.as_str()) {
                        errors.push(format!("Branch references unknown agent: '{}'", branch));
                    }
                    if !seen.insert(branch.as_str()) {
                        errors.push(format!("Duplicate branch: '{}'", branch));
                    }
                }
                if let Some(then) = &wf.then {
                    if !agent_ids.contains(then.agent()) {
                        errors.push(format!("'then' references unknown agent: '{}'", then.agent()));
                    }
                }
            }
            other => errors.push(format!(
                "Invalid workflow type: '{}'. Must be 'sequential' or 'parallel'",
                other
            )),
        }

        for agent in &self.agents {
            if !self.models.contains_key(&agent.model)
                && !BUILTIN_PROVIDERS.contains(&agent.model.as_str())
            {
                errors.push(format!(
                    "Agent '{}' references unknown model: '{}'",
                    agent.id, agent.model
                ));
            }
        }

        let mut server_ids = HashSet::new();
        for server in &self.tool_servers {
            if !server_ids.insert(server.id.as_str()) {
                errors.push(format!("Duplicate tool server id: '{}'", server.id));
            }
            if server.transport != "http" {
                errors.push(format!(
                    "Tool server '{}' has unsupported transport: '{}'",
                    server.id, server.transport
                ));
            }
        }

        for agent in &self.agents {
            for tool in &agent.tools {
                if let Some(rest) = tool.strip_prefix("server:") {
                    let server_id = rest.split(':').next().unwrap_or_default();
                    if !server_ids.contains(server_id) {
                        errors.push(format!(
                            "Agent '{}' references unknown tool server: '{}'",
                            agent.id, server_id
                        ));
                    }
                }
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_sequential() {
        let yaml = r#"
agents:
  - id: a
    role: Researcher
    goal: Research
  - id: b
    role: Writer
    goal: Write
workflow:
  type: sequential
  steps: [a, b]
"#;
        let config = ConductorConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.agents[0].model, "claude");
        assert_eq!(config.workflow.steps, vec![StepRef::Agent("a".into()), StepRef::Agent("b".into())]);
        assert_eq!(config.workflow.context.mode, ContextMode::Deterministic);
        assert_eq!(config.workflow.context.top_k, 5);
        assert!(config.memory.extract_facts);
        assert!(!config.memory.semantic_index);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_parallel() {
        let yaml = r#"
name: "Market analysis"
agents:
  - id: researcher
    role: Market Researcher
    goal: Collect market facts
    tools: ["server:search", "server:search:web_search"]
  - id: analyst
    role: Analyst
    goal: Analyze
    model: fast
  - id: writer
    role: Writer
    goal: Summarize
workflow:
  type: parallel
  branches: [researcher, analyst]
  then:
    agent: writer
    input: "Write the brief"
  context:
    mode: semantic
    top_k: 3
models:
  fast:
    provider: openai
    model: gpt-4o-mini
tool_servers:
  - id: search
    url: http://localhost:8080
    auto_discover: false
    tools: [web_search]
memory:
  dir: memory
  semantic_index: true
  min_score: 0.1
"#;
        let config = ConductorConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.name.as_deref(), Some("Market analysis"));
        let then = config.workflow.then.as_ref().unwrap();
        assert_eq!(then.agent(), "writer");
        assert_eq!(then.input(), Some("Write the brief"));
        assert_eq!(config.workflow.context.mode, ContextMode::Semantic);
        assert_eq!(config.models["fast"].max_tokens, 4096);
        assert_eq!(config.models["fast"].temperature, 0.7);
        assert_eq!(config.tool_servers[0].transport, "http");
        assert!(!config.tool_servers[0].auto_discover);
        assert_eq!(config.memory.embedding_dims, 256);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let yaml = r#"
agents:
  - id: a
    role: R
    goal: G
    model: mystery
    tools: ["server:nowhere"]
  - id: a
    role: R
    goal: G
workflow:
  type: parallel
  branches: [a, ghost, a]
  then: phantom
tool_servers:
  - id: s
    url: http://x
    transport: websocket
"#;
        let config = ConductorConfig::from_yaml(yaml).unwrap();
        let errors = config.validation_errors();
        let joined = errors.join("; ");
        assert!(joined.contains("Duplicate agent id: 'a'"));
        assert!(joined.contains("Branch references unknown agent: 'ghost'"));
        assert!(joined.contains("Duplicate branch: 'a'"));
        assert!(joined.contains("'then' references unknown agent: 'phantom'"));
        assert!(joined.contains("unknown model: 'mystery'"));
        assert!(joined.contains("unsupported transport: 'websocket'"));
        assert!(joined.contains("unknown tool server: 'nowhere'"));

        let err = config.validate().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_validate_workflow_type_and_steps() {
        let yaml = r#"
agents:
  - id: a
    role: R
    goal: G
workflow:
  type: sequential
"#;
        let config = ConductorConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.validation_errors(), vec!["Sequential workflow requires 'steps'"]);

        let yaml = yaml.replace("sequential", "loop");
        let config = ConductorConfig::from_yaml(&yaml).unwrap();
        assert!(config.validation_errors()[0].starts_with("Invalid workflow type: 'loop'"));
    }

    #[test]
    fn test_parse_error_is_config_error() {
        let err = ConductorConfig::from_yaml("agents: [").unwrap_err();
        assert!(matches!(err, ConductorError::Config(_)));
    }
}
