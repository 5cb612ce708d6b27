use serde::{Deserialize, Serialize};

/// A named agent as declared in the `agents:` list of a workflow config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: String,
    pub role: String,
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tool references: `server:<id>`, `server:<id>:<tool>` or a bare tool name.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Model reference: a key of the `models:` block or a builtin provider name.
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String {
    "claude".to_string()
}

impl AgentDescriptor {
    pub fn new(id: &str, role: &str, goal: &str) -> Self {
        Self {
            id: id.to_string(),
            role: role.to_string(),
            goal: goal.to_string(),
            instruction: None,
            description: None,
            tools: Vec::new(),
            model: default_model(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_instruction(mut self, instruction: &str) -> Self {
        self.instruction = Some(instruction.to_string());
        self
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    pub fn identity(&self) -> AgentIdentity {
        AgentIdentity {
            id: self.id.clone(),
            role: self.role.clone(),
            goal: self.goal.clone(),
        }
    }
}

/// The part of a descriptor every context carries about the agent it is built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub id: String,
    pub role: String,
    pub goal: String,
}
