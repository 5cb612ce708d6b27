//! Runtime agents: a descriptor bound to a model provider.

use std::collections::HashMap;
use std::sync::Arc;

use crate::context::AgentContext;
use crate::error::{ConductorError, Result};
use crate::llm::{ModelProvider, ProviderFactory};
use crate::models::{AgentDescriptor, AgentIdentity};
use crate::tools::ToolSpec;
use crate::workflow::schema::ConductorConfig;

pub struct Agent {
    descriptor: AgentDescriptor,
    provider: Arc<dyn ModelProvider>,
}

impl Agent {
    pub fn new(descriptor: AgentDescriptor, provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            descriptor,
            provider,
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn role(&self) -> &str {
        &self.descriptor.role
    }

    pub fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    pub fn identity(&self) -> AgentIdentity {
        self.descriptor.identity()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn system_prompt(&self, tools: &[ToolSpec]) -> String {
        let d = &self.descriptor;
        let mut parts = vec![
            format!("You are a {}.", d.role),
            format!("Your goal is: {}", d.goal),
        ];
        if let Some(description) = &d.description {
            parts.push(format!("Description: {}", description));
        }
        if let Some(instruction) = &d.instruction {
            parts.push(format!("\nInstructions:\n{}", instruction));
        }
        if !tools.is_empty() {
            parts.push("\nYou have access to these tools:".to_string());
            for tool in tools {
                if tool.description.is_empty() {
                    parts.push(format!("- {}", tool.name));
                } else {
                    parts.push(format!("- {}: {}", tool.name, tool.description));
                }
            }
        }
        parts.push("\nProvide clear, well-structured responses that fulfill your goal.".to_string());
        parts.join("\n")
    }

    pub fn task_prompt(&self, context: &AgentContext) -> String {
        let mut parts = vec![
            format!("Complete your task as {}.", context.current_agent.role),
            format!("\nYour goal: {}", self.descriptor.goal),
        ];
        if !context.query.is_empty() {
            parts.push(format!("\nUser Query: {}", context.query));
        }
        parts.join("\n")
    }

    pub async fn execute(&self, context: &AgentContext, tools: &[ToolSpec]) -> Result<String> {
        let system = self.system_prompt(tools);
        let task = self.task_prompt(context);
        self.provider.generate(&task, context, Some(&system)).await
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.descriptor.id)
            .field("role", &self.descriptor.role)
            .field("provider", &self.provider.name())
            .finish()
    }
}

/// The agents of one orchestrator, in declaration order.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Agent>,
    order: Vec<String>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every declared agent, creating its model provider.
    pub fn from_config(config: &ConductorConfig, factory: &ProviderFactory) -> Result<Self> {
        let mut registry = Self::new();
        for descriptor in &config.agents {
            if registry.contains(&descriptor.id) {
                return Err(ConductorError::Config(format!(
                    "Duplicate agent id: '{}'",
                    descriptor.id
                )));
            }
            let provider = factory.create(&descriptor.model)?;
            registry.register(Agent::new(descriptor.clone(), provider));
        }
        Ok(registry)
    }

    /// Add an agent, replacing any existing one with the same id.
    pub fn register(&mut self, agent: Agent) {
        let id = agent.id().to_string();
        if self.agents.insert(id.clone(), agent).is_none() {
            self.order.push(id);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn require(&self, id: &str) -> Result<&Agent> {
        self.get(id)
            .ok_or_else(|| ConductorError::AgentNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.agents.contains_key(id)
    }

    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
