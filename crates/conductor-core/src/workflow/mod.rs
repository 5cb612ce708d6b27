//! Workflow configuration and its resolved, typed form.
//!
//! `schema` holds the YAML shape as written. [`WorkflowConfig::resolve`]
//! turns the `workflow:` block into a [`WorkflowDefinition`] once every
//! agent reference has been checked, so strategies never see an
//! unknown agent or an empty plan.

pub mod schema;

use std::collections::HashSet;

use crate::agent::AgentRegistry;
use crate::error::{ConductorError, Result};
use schema::{ContextConfig, StepRef, WorkflowConfig};

/// One planned agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub agent_id: String,
    /// Replaces the workflow query for this step only
    pub input: Option<String>,
}

impl PlannedStep {
    pub fn new(agent_id: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            input: None,
        }
    }

    pub fn with_input(mut self, input: &str) -> Self {
        self.input = Some(input.to_string());
        self
    }

    /// The query this step runs with.
    pub fn query<'a>(&'a self, workflow_query: &'a str) -> &'a str {
        self.input.as_deref().unwrap_or(workflow_query)
    }
}

impl From<&StepRef> for PlannedStep {
    fn from(step: &StepRef) -> Self {
        Self {
            agent_id: step.agent().to_string(),
            input: step.input().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowDefinition {
    Sequential {
        steps: Vec<PlannedStep>,
    },
    Parallel {
        branches: Vec<String>,
        aggregator: Option<PlannedStep>,
    },
}

impl WorkflowDefinition {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowDefinition::Sequential { .. } => "sequential",
            WorkflowDefinition::Parallel { .. } => "parallel",
        }
    }

    /// Every agent the plan will invoke, in invocation order.
    pub fn agent_ids(&self) -> Vec<&str> {
        match self {
            WorkflowDefinition::Sequential { steps } => {
                steps.iter().map(|s| s.agent_id.as_str()).collect()
            }
            WorkflowDefinition::Parallel {
                branches,
                aggregator,
            } => branches
                .iter()
                .map(String::as_str)
                .chain(aggregator.iter().map(|a| a.agent_id.as_str()))
                .collect(),
        }
    }

    /// Check shape and agent references against a registry.
    pub fn check(&self, registry: &AgentRegistry) -> Result<()> {
        match self {
            WorkflowDefinition::Sequential { steps } => {
                if steps.is_empty() {
                    return Err(ConductorError::Config(
                        "Sequential workflow requires at least one step".to_string(),
                    ));
                }
            }
            WorkflowDefinition::Parallel { branches, .. } => {
                if branches.is_empty() {
                    return Err(ConductorError::Config(
                        "Parallel workflow requires at least one branch".to_string(),
                    ));
                }
                let mut seen = HashSet::new();
                if let Some(dup) = branches.iter().find(|b| !seen.insert(b.as_str())) {
                    return Err(ConductorError::Config(format!(
                        "Duplicate branch: '{}'",
                        dup
                    )));
                }
            }
        }

        for id in self.agent_ids() {
            if !registry.contains(id) {
                return Err(ConductorError::AgentNotFound(id.to_string()));
            }
        }
        Ok(())
    }
}

impl WorkflowConfig {
    pub fn sequential(steps: Vec<StepRef>) -> Self {
        Self {
            workflow_type: "sequential".to_string(),
            steps,
            branches: Vec::new(),
            then: None,
            context: ContextConfig::default(),
        }
    }

    pub fn parallel(branches: Vec<String>, then: Option<StepRef>) -> Self {
        Self {
            workflow_type: "parallel".to_string(),
            steps: Vec::new(),
            branches,
            then,
            context: ContextConfig::default(),
        }
    }

    /// Resolve into a typed plan, failing on any configuration problem.
    pub fn resolve(&self, registry: &AgentRegistry) -> Result<WorkflowDefinition> {
        let definition = match self.workflow_type.as_str() {
            "sequential" => WorkflowDefinition::Sequential {
                steps: self.steps.iter().map(PlannedStep::from).collect(),
            },
            "parallel" => WorkflowDefinition::Parallel {
                branches: self.branches.clone(),
                aggregator: self.then.as_ref().map(PlannedStep::from),
            },
            other => {
                return Err(ConductorError::Config(format!(
                    "Unknown workflow type: '{}'",
                    other
                )))
            }
        };
        definition.check(registry)?;
        Ok(definition)
    }
}
