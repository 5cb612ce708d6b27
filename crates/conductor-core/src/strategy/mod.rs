//! Execution strategies.
//!
//! A strategy decides the order agents run in and what each one sees. It
//! never calls a model itself: every invocation goes through the
//! [`AgentRunner`] the orchestrator hands it, and events are recorded
//! through the same callback.

pub mod parallel;
pub mod sequential;

use async_trait::async_trait;

use crate::agent::AgentRegistry;
use crate::context::{AgentContext, ContextBuilder};
use crate::error::Result;
use crate::models::LogEvent;
use crate::workflow::WorkflowDefinition;

pub use parallel::ParallelStrategy;
pub use sequential::SequentialStrategy;

/// The single way a strategy can cause an agent to run.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run_agent(&self, agent_id: &str, context: AgentContext) -> Result<String>;

    /// Append an event to the run's execution log.
    fn record(&self, event: LogEvent);
}

/// What a strategy may use during one execution.
#[derive(Clone, Copy)]
pub struct StrategyScope<'a> {
    pub agents: &'a AgentRegistry,
    pub contexts: &'a ContextBuilder,
    pub runner: &'a dyn AgentRunner,
}

#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run the workflow and return its final output.
    async fn execute(
        &self,
        workflow: &WorkflowDefinition,
        query: &str,
        scope: StrategyScope<'_>,
    ) -> Result<String>;
}

/// The strategy matching a workflow's kind.
pub fn strategy_for(workflow: &WorkflowDefinition) -> Box<dyn ExecutionStrategy> {
    match workflow {
        WorkflowDefinition::Sequential { .. } => Box::new(SequentialStrategy),
        WorkflowDefinition::Parallel { .. } => Box::new(ParallelStrategy),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A runner backed by a fixed table of replies, for strategy tests.

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::ConductorError;
    use crate::memory::MemoryStore;

    pub struct ScriptedRunner {
        pub memory: Arc<MemoryStore>,
        replies: HashMap<String, std::result::Result<String, String>>,
        pub seen: Mutex<Vec<(String, AgentContext)>>,
    }

    impl ScriptedRunner {
        pub fn new(memory: Arc<MemoryStore>) -> Self {
            Self {
                memory,
                replies: HashMap::new(),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn reply(mut self, agent: &str, text: &str) -> Self {
            self.replies.insert(agent.to_string(), Ok(text.to_string()));
            self
        }

        pub fn fail(mut self, agent: &str, message: &str) -> Self {
            self.replies.insert(agent.to_string(), Err(message.to_string()));
            self
        }

        pub fn context_for(&self, agent: &str) -> AgentContext {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .find(|(id, _)| id == agent)
                .map(|(_, ctx)| ctx.clone())
                .unwrap()
        }

        pub fn events(&self) -> Vec<String> {
            self.memory
                .get_log()
                .iter()
                .map(|e| e.event.as_str().to_string())
                .collect()
        }
    }

    #[async_trait]
    impl AgentRunner for ScriptedRunner {
        async fn run_agent(&self, agent_id: &str, context: AgentContext) -> Result<String> {
            self.seen
                .lock()
                .unwrap()
                .push((agent_id.to_string(), context));
            match self.replies.get(agent_id) {
                Some(Ok(text)) => {
                    self.memory.store_output(agent_id, text).await;
                    Ok(text.clone())
                }
                Some(Err(message)) => Err(ConductorError::AgentExecution {
                    agent_id: agent_id.to_string(),
                    step: None,
                    message: message.clone(),
                }),
                None => Err(ConductorError::AgentNotFound(agent_id.to_string())),
            }
        }

        fn record(&self, event: LogEvent) {
            self.memory.append_log(event);
        }
    }
}
