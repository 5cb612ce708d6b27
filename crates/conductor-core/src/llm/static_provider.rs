use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::ModelProvider;
use crate::context::AgentContext;
use crate::error::{ConductorError, Result};

#[derive(Debug, Clone)]
enum Behavior {
    Reply(String),
    Fail(String),
    Echo,
}

/// Deterministic provider: a fixed reply, a fixed failure, or an echo of the
/// rendered prompt. Every context it receives is recorded.
pub struct StaticProvider {
    name: String,
    behavior: Behavior,
    delay: Option<Duration>,
    calls: Mutex<Vec<AgentContext>>,
}

impl StaticProvider {
    fn with_behavior(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(text: &str) -> Self {
        Self::with_behavior("static", Behavior::Reply(text.to_string()))
    }

    pub fn fail(message: &str) -> Self {
        Self::with_behavior("static", Behavior::Fail(message.to_string()))
    }

    pub fn echo() -> Self {
        Self::with_behavior("echo", Behavior::Echo)
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<AgentContext> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl ModelProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        prompt: &str,
        context: &AgentContext,
        _system_prompt: Option<&str>,
    ) -> Result<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(context.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behavior {
            Behavior::Reply(text) => Ok(text.clone()),
            Behavior::Fail(message) => Err(ConductorError::Provider {
                provider: self.name.clone(),
                message: message.clone(),
            }),
            Behavior::Echo => Ok(context.render(prompt)),
        }
    }
}
