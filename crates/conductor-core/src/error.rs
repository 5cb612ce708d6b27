//! Core error type for the Conductor engine.
//!
//! Configuration errors (`Config`, `AgentNotFound`) are raised before any
//! agent runs. Agent and model failures abort the current workflow. Index,
//! database and tool-source errors belong to secondary features and are
//! logged and isolated at their boundary.

pub type Result<T> = std::result::Result<T, ConductorError>;

#[derive(Debug, thiserror::Error)]
pub enum ConductorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Agent '{agent_id}' failed{}: {message}", step_suffix(.step))]
    AgentExecution {
        agent_id: String,
        step: Option<usize>,
        message: String,
    },

    #[error("Provider '{provider}' error: {message}")]
    Provider { provider: String, message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Tool source error: {0}")]
    ToolSource(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn step_suffix(step: &Option<usize>) -> String {
    match step {
        Some(i) => format!(" at step {}", i),
        None => String::new(),
    }
}

impl ConductorError {
    /// Configuration problems are detected before execution starts.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ConductorError::Config(_) | ConductorError::AgentNotFound(_))
    }

    /// Annotate an agent failure with the sequential step it happened at.
    /// Other variants are returned unchanged.
    pub fn at_step(self, index: usize) -> Self {
        match self {
            ConductorError::AgentExecution {
                agent_id, message, ..
            } => ConductorError::AgentExecution {
                agent_id,
                step: Some(index),
                message,
            },
            other => other,
        }
    }

    /// The agent this error is attributed to, if any.
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            ConductorError::AgentExecution { agent_id, .. } => Some(agent_id),
            ConductorError::AgentNotFound(id) => Some(id),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for ConductorError {
    fn from(e: rusqlite::Error) -> Self {
        ConductorError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for ConductorError {
    fn from(e: serde_json::Error) -> Self {
        ConductorError::Persistence(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_execution_message_includes_step() {
        let err = ConductorError::AgentExecution {
            agent_id: "writer".to_string(),
            step: None,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Agent 'writer' failed: boom");

        let err = err.at_step(2);
        assert_eq!(err.to_string(), "Agent 'writer' failed at step 2: boom");
        assert_eq!(err.agent_id(), Some("writer"));
    }

    #[test]
    fn test_configuration_class() {
        assert!(ConductorError::Config("x".into()).is_configuration());
        assert!(ConductorError::AgentNotFound("x".into()).is_configuration());
        assert!(!ConductorError::Index("x".into()).is_configuration());
        assert!(matches!(
            ConductorError::Index("x".into()).at_step(1),
            ConductorError::Index(_)
        ));
    }
}
