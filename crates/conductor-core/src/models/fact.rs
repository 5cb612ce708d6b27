use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactKind {
    Fact,
    Decision,
    Requirement,
    Insight,
}

impl FactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Decision => "decision",
            Self::Requirement => "requirement",
            Self::Insight => "insight",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "fact" => Some(Self::Fact),
            "decision" => Some(Self::Decision),
            "requirement" => Some(Self::Requirement),
            "insight" => Some(Self::Insight),
            _ => None,
        }
    }
}

/// A structured item derived from an agent's output. Never authoritative:
/// the raw output in the memory store is the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactItem {
    #[serde(rename = "type")]
    pub kind: FactKind,
    pub content: String,
    pub source_agent: String,
    pub source_role: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl FactItem {
    pub fn new(kind: FactKind, content: &str, source_agent: &str, source_role: &str) -> Self {
        Self {
            kind,
            content: content.to_string(),
            source_agent: source_agent.to_string(),
            source_role: source_role.to_string(),
            confidence: 1.0,
            timestamp: Utc::now(),
        }
    }
}
