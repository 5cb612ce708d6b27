//! Context selection: what an agent is allowed to see when it runs.
//!
//! Agents never read each other's outputs directly. Every payload is built
//! here from `MemoryStore` state and tagged with its `context_mode`:
//!
//! | builder        | mode                                         |
//! |----------------|----------------------------------------------|
//! | `sequential`   | `sequential` (outputs of completed agents)   |
//! | `branch`       | `parallel` (query only)                      |
//! | `aggregator`   | `aggregator` (outputs of the branch ids)     |
//! | `semantic`     | `facts`, `semantic_outputs` or `all_outputs` |
//!
//! With semantic mode enabled and an index present, the sequential and
//! aggregator builders delegate to `semantic`. Branch contexts never do.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::memory::{FactHit, MemoryStore};
use crate::models::AgentIdentity;

const PREVIEW_CHARS: usize = 100;

/// One previous output made visible to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorOutput {
    pub agent_id: String,
    pub output: String,
    /// Similarity score, for outputs selected by semantic search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl PriorOutput {
    fn new(agent_id: &str, output: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            output: output.to_string(),
            score: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "context_mode", rename_all = "snake_case")]
pub enum ContextPayload {
    Sequential { previous_outputs: Vec<PriorOutput> },
    #[serde(rename = "parallel")]
    Branch,
    Aggregator { previous_outputs: Vec<PriorOutput> },
    Facts { relevant_facts: Vec<FactHit> },
    SemanticOutputs { previous_outputs: Vec<PriorOutput> },
    AllOutputs { previous_outputs: Vec<PriorOutput> },
}

impl ContextPayload {
    pub fn mode(&self) -> &'static str {
        match self {
            ContextPayload::Sequential { .. } => "sequential",
            ContextPayload::Branch => "parallel",
            ContextPayload::Aggregator { .. } => "aggregator",
            ContextPayload::Facts { .. } => "facts",
            ContextPayload::SemanticOutputs { .. } => "semantic_outputs",
            ContextPayload::AllOutputs { .. } => "all_outputs",
        }
    }
}

/// The full payload handed to one agent invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentContext {
    pub query: String,
    pub current_agent: AgentIdentity,
    #[serde(flatten)]
    pub payload: ContextPayload,
}

impl AgentContext {
    pub fn new(query: &str, agent: &AgentIdentity, payload: ContextPayload) -> Self {
        Self {
            query: query.to_string(),
            current_agent: agent.clone(),
            payload,
        }
    }

    pub fn mode(&self) -> &'static str {
        self.payload.mode()
    }

    pub fn previous_outputs(&self) -> &[PriorOutput] {
        match &self.payload {
            ContextPayload::Sequential { previous_outputs }
            | ContextPayload::Aggregator { previous_outputs }
            | ContextPayload::SemanticOutputs { previous_outputs }
            | ContextPayload::AllOutputs { previous_outputs } => previous_outputs,
            ContextPayload::Branch | ContextPayload::Facts { .. } => &[],
        }
    }

    pub fn previous_output(&self, agent_id: &str) -> Option<&str> {
        self.previous_outputs()
            .iter()
            .find(|p| p.agent_id == agent_id)
            .map(|p| p.output.as_str())
    }

    pub fn previous_agent_ids(&self) -> Vec<&str> {
        self.previous_outputs()
            .iter()
            .map(|p| p.agent_id.as_str())
            .collect()
    }

    pub fn relevant_facts(&self) -> &[FactHit] {
        match &self.payload {
            ContextPayload::Facts { relevant_facts } => relevant_facts,
            _ => &[],
        }
    }

    /// The user message a model adapter sends: visible context, the
    /// original query, then the task.
    pub fn render(&self, task: &str) -> String {
        let mut out = String::new();

        let facts = self.relevant_facts();
        if !facts.is_empty() {
            out.push_str("## Relevant Facts:\n");
            for hit in facts {
                out.push_str(&format!(
                    "- [{}] {} (from {})\n",
                    hit.fact.kind.as_str(),
                    hit.fact.content,
                    hit.fact.source_role
                ));
            }
            out.push_str("\n---\n\n");
        }

        let outputs = self.previous_outputs();
        if !outputs.is_empty() {
            out.push_str("## Previous Agent Outputs:\n");
            for prior in outputs {
                out.push_str(&format!("\n### {}:\n{}\n", prior.agent_id, prior.output));
            }
            out.push_str("\n---\n\n");
        }

        if !self.query.is_empty() {
            out.push_str(&format!("## Original Query:\n{}\n\n", self.query));
        }
        out.push_str(&format!("## Your Task:\n{}", task));
        out
    }

    /// Human-readable preview, for logs and the CLI.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Query: {}", self.query),
            format!(
                "Current Agent: {} ({})",
                self.current_agent.role, self.current_agent.id
            ),
            format!("Context Mode: {}", self.mode()),
        ];

        let facts = self.relevant_facts();
        if !facts.is_empty() {
            lines.push("Relevant Facts:".to_string());
            for hit in facts {
                lines.push(format!("  - {}", hit.fact.content));
            }
        }

        let outputs = self.previous_outputs();
        if !outputs.is_empty() {
            lines.push("Previous Outputs:".to_string());
            for prior in outputs {
                lines.push(format!("  - {}: {}", prior.agent_id, preview(&prior.output)));
            }
        }
        lines.join("\n")
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Builds contexts from the memory store of one run.
#[derive(Clone)]
pub struct ContextBuilder {
    memory: Arc<MemoryStore>,
    semantic_top_k: Option<usize>,
}

impl ContextBuilder {
    pub fn new(memory: Arc<MemoryStore>) -> Self {
        Self {
            memory,
            semantic_top_k: None,
        }
    }

    /// Opt in to semantic selection for sequential and aggregator contexts.
    pub fn with_semantic(mut self, top_k: usize) -> Self {
        self.semantic_top_k = Some(top_k);
        self
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    fn semantic_k(&self) -> Option<usize> {
        self.semantic_top_k.filter(|_| self.memory.has_index())
    }

    /// Outputs of the agents in `executed`, in that order.
    pub async fn sequential(
        &self,
        query: &str,
        agent: &AgentIdentity,
        executed: &[String],
    ) -> AgentContext {
        if let Some(k) = self.semantic_k() {
            return self.semantic(query, agent, k, &[]).await;
        }

        let previous_outputs = self.listed_outputs(executed);
        AgentContext::new(query, agent, ContextPayload::Sequential { previous_outputs })
    }

    /// Query only: branches never see each other.
    pub fn branch(&self, query: &str, agent: &AgentIdentity) -> AgentContext {
        AgentContext::new(query, agent, ContextPayload::Branch)
    }

    /// Outputs of exactly the declared branches, in declaration order.
    pub async fn aggregator(
        &self,
        query: &str,
        agent: &AgentIdentity,
        branch_ids: &[String],
    ) -> AgentContext {
        if let Some(k) = self.semantic_k() {
            return self.semantic(query, agent, k, &[]).await;
        }

        let previous_outputs = self.listed_outputs(branch_ids);
        AgentContext::new(query, agent, ContextPayload::Aggregator { previous_outputs })
    }

    /// Stored outputs of `ids` in order, each agent at most once.
    fn listed_outputs(&self, ids: &[String]) -> Vec<PriorOutput> {
        let mut seen = HashSet::new();
        ids.iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| self.memory.get_output(id).map(|o| PriorOutput::new(id, &o)))
            .collect()
    }

    /// Facts first, then similar outputs, then every stored output.
    /// The requesting agent is always excluded.
    pub async fn semantic(
        &self,
        query: &str,
        agent: &AgentIdentity,
        top_k: usize,
        exclude: &[String],
    ) -> AgentContext {
        let mut excluded: Vec<String> = exclude.to_vec();
        if !excluded.contains(&agent.id) {
            excluded.push(agent.id.clone());
        }

        if self.memory.has_index() {
            let relevant_facts = self.memory.search_facts(query, top_k, &excluded).await;
            if !relevant_facts.is_empty() {
                return AgentContext::new(query, agent, ContextPayload::Facts { relevant_facts });
            }

            let hits = self.memory.search_relevant_context(query, top_k, &excluded).await;
            let previous_outputs: Vec<PriorOutput> = hits
                .into_iter()
                .filter(|hit| !hit.output.is_empty())
                .map(|hit| PriorOutput {
                    agent_id: hit.agent_id,
                    output: hit.output,
                    score: Some(hit.score),
                })
                .collect();
            if !previous_outputs.is_empty() {
                return AgentContext::new(
                    query,
                    agent,
                    ContextPayload::SemanticOutputs { previous_outputs },
                );
            }
        }

        tracing::debug!(
            "[Context] No semantic matches for '{}', falling back to all outputs",
            agent.id
        );
        let previous_outputs = self
            .memory
            .get_all_outputs()
            .into_iter()
            .filter(|(id, _)| !excluded.contains(id))
            .map(|(id, output)| PriorOutput {
                agent_id: id,
                output,
                score: None,
            })
            .collect();
        AgentContext::new(query, agent, ContextPayload::AllOutputs { previous_outputs })
    }
}
