//! Conductor Core: orchestration engine for declarative agent workflows.
//!
//! A workflow is a set of named agents (a role, a goal and a model reference)
//! composed either into a sequential chain or a parallel fan-out with an
//! optional aggregator. Every agent call goes through the [`Orchestrator`],
//! which owns the [`MemoryStore`] for the run:
//!
//! - `memory`: authoritative per-agent outputs, execution log and an
//!   optional semantic index
//! - `extractor`: best-effort structured facts from agent output
//! - `context`: what each agent is allowed to see
//! - `strategy`: sequential and parallel execution
//! - `llm` / `tools`: model adapters and tool discovery
//! - `workflow`: YAML configuration and validation

pub mod agent;
pub mod context;
pub mod db;
pub mod error;
pub mod extractor;
pub mod llm;
pub mod memory;
pub mod models;
pub mod orchestrator;
pub mod strategy;
pub mod tools;
pub mod workflow;

// Convenience re-exports
pub use error::{ConductorError, Result};
pub use memory::MemoryStore;
pub use orchestrator::{ExecutionResult, Orchestrator};
pub use workflow::schema::ConductorConfig;
