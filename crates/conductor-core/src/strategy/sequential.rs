use async_trait::async_trait;

use super::{ExecutionStrategy, StrategyScope};
use crate::error::{ConductorError, Result};
use crate::models::{EventKind, LogEvent};
use crate::workflow::WorkflowDefinition;

/// Runs steps one after another. Each step sees the outputs of the steps
/// that completed before it; the last output is the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialStrategy;

#[async_trait]
impl ExecutionStrategy for SequentialStrategy {
    fn name(&self) -> &'static str {
        "sequential"
    }

    async fn execute(
        &self,
        workflow: &WorkflowDefinition,
        query: &str,
        scope: StrategyScope<'_>,
    ) -> Result<String> {
        let WorkflowDefinition::Sequential { steps } = workflow else {
            return Err(ConductorError::Config(format!(
                "Sequential strategy cannot run a {} workflow",
                workflow.kind()
            )));
        };
        if steps.is_empty() {
            return Err(ConductorError::Config(
                "Sequential workflow requires at least one step".to_string(),
            ));
        }

        let runner = scope.runner;
        runner.record(LogEvent::new(EventKind::SequentialStart).with("steps", steps.len()));

        let mut completed: Vec<String> = Vec::with_capacity(steps.len());
        let mut final_output = String::new();

        for (i, step) in steps.iter().enumerate() {
            let agent = scope.agents.require(&step.agent_id)?;
            runner.record(LogEvent::for_agent(EventKind::StepStart, agent.id()).with("step", i));

            let context = scope
                .contexts
                .sequential(step.query(query), &agent.identity(), &completed)
                .await;

            match runner.run_agent(agent.id(), context).await {
                Ok(output) => {
                    runner.record(
                        LogEvent::for_agent(EventKind::StepComplete, agent.id())
                            .with("step", i)
                            .with("output_length", output.chars().count()),
                    );
                    // Re-entry overwrites the stored output; the id stays listed once.
                    if !completed.iter().any(|id| id == agent.id()) {
                        completed.push(agent.id().to_string());
                    }
                    final_output = output;
                }
                Err(e) => {
                    let e = e.at_step(i);
                    runner.record(
                        LogEvent::for_agent(EventKind::StepFailed, agent.id())
                            .with("step", i)
                            .with("error", e.to_string()),
                    );
                    tracing::warn!("[Sequential] Step {} ('{}') failed: {}", i, agent.id(), e);
                    return Err(e);
                }
            }
        }

        runner.record(
            LogEvent::new(EventKind::SequentialComplete).with("steps_completed", steps.len()),
        );
        Ok(final_output)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::agent::{Agent, AgentRegistry};
    use crate::context::ContextBuilder;
    use crate::llm::StaticProvider;
    use crate::memory::MemoryStore;
    use crate::models::AgentDescriptor;
    use crate::strategy::testing::ScriptedRunner;
    use crate::workflow::PlannedStep;

    fn registry(ids: &[&str]) -> AgentRegistry {
        let mut r = AgentRegistry::new();
        for id in ids {
            r.register(Agent::new(
                AgentDescriptor::new(id, &format!("{} role", id), "goal"),
                Arc::new(StaticProvider::echo()),
            ));
        }
        r
    }

    fn plan(ids: &[&str]) -> WorkflowDefinition {
        WorkflowDefinition::Sequential {
            steps: ids.iter().map(|id| PlannedStep::new(id)).collect(),
        }
    }

    #[tokio::test]
    async fn test_each_step_sees_only_earlier_steps() {
        let memory = Arc::new(MemoryStore::new("wf"));
        let runner = ScriptedRunner::new(memory.clone())
            .reply("a", "alpha")
            .reply("b", "beta")
            .reply("c", "gamma");
        let agents = registry(&["a", "b", "c"]);
        let contexts = ContextBuilder::new(memory);
        let scope = StrategyScope {
            agents: &agents,
            contexts: &contexts,
            runner: &runner,
        };

        let out = SequentialStrategy
            .execute(&plan(&["a", "b", "c"]), "X", scope)
            .await
            .unwrap();
        assert_eq!(out, "gamma");

        assert!(runner.context_for("a").previous_outputs().is_empty());
        assert_eq!(runner.context_for("b").previous_agent_ids(), vec!["a"]);
        assert_eq!(runner.context_for("c").previous_agent_ids(), vec!["a", "b"]);
        assert_eq!(runner.context_for("c").previous_output("b"), Some("beta"));

        assert_eq!(
            runner.events(),
            vec![
                "sequential_start",
                "step_start",
                "step_complete",
                "step_start",
                "step_complete",
                "step_start",
                "step_complete",
                "sequential_complete"
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_aborts_with_step_index() {
        let memory = Arc::new(MemoryStore::new("wf"));
        let runner = ScriptedRunner::new(memory.clone())
            .reply("a", "alpha")
            .fail("b", "rate limited")
            .reply("c", "never");
        let agents = registry(&["a", "b", "c"]);
        let contexts = ContextBuilder::new(memory.clone());
        let scope = StrategyScope {
            agents: &agents,
            contexts: &contexts,
            runner: &runner,
        };

        let err = SequentialStrategy
            .execute(&plan(&["a", "b", "c"]), "X", scope)
            .await
            .unwrap_err();
        match err {
            ConductorError::AgentExecution { agent_id, step, .. } => {
                assert_eq!(agent_id, "b");
                assert_eq!(step, Some(1));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(memory.get_output("a").as_deref(), Some("alpha"));
        assert_eq!(memory.get_output("c"), None);
        assert_eq!(runner.events().last().map(String::as_str), Some("step_failed"));
    }

    #[tokio::test]
    async fn test_repeated_agent_is_listed_once() {
        let memory = Arc::new(MemoryStore::new("wf"));
        let runner = ScriptedRunner::new(memory.clone())
            .reply("a", "alpha")
            .reply("b", "beta");
        let agents = registry(&["a", "b"]);
        let contexts = ContextBuilder::new(memory);
        let scope = StrategyScope {
            agents: &agents,
            contexts: &contexts,
            runner: &runner,
        };

        let out = SequentialStrategy
            .execute(&plan(&["a", "a", "b"]), "X", scope)
            .await
            .unwrap();
        assert_eq!(out, "beta");

        let ctx = runner.context_for("b");
        assert_eq!(ctx.previous_agent_ids(), vec!["a"]);
        assert_eq!(ctx.render("task").matches("### a:\nalpha").count(), 1);
    }

    #[tokio::test]
    async fn test_step_input_overrides_query() {
        let memory = Arc::new(MemoryStore::new("wf"));
        let runner = ScriptedRunner::new(memory.clone()).reply("a", "alpha");
        let agents = registry(&["a"]);
        let contexts = ContextBuilder::new(memory);
        let scope = StrategyScope {
            agents: &agents,
            contexts: &contexts,
            runner: &runner,
        };
        let wf = WorkflowDefinition::Sequential {
            steps: vec![PlannedStep::new("a").with_input("only for a")],
        };
        SequentialStrategy.execute(&wf, "X", scope).await.unwrap();
        assert_eq!(runner.context_for("a").query, "only for a");
    }

    #[tokio::test]
    async fn test_empty_or_mismatched_plan_is_config_error() {
        let memory = Arc::new(MemoryStore::new("wf"));
        let runner = ScriptedRunner::new(memory.clone());
        let agents = registry(&[]);
        let contexts = ContextBuilder::new(memory);
        let scope = StrategyScope {
            agents: &agents,
            contexts: &contexts,
            runner: &runner,
        };
        let err = SequentialStrategy.execute(&plan(&[]), "X", scope).await.unwrap_err();
        assert!(err.is_configuration());

        let parallel = WorkflowDefinition::Parallel {
            branches: vec!["a".to_string()],
            aggregator: None,
        };
        let err = SequentialStrategy.execute(&parallel, "X", scope).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(runner.events().is_empty());
    }
}
