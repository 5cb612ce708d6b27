use async_trait::async_trait;
use futures::future::join_all;

use super::{ExecutionStrategy, StrategyScope};
use crate::agent::Agent;
use crate::error::{ConductorError, Result};
use crate::models::{EventKind, LogEvent};
use crate::workflow::WorkflowDefinition;

const COMBINED_HEADER: &str = "## Combined Results from Parallel Execution\n";

/// Runs every branch concurrently on the original query, then either hands
/// the branch outputs to an aggregator or concatenates them.
///
/// Branches are polled together on the caller's task rather than spawned,
/// so a single-threaded runtime still overlaps their I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelStrategy;

#[async_trait]
impl ExecutionStrategy for ParallelStrategy {
    fn name(&self) -> &'static str {
        "parallel"
    }

    async fn execute(
        &self,
        workflow: &WorkflowDefinition,
        query: &str,
        scope: StrategyScope<'_>,
    ) -> Result<String> {
        let WorkflowDefinition::Parallel {
            branches,
            aggregator,
        } = workflow
        else {
            return Err(ConductorError::Config(format!(
                "Parallel strategy cannot run a {} workflow",
                workflow.kind()
            )));
        };
        if branches.is_empty() {
            return Err(ConductorError::Config(
                "Parallel workflow requires at least one branch".to_string(),
            ));
        }

        // Resolve everything up front so an unknown agent fails before any branch runs.
        let branch_agents = branches
            .iter()
            .map(|id| scope.agents.require(id))
            .collect::<Result<Vec<&Agent>>>()?;
        let aggregator_agent = match aggregator {
            Some(step) => Some((step, scope.agents.require(&step.agent_id)?)),
            None => None,
        };

        let runner = scope.runner;
        runner.record(
            LogEvent::new(EventKind::ParallelStart)
                .with("branches", branches.len())
                .with("has_aggregator", aggregator.is_some()),
        );

        let results = join_all(branch_agents.iter().map(|agent| async move {
            runner.record(LogEvent::for_agent(EventKind::BranchStart, agent.id()));
            let context = scope.contexts.branch(query, &agent.identity());
            let result = runner.run_agent(agent.id(), context).await;
            match &result {
                Ok(output) => runner.record(
                    LogEvent::for_agent(EventKind::BranchComplete, agent.id())
                        .with("output_length", output.chars().count()),
                ),
                Err(e) => runner.record(
                    LogEvent::for_agent(EventKind::BranchFailed, agent.id())
                        .with("error", e.to_string()),
                ),
            }
            result
        }))
        .await;

        let mut outputs: Vec<(&Agent, String)> = Vec::with_capacity(results.len());
        for (agent, result) in branch_agents.iter().zip(results) {
            match result {
                Ok(output) => outputs.push((*agent, output)),
                Err(e) => {
                    tracing::warn!("[Parallel] Branch '{}' failed: {}", agent.id(), e);
                    return Err(e);
                }
            }
        }

        let final_output = match aggregator_agent {
            Some((step, agent)) => {
                runner.record(
                    LogEvent::for_agent(EventKind::AggregatorStart, agent.id())
                        .with("inputs", branches.len()),
                );
                let context = scope
                    .contexts
                    .aggregator(step.query(query), &agent.identity(), branches)
                    .await;
                match runner.run_agent(agent.id(), context).await {
                    Ok(output) => {
                        runner.record(
                            LogEvent::for_agent(EventKind::AggregatorComplete, agent.id())
                                .with("output_length", output.chars().count()),
                        );
                        output
                    }
                    Err(e) => {
                        runner.record(
                            LogEvent::for_agent(EventKind::AggregatorFailed, agent.id())
                                .with("error", e.to_string()),
                        );
                        return Err(e);
                    }
                }
            }
            None => combine_outputs(&outputs),
        };

        runner.record(
            LogEvent::new(EventKind::ParallelComplete).with("branches_completed", outputs.len()),
        );
        Ok(final_output)
    }
}

/// Concatenate branch outputs in declaration order, labelled by role.
fn combine_outputs(outputs: &[(&Agent, String)]) -> String {
    let mut lines = vec![COMBINED_HEADER.to_string()];
    for (agent, output) in outputs {
        lines.push(format!("### {} ({})\n", agent.role(), agent.id()));
        lines.push(output.clone());
        lines.push("\n---\n".to_string());
    }
    lines.join("\n")
}
