//! `conductor run`: execute a workflow against a query.

use conductor_core::orchestrator::ExecutionResult;
use conductor_core::Orchestrator;

use super::{load_config, load_dotenv};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub workflow_id: Option<String>,
    /// Restore the snapshot of `workflow_id` before executing
    pub resume: bool,
    /// Print the full `ExecutionResult` as JSON
    pub json: bool,
}

/// Build the orchestrator from `config_path` and execute `query`.
pub async fn execute(
    config_path: &str,
    query: &str,
    options: &RunOptions,
) -> Result<ExecutionResult, String> {
    let config = load_config(config_path)?;
    if options.resume && options.workflow_id.is_none() {
        return Err("--resume requires --workflow-id".to_string());
    }
    if options.resume && config.memory.dir.is_none() {
        return Err("--resume requires 'memory.dir' in the configuration".to_string());
    }

    let orchestrator = Orchestrator::from_config(&config, options.workflow_id.as_deref())
        .map_err(|e| e.to_string())?;

    if options.resume {
        if orchestrator.load_previous_memory().await {
            tracing::info!("[CLI] Resumed workflow {}", orchestrator.workflow_id());
        } else {
            tracing::warn!(
                "[CLI] No snapshot found for workflow {}; starting fresh",
                orchestrator.workflow_id()
            );
        }
    }

    Ok(orchestrator.execute(query).await)
}

pub async fn run(config_path: &str, query: &str, options: RunOptions) -> Result<(), String> {
    load_dotenv();

    let result = execute(config_path, query, &options).await?;

    if options.json {
        let json = serde_json::to_string_pretty(&result).map_err(|e| e.to_string())?;
        println!("{}", json);
    } else if result.success {
        println!("{}", result.final_output);
        eprintln!(
            "\nWorkflow {} completed in {:.2}s ({} agent output(s))",
            result.workflow_id,
            result.execution_time,
            result.agent_outputs.len()
        );
    }

    if result.success {
        Ok(())
    } else {
        Err(format!(
            "Workflow {} failed: {}",
            result.workflow_id,
            result.error.as_deref().unwrap_or("unknown error")
        ))
    }
}
