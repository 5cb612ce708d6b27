//! `conductor validate`: check a workflow file without executing it.

use conductor_core::workflow::schema::{ConductorConfig, ContextMode};

use super::load_config;

/// Validate the file and describe the plan it declares.
pub fn describe(config_path: &str) -> Result<String, String> {
    let config = load_config(config_path)?;
    config.validate().map_err(|e| e.to_string())?;
    Ok(render_plan(&config, config_path))
}

pub fn validate(config_path: &str) -> Result<(), String> {
    println!("{}", describe(config_path)?);
    Ok(())
}

fn render_plan(config: &ConductorConfig, config_path: &str) -> String {
    let wf = &config.workflow;
    let mut lines = vec![format!(
        "Workflow '{}' is valid",
        config.name.as_deref().unwrap_or(config_path)
    )];
    lines.push(format!("   Type: {}", wf.workflow_type));
    lines.push(format!("   Agents: {}", config.agents.len()));

    let role = |id: &str| {
        config
            .agent(id)
            .map(|a| format!("{} ({}, model: {})", id, a.role, a.model))
            .unwrap_or_else(|| id.to_string())
    };

    if wf.workflow_type == "parallel" {
        for branch in &wf.branches {
            lines.push(format!("   | {}", role(branch)));
        }
        if let Some(then) = &wf.then {
            lines.push(format!("   then {}", role(then.agent())));
        }
    } else {
        for (i, step) in wf.steps.iter().enumerate() {
            let mut line = format!("   {}. {}", i + 1, role(step.agent()));
            if step.input().is_some() {
                line.push_str(" [custom input]");
            }
            lines.push(line);
        }
    }

    if wf.context.mode == ContextMode::Semantic {
        lines.push(format!("   Context: semantic (top_k: {})", wf.context.top_k));
    }
    if !config.tool_servers.is_empty() {
        lines.push(format!("   Tool servers: {}", config.tool_servers.len()));
    }
    lines.join("\n")
}
