//! `conductor memory`: inspect stored workflow snapshots.

use std::path::Path;

use conductor_core::memory::MemorySnapshot;

use super::truncate;

/// Summarize the snapshot `{dir}/{workflow_id}.json`.
pub fn summary(workflow_id: &str, dir: &str) -> Result<String, String> {
    let snapshot = MemorySnapshot::read_from(Path::new(dir), workflow_id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("No snapshot for workflow '{}' in '{}'", workflow_id, dir))?;

    let mut lines = vec![
        format!("Workflow: {}", snapshot.workflow_id),
        format!("Created:  {}", snapshot.created_at.to_rfc3339()),
        format!("Updated:  {}", snapshot.updated_at.to_rfc3339()),
        format!("Events:   {}", snapshot.execution_log.len()),
        String::new(),
        format!("Agent outputs ({}):", snapshot.agent_outputs.len()),
    ];
    for (agent_id, output) in &snapshot.agent_outputs {
        lines.push(format!("  {:<16} {}", agent_id, truncate(output, 60)));
    }
    if !snapshot.persistent_data.is_empty() {
        lines.push(String::new());
        lines.push("Persistent data:".to_string());
        for (key, value) in &snapshot.persistent_data {
            lines.push(format!("  {} = {}", key, value));
        }
    }
    if let Some(last) = snapshot.execution_log.last() {
        lines.push(String::new());
        lines.push(format!("Last event: {}", last.event));
    }
    Ok(lines.join("\n"))
}

pub fn show(workflow_id: &str, dir: &str) -> Result<(), String> {
    println!("{}", summary(workflow_id, dir)?);
    Ok(())
}
