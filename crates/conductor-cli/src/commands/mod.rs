//! CLI command implementations.
//!
//! Each submodule backs one top-level command. Commands return
//! `Result<(), String>`; `main` prints the error and exits non-zero.

pub mod memory;
pub mod run;
pub mod validate;

use conductor_core::ConductorConfig;

/// Load a workflow configuration file, mapping errors for display.
pub fn load_config(path: &str) -> Result<ConductorConfig, String> {
    ConductorConfig::from_file(path).map_err(|e| e.to_string())
}

/// Load `.env.local` then `.env` from the working directory.
/// Variables that are already set are never overridden.
pub fn load_dotenv() {
    for filename in [".env.local", ".env"] {
        let Ok(content) = std::fs::read_to_string(filename) else {
            continue;
        };
        for (key, value) in content.lines().filter_map(parse_env_line) {
            if std::env::var_os(key).is_none() {
                std::env::set_var(key, value);
            }
        }
        tracing::info!("[CLI] Loaded environment from '{}'", filename);
    }
}

/// Parse one `KEY=VALUE` line; comments and blank lines yield `None`.
/// Surrounding single or double quotes are stripped from the value.
pub fn parse_env_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let value = value.trim();
    let value = ['"', '\'']
        .iter()
        .find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
        .unwrap_or(value);
    Some((key, value))
}

/// Shorten `text` to `max` characters for one-line previews.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
