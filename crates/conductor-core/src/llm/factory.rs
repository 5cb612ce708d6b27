//! Maps model references to providers.
//!
//! A reference is either a key of the `models:` block or one of the builtin
//! provider names (`claude`/`anthropic`, `openai`, `gemini`, `echo`).

use std::collections::BTreeMap;
use std::sync::Arc;

use super::caller::{resolve_env_vars, ApiFlavor, HttpModelProvider, ModelCallConfig};
use super::static_provider::StaticProvider;
use super::ModelProvider;
use crate::error::{ConductorError, Result};
use crate::workflow::schema::ModelConfig;

struct ProviderDefaults {
    flavor: ApiFlavor,
    base_url: &'static str,
    model: &'static str,
    key_env: &'static str,
}

fn defaults_for(provider: &str) -> Option<ProviderDefaults> {
    match provider {
        "claude" | "anthropic" => Some(ProviderDefaults {
            flavor: ApiFlavor::Anthropic,
            base_url: "https://api.anthropic.com",
            model: "claude-sonnet-4-20250514",
            key_env: "ANTHROPIC_API_KEY",
        }),
        "openai" => Some(ProviderDefaults {
            flavor: ApiFlavor::OpenAi,
            base_url: "https://api.openai.com/v1",
            model: "gpt-4o",
            key_env: "OPENAI_API_KEY",
        }),
        "gemini" => Some(ProviderDefaults {
            flavor: ApiFlavor::OpenAi,
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai",
            model: "gemini-1.5-flash",
            key_env: "GOOGLE_API_KEY",
        }),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderFactory {
    models: BTreeMap<String, ModelConfig>,
}

impl ProviderFactory {
    pub fn new(models: BTreeMap<String, ModelConfig>) -> Self {
        Self { models }
    }

    pub fn create(&self, model_ref: &str) -> Result<Arc<dyn ModelProvider>> {
        let builtin;
        let config = match self.models.get(model_ref) {
            Some(config) => config,
            None => {
                builtin = ModelConfig {
                    provider: model_ref.to_lowercase(),
                    model: None,
                    max_tokens: 4096,
                    temperature: 0.7,
                    api_key: None,
                    base_url: None,
                };
                &builtin
            }
        };

        let provider = config.provider.to_lowercase();
        if provider == "echo" {
            return Ok(Arc::new(StaticProvider::echo()));
        }

        let Some(defaults) = defaults_for(&provider) else {
            return Err(ConductorError::Config(format!(
                "Unknown model '{}' (provider '{}')",
                model_ref, config.provider
            )));
        };

        let api_key = config
            .api_key
            .as_deref()
            .map(resolve_env_vars)
            .filter(|k| !k.is_empty() && !k.contains("${"))
            .or_else(|| std::env::var(defaults.key_env).ok().filter(|k| !k.is_empty()))
            .ok_or_else(|| {
                ConductorError::Config(format!(
                    "Missing API key for model '{}' (set {} or models.{}.api_key)",
                    model_ref, defaults.key_env, model_ref
                ))
            })?;

        let call = ModelCallConfig {
            provider: provider.clone(),
            flavor: defaults.flavor,
            base_url: config
                .base_url
                .as_deref()
                .map(resolve_env_vars)
                .unwrap_or_else(|| defaults.base_url.to_string()),
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| defaults.model.to_string()),
            max_tokens: config.max_tokens,
            temperature: Some(config.temperature),
        };

        tracing::debug!(
            "[ProviderFactory] '{}' -> {} ({})",
            model_ref,
            call.provider,
            call.model
        );
        Ok(Arc::new(HttpModelProvider::new(call)))
    }
}
