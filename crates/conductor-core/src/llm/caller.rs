//! HTTP model caller for hosted LLM APIs.
//!
//! Two wire formats are supported: the Anthropic Messages API and the
//! OpenAI-compatible chat-completions API (which also serves Gemini through
//! Google's OpenAI-compatible endpoint).

use async_trait::async_trait;
use serde_json::{json, Value};

use super::ModelProvider;
use crate::context::AgentContext;
use crate::error::{ConductorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFlavor {
    Anthropic,
    OpenAi,
}

/// Everything needed to call one hosted model.
#[derive(Debug, Clone)]
pub struct ModelCallConfig {
    /// Provider name used in logs and errors
    pub provider: String,
    pub flavor: ApiFlavor,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

pub struct HttpModelProvider {
    config: ModelCallConfig,
    client: reqwest::Client,
}

impl HttpModelProvider {
    pub fn new(config: ModelCallConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    pub fn config(&self) -> &ModelCallConfig {
        &self.config
    }

    fn error(&self, message: String) -> ConductorError {
        ConductorError::Provider {
            provider: self.config.provider.clone(),
            message,
        }
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value> {
        let request = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .json(body);
        let request = match self.config.flavor {
            ApiFlavor::Anthropic => request
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", "2023-06-01"),
            ApiFlavor::OpenAi => {
                request.header("Authorization", format!("Bearer {}", self.config.api_key))
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| self.error(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| self.error(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(self.error(format!("API returned {}: {}", status, response_text)));
        }

        serde_json::from_str(&response_text)
            .map_err(|e| self.error(format!("Failed to parse response JSON: {}", e)))
    }
}

#[async_trait]
impl ModelProvider for HttpModelProvider {
    fn name(&self) -> &str {
        &self.config.provider
    }

    async fn generate(
        &self,
        prompt: &str,
        context: &AgentContext,
        system_prompt: Option<&str>,
    ) -> Result<String> {
        let user_message = context.render(prompt);
        let base = self.config.base_url.trim_end_matches('/');

        let (url, body) = match self.config.flavor {
            ApiFlavor::Anthropic => (
                format!("{}/v1/messages", base),
                anthropic_body(&self.config, &user_message, system_prompt),
            ),
            ApiFlavor::OpenAi => (
                format!("{}/chat/completions", base),
                openai_body(&self.config, &user_message, system_prompt),
            ),
        };

        tracing::info!(
            "[ModelCaller] Calling {} API: {} (model: {})",
            self.config.provider,
            url,
            self.config.model
        );

        let json = self.post(&url, &body).await?;
        let content = match self.config.flavor {
            ApiFlavor::Anthropic => anthropic_text(&json),
            ApiFlavor::OpenAi => openai_text(&json),
        }
        .ok_or_else(|| self.error("Response contained no text content".to_string()))?;

        if let Some(usage) = json.get("usage") {
            tracing::debug!("[ModelCaller] {} usage: {}", self.config.provider, usage);
        }
        Ok(content)
    }
}

fn temperature_value(temp: f64) -> Value {
    Value::Number(serde_json::Number::from_f64(temp).unwrap_or_else(|| serde_json::Number::from(0)))
}

pub(crate) fn anthropic_body(
    config: &ModelCallConfig,
    user_message: &str,
    system_prompt: Option<&str>,
) -> Value {
    let mut body = json!({
        "model": config.model,
        "max_tokens": config.max_tokens,
        "messages": [
            { "role": "user", "content": user_message }
        ]
    });
    if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
        body["system"] = Value::String(system.to_string());
    }
    if let Some(temp) = config.temperature {
        body["temperature"] = temperature_value(temp);
    }
    body
}

pub(crate) fn openai_body(
    config: &ModelCallConfig,
    user_message: &str,
    system_prompt: Option<&str>,
) -> Value {
    let mut messages = vec![];
    if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.push(json!({ "role": "user", "content": user_message }));

    let mut body = json!({
        "model": config.model,
        "max_tokens": config.max_tokens,
        "messages": messages
    });
    if let Some(temp) = config.temperature {
        body["temperature"] = temperature_value(temp);
    }
    body
}

/// Concatenate the text blocks of an Anthropic response.
/// `None` when the response carries no text block at all.
pub(crate) fn anthropic_text(json: &Value) -> Option<String> {
    json.get("content")
        .and_then(|c| c.as_array())?
        .iter()
        .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
        .map(str::to_string)
        .reduce(|a, b| format!("{}\n{}", a, b))
}

/// First choice's message content of a chat-completions response.
pub(crate) fn openai_text(json: &Value) -> Option<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
}

/// Resolve environment variable references in a string.
/// Supports `${ENV_VAR}` and `${ENV_VAR:-default}`; unknown variables
/// without a default are left as written.
pub fn resolve_env_vars(input: &str) -> String {
    let Ok(re) = regex::Regex::new(r"\$\{([^}]+)\}") else {
        return input.to_string();
    };
    re.replace_all(input, |caps: &regex::Captures| {
        let var_expr = &caps[1];
        if let Some(idx) = var_expr.find(":-") {
            let var_name = &var_expr[..idx];
            let default_val = &var_expr[idx + 2..];
            std::env::var(var_name).unwrap_or_else(|_| default_val.to_string())
        } else {
            std::env::var(var_expr).unwrap_or_else(|_| format!("${{{}}}", var_expr))
        }
    })
    .to_string()
}
