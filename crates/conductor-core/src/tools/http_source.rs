use async_trait::async_trait;
use serde::Deserialize;

use super::{ToolSource, ToolSpec};
use crate::error::{ConductorError, Result};
use crate::workflow::schema::ToolServerConfig;

#[derive(Debug, Deserialize)]
struct DiscoveryResponse {
    #[serde(default)]
    tools: Vec<ToolSpec>,
}

/// Discovers tools with `GET {url}/tools`, expecting
/// `{"tools": [{"name", "description"?, "endpoint"?}]}`.
pub struct HttpToolSource {
    config: ToolServerConfig,
    client: reqwest::Client,
}

impl HttpToolSource {
    pub fn new(config: ToolServerConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn error(&self, message: String) -> ConductorError {
        ConductorError::ToolSource(format!("{}: {}", self.config.id, message))
    }

    /// Apply defaults and the `auto_discover: false` allow-list.
    fn select(&self, tools: Vec<ToolSpec>) -> Vec<ToolSpec> {
        tools
            .into_iter()
            .filter(|t| self.config.auto_discover || self.config.tools.contains(&t.name))
            .map(|mut t| {
                if t.endpoint.is_none() {
                    t.endpoint = Some(format!("/tools/{}", t.name));
                }
                t.source = self.config.id.clone();
                t
            })
            .collect()
    }
}

#[async_trait]
impl ToolSource for HttpToolSource {
    fn id(&self) -> &str {
        &self.config.id
    }

    async fn discover(&self) -> Result<Vec<ToolSpec>> {
        let url = format!("{}/tools", self.config.url.trim_end_matches('/'));
        tracing::debug!("[Tools] Discovering tools at {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.error(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.error(format!("discovery returned {}", status)));
        }

        let body: DiscoveryResponse = response
            .json()
            .await
            .map_err(|e| self.error(format!("invalid discovery response: {}", e)))?;
        Ok(self.select(body.tools))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(auto_discover: bool, tools: &[&str]) -> ToolServerConfig {
        ToolServerConfig {
            id: "search".to_string(),
            url: "http://localhost:1".to_string(),
            transport: "http".to_string(),
            auto_discover,
            tools: tools.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn parse(json: &str) -> Vec<ToolSpec> {
        serde_json::from_str::<DiscoveryResponse>(json).unwrap().tools
    }

    #[test]
    fn test_select_applies_allow_list_and_defaults() {
        let tools = parse(r#"{"tools": [{"name": "web", "description": "Search"}, {"name": "news", "endpoint": "/n"}]}"#);

        let all = HttpToolSource::new(server(true, &[])).select(tools.clone());
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].endpoint.as_deref(), Some("/tools/web"));
        assert_eq!(all[1].endpoint.as_deref(), Some("/n"));
        assert!(all.iter().all(|t| t.source == "search"));

        let picked = HttpToolSource::new(server(false, &["news"])).select(tools);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "news");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_error() {
        let source = HttpToolSource::new(server(true, &[]));
        let err = source.discover().await.unwrap_err();
        assert!(matches!(err, ConductorError::ToolSource(_)));
    }
}
