//! Tool discovery.
//!
//! Tool sources are queried once per orchestrator, lazily, before the first
//! workflow step. Agents reference tools as `server:<id>` (everything that
//! server offers), `server:<id>:<tool>` or a bare tool name. Invocation is
//! left to the model side; resolved tools are described in the system prompt.

pub mod http_source;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::error::Result;
use crate::workflow::schema::ToolServerConfig;

pub use http_source::HttpToolSource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Id of the source that offered the tool
    #[serde(default)]
    pub source: String,
}

impl ToolSpec {
    pub fn key(&self) -> String {
        format!("{}:{}", self.source, self.name)
    }
}

#[async_trait]
pub trait ToolSource: Send + Sync {
    fn id(&self) -> &str;
    async fn discover(&self) -> Result<Vec<ToolSpec>>;
}

#[derive(Debug, Clone)]
pub struct ToolLoadFailure {
    pub source_id: String,
    pub error: String,
}

/// Result of the one discovery pass: tools keyed `"{source}:{tool}"` and
/// the sources that failed (counted as offering nothing).
#[derive(Debug, Clone, Default)]
pub struct LoadedTools {
    pub tools: BTreeMap<String, ToolSpec>,
    pub failures: Vec<ToolLoadFailure>,
}

impl LoadedTools {
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tools matching an agent's references, deduplicated, in reference order.
    pub fn resolve(&self, refs: &[String]) -> Vec<ToolSpec> {
        let mut out: Vec<ToolSpec> = Vec::new();
        let mut push = |tool: &ToolSpec| {
            if !out.iter().any(|t| t.key() == tool.key()) {
                out.push(tool.clone());
            }
        };

        for r in refs {
            match r.strip_prefix("server:") {
                Some(rest) => match rest.split_once(':') {
                    Some((server, tool)) => {
                        if let Some(spec) = self.tools.get(&format!("{}:{}", server, tool)) {
                            push(spec);
                        }
                    }
                    None => self
                        .tools
                        .values()
                        .filter(|t| t.source == rest)
                        .for_each(&mut push),
                },
                None => self
                    .tools
                    .values()
                    .filter(|t| &t.name == r)
                    .for_each(&mut push),
            }
        }
        out
    }
}

/// Owned handle over the configured tool sources.
pub struct ToolRegistry {
    sources: Vec<Arc<dyn ToolSource>>,
    loaded: OnceCell<LoadedTools>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            loaded: OnceCell::new(),
        }
    }

    pub fn from_config(servers: &[ToolServerConfig]) -> Self {
        servers.iter().fold(Self::new(), |registry, server| {
            registry.with_source(Arc::new(HttpToolSource::new(server.clone())))
        })
    }

    pub fn with_source(mut self, source: Arc<dyn ToolSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Discover tools from every source. Runs once; later calls return the
    /// cached result.
    pub async fn load(&self) -> &LoadedTools {
        self.loaded
            .get_or_init(|| async {
                let mut loaded = LoadedTools::default();
                for source in &self.sources {
                    match source.discover().await {
                        Ok(tools) => {
                            tracing::info!(
                                "[Tools] Loaded {} tool(s) from '{}'",
                                tools.len(),
                                source.id()
                            );
                            for mut tool in tools {
                                tool.source = source.id().to_string();
                                loaded.tools.insert(tool.key(), tool);
                            }
                        }
                        Err(e) => {
                            tracing::warn!("[Tools] Failed to load tools from '{}': {}", source.id(), e);
                            loaded.failures.push(ToolLoadFailure {
                                source_id: source.id().to_string(),
                                error: e.to_string(),
                            });
                        }
                    }
                }
                loaded
            })
            .await
    }

    /// The discovery result, if `load` has run.
    pub fn loaded(&self) -> Option<&LoadedTools> {
        self.loaded.get()
    }

    pub fn resolve(&self, refs: &[String]) -> Vec<ToolSpec> {
        self.loaded
            .get()
            .map(|l| l.resolve(refs))
            .unwrap_or_default()
    }
}
