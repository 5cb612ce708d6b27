//! Model-call adapters.
//!
//! The engine only sees [`ModelProvider`]. `caller` talks to hosted APIs,
//! `factory` maps model references from the config to providers, and
//! `static_provider` gives deterministic replies for dry runs and tests.

pub mod caller;
pub mod factory;
pub mod static_provider;

use async_trait::async_trait;

use crate::context::AgentContext;
use crate::error::Result;

pub use caller::{resolve_env_vars, ApiFlavor, HttpModelProvider, ModelCallConfig};
pub use factory::ProviderFactory;
pub use static_provider::StaticProvider;

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name, for logs and error attribution.
    fn name(&self) -> &str;

    /// Generate a reply to `prompt`, given what the agent may see.
    async fn generate(
        &self,
        prompt: &str,
        context: &AgentContext,
        system_prompt: Option<&str>,
    ) -> Result<String>;
}
