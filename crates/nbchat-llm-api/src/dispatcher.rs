use nbchat_types::{ProviderConfig, ProviderKind};

use crate::catalog;
use crate::config::ClientFactory;
use crate::error::LlmError;
use crate::prompt::build_prompt;

/// Routes queries and model listings to the configured provider
#[derive(Clone, Default)]
pub struct Dispatcher {
    factory: ClientFactory,
}

impl Dispatcher {
    pub fn new(factory: ClientFactory) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &ClientFactory {
        &self.factory
    }

    /// Ask the configured provider `prompt`, prefixed with the notebook `context`.
    ///
    /// Every call sends the full prompt; nothing is cached and nothing is retried.
    pub async fn query(
        &self,
        prompt: &str,
        context: &str,
        config: &ProviderConfig,
        credential: Option<&str>,
    ) -> Result<String, LlmError> {
        let full_prompt = build_prompt(context, prompt);
        let client = self.factory.create(config.provider, &config.remote_api_url);
        log::debug!(
            "querying {} provider with model {} ({} prompt chars)",
            config.provider,
            config.model,
            full_prompt.chars().count()
        );
        client.complete(&config.model, &full_prompt, credential).await
    }

    /// Models offered by `provider`; empty when they could not be determined
    pub async fn list_models(
        &self,
        provider: ProviderKind,
        config: &ProviderConfig,
        credential: Option<&str>,
    ) -> Vec<String> {
        let client = self.factory.create(provider, &config.remote_api_url);
        catalog::list_models(client.as_ref(), credential).await
    }
}
