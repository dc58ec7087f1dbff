pub mod openai;
pub mod stub;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::settings::ProviderSettings;

pub use openai::OpenAiProvider;
pub use stub::StubProvider;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("no API key configured")]
    MissingCredential,

    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider rejected the API key (HTTP {0})")]
    Unauthorized(u16),

    #[error("provider rate limit exceeded")]
    RateLimited,

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Produces improvement suggestions for a single shell command.
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    async fn generate(
        &self,
        command: &str,
        settings: &ProviderSettings,
    ) -> Result<String, ProviderError>;

    /// Short identifier reported by `/health`.
    fn name(&self) -> &'static str;
}

/// Build the provider selected by `provider.kind`.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn SuggestionProvider>, ProviderError> {
    match config.kind.as_str() {
        "stub" => Ok(Arc::new(StubProvider)),
        _ => Ok(Arc::new(OpenAiProvider::new(config)?)),
    }
}
