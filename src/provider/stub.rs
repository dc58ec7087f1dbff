use async_trait::async_trait;

use super::{ProviderError, SuggestionProvider};
use crate::settings::ProviderSettings;

/// Offline provider that answers instantly with a fixed template.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubProvider;

#[async_trait]
impl SuggestionProvider for StubProvider {
    async fn generate(
        &self,
        command: &str,
        _settings: &ProviderSettings,
    ) -> Result<String, ProviderError> {
        Ok(format!("Suggestions for: {command}"))
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}
