use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::history::{HistoryError, HistorySource};
use crate::provider::{ProviderError, SuggestionProvider};
use crate::settings::SettingsHandle;
use crate::storage::SuggestionStore;

/// Text reported in place of a suggestion when the provider call failed.
pub const ERROR_PLACEHOLDER: &str = "Error processing command.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Ok,
    Error,
}

/// One freshly processed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisEntry {
    pub command: String,
    pub suggestions: String,
    pub status: EntryStatus,
}

/// Walks the history, asking the provider about every command not already cached.
#[derive(Clone)]
pub struct Analyzer {
    store: Option<SuggestionStore>,
    provider: Arc<dyn SuggestionProvider>,
    settings: SettingsHandle,
    history: HistorySource,
    timeout: Duration,
}

impl Analyzer {
    pub fn new(
        store: Option<SuggestionStore>,
        provider: Arc<dyn SuggestionProvider>,
        settings: SettingsHandle,
        history: HistorySource,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            settings,
            history,
            timeout,
        }
    }

    pub fn store(&self) -> Option<&SuggestionStore> {
        self.store.as_ref()
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Load the history source and process every command in it.
    pub async fn analyze(&self) -> Result<Vec<AnalysisEntry>, HistoryError> {
        let commands = self.history.load().await?;
        Ok(self.process(&commands).await)
    }

    /// Process `commands` in order. Cache hits are left out of the result;
    /// provider failures become `EntryStatus::Error` entries.
    pub async fn process(&self, commands: &[String]) -> Vec<AnalysisEntry> {
        let mut results = Vec::new();
        let mut cached_skipped = 0usize;
        let mut failed = 0usize;

        for command in commands {
            if self.lookup(command).await.is_some() {
                tracing::debug!(command = %command, "found in cache, skipping");
                cached_skipped += 1;
                continue;
            }

            match self.generate(command).await {
                Ok(suggestion) => {
                    self.remember(command, &suggestion).await;
                    results.push(AnalysisEntry {
                        command: command.clone(),
                        suggestions: suggestion,
                        status: EntryStatus::Ok,
                    });
                }
                Err(e) => {
                    tracing::error!(command = %command, error = %e, "error processing command");
                    failed += 1;
                    results.push(AnalysisEntry {
                        command: command.clone(),
                        suggestions: ERROR_PLACEHOLDER.to_string(),
                        status: EntryStatus::Error,
                    });
                }
            }
        }

        tracing::info!(
            processed = results.len(),
            cached_skipped,
            failed,
            "processed commands"
        );
        results
    }

    async fn lookup(&self, command: &str) -> Option<String> {
        let store = self.store.as_ref()?;
        match store.get(command).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    async fn remember(&self, command: &str, suggestion: &str) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        if let Err(e) = store.put(command, suggestion).await {
            tracing::warn!(error = %e, "cache write failed");
        }
    }

    async fn generate(&self, command: &str) -> Result<String, ProviderError> {
        let settings = self.settings.snapshot();
        match tokio::time::timeout(self.timeout, self.provider.generate(command, &settings)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        }
    }
}
