use std::sync::{Arc, RwLock};

use crate::config::ProviderConfig;

/// Credential and model used for provider calls.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub api_key: String,
    pub model: String,
}

impl ProviderSettings {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// Keep the credential out of logs and panic messages.
impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &if self.has_api_key() { "<set>" } else { "<unset>" })
            .field("model", &self.model)
            .finish()
    }
}

/// Shared, runtime-replaceable provider settings.
///
/// Readers take an `Arc` snapshot; writers build a whole new value and swap
/// the pointer, so a reader never sees the old key paired with the new model.
#[derive(Clone)]
pub struct SettingsHandle {
    current: Arc<RwLock<Arc<ProviderSettings>>>,
}

impl SettingsHandle {
    pub fn new(settings: ProviderSettings) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(settings))),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(ProviderSettings {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn snapshot(&self) -> Arc<ProviderSettings> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the fields that are `Some`, keep the rest. Returns the new value.
    pub fn update(&self, api_key: Option<String>, model: Option<String>) -> Arc<ProviderSettings> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let next = Arc::new(ProviderSettings {
            api_key: api_key.unwrap_or_else(|| guard.api_key.clone()),
            model: model.unwrap_or_else(|| guard.model.clone()),
        });
        *guard = next.clone();
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> SettingsHandle {
        SettingsHandle::new(ProviderSettings {
            api_key: "key-0".to_string(),
            model: "model-0".to_string(),
        })
    }

    #[test]
    fn test_partial_update_keeps_other_field() {
        let settings = handle();

        let updated = settings.update(None, Some("gpt-4o".to_string()));
        assert_eq!(updated.api_key, "key-0");
        assert_eq!(updated.model, "gpt-4o");

        let updated = settings.update(Some("key-1".to_string()), None);
        assert_eq!(updated.api_key, "key-1");
        assert_eq!(updated.model, "gpt-4o");

        assert_eq!(*settings.snapshot(), *updated);
    }

    #[test]
    fn test_empty_update_is_noop() {
        let settings = handle();
        let before = settings.snapshot();
        let after = settings.update(None, None);
        assert_eq!(*before, *after);
    }

    #[test]
    fn test_snapshot_survives_later_update() {
        let settings = handle();
        let snapshot = settings.snapshot();
        settings.update(Some("key-9".to_string()), Some("model-9".to_string()));
        assert_eq!(snapshot.api_key, "key-0");
        assert_eq!(snapshot.model, "model-0");
    }

    #[test]
    fn test_debug_hides_api_key() {
        let rendered = format!("{:?}", *handle().snapshot());
        assert!(!rendered.contains("key-0"));
        assert!(rendered.contains("<set>"));
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_pairs() {
        let settings = handle();

        let writer = {
            let settings = settings.clone();
            std::thread::spawn(move || {
                for i in 1..=2000 {
                    settings.update(Some(format!("key-{i}")), Some(format!("model-{i}")));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let settings = settings.clone();
                std::thread::spawn(move || {
                    for _ in 0..2000 {
                        let s = settings.snapshot();
                        let key_gen = s.api_key.trim_start_matches("key-");
                        let model_gen = s.model.trim_start_matches("model-");
                        assert_eq!(
                            key_gen, model_gen,
                            "torn settings: key={} model={}",
                            s.api_key, s.model
                        );
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }
}
