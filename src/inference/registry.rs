//! Per-condition model cache.
//!
//! Each condition is loaded at most once. A failed load is remembered and
//! never retried for the lifetime of the registry; callers see `None` and
//! fall back to "prediction unavailable".

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use serde::Serialize;

use super::loader::ArtifactLoader;
use super::predictor::LoadedModel;
use crate::config::AppConfig;
use crate::models::enums::{Capability, Condition};

enum Slot {
    Ready(Arc<LoadedModel>),
    Failed(String),
}

/// Load state of one condition, for status displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ModelStatus {
    NotConfigured,
    NotLoaded { path: PathBuf },
    Loaded {
        path: PathBuf,
        name: String,
        checksum: String,
        capabilities: Vec<Capability>,
    },
    Failed { path: PathBuf, reason: String },
}

pub struct ModelRegistry {
    loader: ArtifactLoader,
    sources: BTreeMap<Condition, PathBuf>,
    slots: BTreeMap<Condition, OnceLock<Slot>>,
}

impl ModelRegistry {
    pub fn new(
        loader: ArtifactLoader,
        sources: impl IntoIterator<Item = (Condition, PathBuf)>,
    ) -> Self {
        let sources: BTreeMap<Condition, PathBuf> = sources.into_iter().collect();
        let slots = sources.keys().map(|c| (*c, OnceLock::new())).collect();
        Self {
            loader,
            sources,
            slots,
        }
    }

    /// Registry over every artifact the configuration names.
    pub fn from_config(config: &AppConfig) -> Self {
        let sources = Condition::ALL
            .into_iter()
            .filter_map(|c| config.artifact_path(&c).map(|p| (c, p)));
        Self::new(ArtifactLoader::new(config.min_artifact_bytes), sources)
    }

    /// Model for a condition, loading it on first request.
    pub fn get(&self, condition: Condition) -> Option<Arc<LoadedModel>> {
        let path = self.sources.get(&condition)?;
        let slot = self.slots.get(&condition)?;

        match slot.get_or_init(|| self.load_slot(condition, path)) {
            Slot::Ready(model) => Some(Arc::clone(model)),
            Slot::Failed(_) => None,
        }
    }

    /// Load every configured condition now. Returns how many are usable.
    pub fn preload(&self) -> usize {
        let loaded = Condition::ALL
            .into_iter()
            .filter(|c| self.get(*c).is_some())
            .count();
        tracing::info!(loaded, configured = self.sources.len(), "Model preload finished");
        loaded
    }

    pub fn status(&self, condition: Condition) -> ModelStatus {
        let (Some(path), Some(slot)) = (self.sources.get(&condition), self.slots.get(&condition))
        else {
            return ModelStatus::NotConfigured;
        };
        match slot.get() {
            None => ModelStatus::NotLoaded { path: path.clone() },
            Some(Slot::Ready(model)) => ModelStatus::Loaded {
                path: path.clone(),
                name: model.info().name.clone(),
                checksum: model.info().checksum.clone(),
                capabilities: model.capabilities(),
            },
            Some(Slot::Failed(reason)) => ModelStatus::Failed {
                path: path.clone(),
                reason: reason.clone(),
            },
        }
    }

    fn load_slot(&self, condition: Condition, path: &Path) -> Slot {
        match self.loader.load(path) {
            Ok(model) => Slot::Ready(Arc::new(model)),
            Err(e) => {
                tracing::error!(
                    condition = %condition,
                    path = %path.display(),
                    error = %e,
                    "Model unavailable for this session"
                );
                Slot::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::codec::test_support::{heart_logistic, write_artifact};
    use crate::models::enums::ArtifactFormat;

    #[test]
    fn loads_once_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_artifact(dir.path(), "heart.bin", heart_logistic(), ArtifactFormat::Bincode);
        let registry = ModelRegistry::new(ArtifactLoader::default(), [(Condition::Heart, path.clone())]);

        let first = registry.get(Condition::Heart).unwrap();
        // The cached model survives the file going away.
        std::fs::remove_file(&path).unwrap();
        let second = registry.get(Condition::Heart).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn concurrent_first_requests_share_one_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_artifact(dir.path(), "heart.bin", heart_logistic(), ArtifactFormat::Bincode);
        let registry = ModelRegistry::new(ArtifactLoader::default(), [(Condition::Heart, path)]);

        let models: Vec<Arc<LoadedModel>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| registry.get(Condition::Heart)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap().unwrap())
                .collect()
        });

        assert_eq!(models.len(), 8);
        assert!(models.iter().all(|m| Arc::ptr_eq(m, &models[0])));
    }

    #[test]
    fn shared_types_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ModelRegistry>();
        assert_send_sync::<LoadedModel>();
        assert_send_sync::<crate::report::Vocabulary>();
    }

    #[test]
    fn failure_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heart.bin");
        let registry = ModelRegistry::new(ArtifactLoader::default(), [(Condition::Heart, path.clone())]);

        assert!(registry.get(Condition::Heart).is_none());

        // A valid file appearing later is not picked up.
        write_artifact(dir.path(), "heart.bin", heart_logistic(), ArtifactFormat::Bincode);
        assert!(registry.get(Condition::Heart).is_none());
        assert!(matches!(
            registry.status(Condition::Heart),
            ModelStatus::Failed { .. }
        ));
    }

    #[test]
    fn unconfigured_condition_is_none() {
        let registry = ModelRegistry::new(ArtifactLoader::default(), Vec::new());
        assert!(registry.get(Condition::Kidney).is_none());
        assert_eq!(registry.status(Condition::Kidney), ModelStatus::NotConfigured);
    }

    #[test]
    fn status_before_and_after_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_artifact(dir.path(), "heart.bin", heart_logistic(), ArtifactFormat::Bincode);
        let registry = ModelRegistry::new(ArtifactLoader::default(), [(Condition::Heart, path.clone())]);

        assert_eq!(
            registry.status(Condition::Heart),
            ModelStatus::NotLoaded { path: path.clone() }
        );
        registry.get(Condition::Heart);
        match registry.status(Condition::Heart) {
            ModelStatus::Loaded { name, capabilities, .. } => {
                assert_eq!(name, "heart-risk");
                assert!(capabilities.contains(&Capability::PredictProba));
            }
            other => panic!("expected Loaded, got {other:?}"),
        }
    }

    #[test]
    fn preload_counts_usable_models() {
        let dir = tempfile::tempdir().unwrap();
        let heart = write_artifact(dir.path(), "heart.bin", heart_logistic(), ArtifactFormat::Bincode);
        let registry = ModelRegistry::new(
            ArtifactLoader::default(),
            [
                (Condition::Heart, heart),
                (Condition::Diabetes, dir.path().join("missing.bin")),
            ],
        );

        assert_eq!(registry.preload(), 1);
        assert!(matches!(
            registry.status(Condition::Diabetes),
            ModelStatus::Failed { .. }
        ));
    }

    #[test]
    fn from_config_resolves_configured_paths() {
        let dir = tempfile::tempdir().unwrap();
        let heart = write_artifact(dir.path(), "heart.bin", heart_logistic(), ArtifactFormat::Bincode);
        let mut config = AppConfig::default();
        config.artifacts = [(Condition::Heart, heart)].into_iter().collect();

        let registry = ModelRegistry::from_config(&config);
        assert!(registry.get(Condition::Heart).is_some());
        assert_eq!(registry.status(Condition::Kidney), ModelStatus::NotConfigured);
    }
}
