//! Where the trained forest lives between process starts.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::error::PersistenceError;
use crate::forest::RandomForest;
use crate::training::TrainingConfig;
use crate::types::FEATURE_NAMES;

/// Bumped whenever the on-disk layout changes; older files are retrained.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedModel {
    pub format_version: u32,
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub training: TrainingConfig,
    pub forest: RandomForest,
}

impl PersistedModel {
    pub fn new(forest: RandomForest, training: TrainingConfig) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            trained_at: Utc::now(),
            training,
            forest,
        }
    }

    /// Reject anything this build can't score with.
    pub fn check(&self) -> Result<(), PersistenceError> {
        if self.format_version != FORMAT_VERSION {
            return Err(PersistenceError::Incompatible(format!(
                "format version {} (expected {})",
                self.format_version, FORMAT_VERSION
            )));
        }
        if self.feature_names != FEATURE_NAMES {
            return Err(PersistenceError::Incompatible(format!(
                "feature names {:?} (expected {:?})",
                self.feature_names, FEATURE_NAMES
            )));
        }
        if self.forest.n_features() != FEATURE_NAMES.len() {
            return Err(PersistenceError::Incompatible(format!(
                "forest expects {} features",
                self.forest.n_features()
            )));
        }
        self.forest.validate().map_err(PersistenceError::Incompatible)
    }

    fn decode(text: &str) -> Result<Self, PersistenceError> {
        let model: Self = serde_json::from_str(text)?;
        model.check()?;
        Ok(model)
    }
}

pub trait ModelStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<PersistedModel>, PersistenceError>;

    /// Replace whatever was stored before.
    fn save(&self, model: &PersistedModel) -> Result<(), PersistenceError>;
}

/// JSON file at a fixed path.
#[derive(Debug, Clone)]
pub struct FileModelStore {
    path: PathBuf,
}

impl FileModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ModelStore for FileModelStore {
    fn load(&self) -> Result<Option<PersistedModel>, PersistenceError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        PersistedModel::decode(&text).map(Some)
    }

    fn save(&self, model: &PersistedModel) -> Result<(), PersistenceError> {
        let text = serde_json::to_string(model)?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

/// Keeps the serialized model in memory and counts calls. Lets the lifecycle
/// run without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryModelStore {
    text: Mutex<Option<String>>,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with arbitrary contents, valid or not.
    pub fn with_contents(text: impl Into<String>) -> Self {
        Self {
            text: Mutex::new(Some(text.into())),
            ..Self::default()
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.text.lock().clone()
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }
}

impl ModelStore for MemoryModelStore {
    fn load(&self) -> Result<Option<PersistedModel>, PersistenceError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        match self.text.lock().as_deref() {
            Some(text) => PersistedModel::decode(text).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, model: &PersistedModel) -> Result<(), PersistenceError> {
        self.saves.fetch_add(1, Ordering::Relaxed);
        let text = serde_json::to_string(model)?;
        *self.text.lock() = Some(text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::ForestParams;
    use rand::{rngs::StdRng, SeedableRng};

    fn tiny_model() -> PersistedModel {
        let x: Vec<[f64; 4]> = (0..20).map(|i| [i as f64, 0.0, 0.0, 0.0]).collect();
        let y: Vec<bool> = (0..20).map(|i| i > 9).collect();
        let params = ForestParams { n_trees: 2, max_depth: Some(3), min_samples_split: 2 };
        let forest = RandomForest::fit(&x, &y, &params, StdRng::seed_from_u64(1)).unwrap();
        PersistedModel::new(forest, TrainingConfig::default())
    }

    #[test]
    fn test_file_store_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_file_store_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path().join("model.json"));
        let model = tiny_model();
        store.save(&model).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.trained_at, model.trained_at);
        assert_eq!(loaded.training, model.training);
        assert_eq!(
            serde_json::to_string(&loaded.forest).unwrap(),
            serde_json::to_string(&model.forest).unwrap()
        );
    }

    #[test]
    fn test_forest_width_mismatch_is_incompatible() {
        let x: Vec<[f64; 4]> = (0..20).map(|i| [0.0, 0.0, 0.0, i as f64]).collect();
        let y: Vec<bool> = (0..20).map(|i| i > 9).collect();
        let params = ForestParams { n_trees: 2, max_depth: Some(3), min_samples_split: 2 };
        let forest = RandomForest::fit(&x, &y, &params, StdRng::seed_from_u64(1)).unwrap();
        let mut value = serde_json::to_value(PersistedModel::new(forest, TrainingConfig::default())).unwrap();
        value["forest"]["n_features"] = serde_json::json!(3);

        let store = MemoryModelStore::with_contents(value.to_string());
        assert!(matches!(store.load(), Err(PersistenceError::Incompatible(_))));
    }

    #[test]
    fn test_file_store_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("maintenance_model.json");
        assert_eq!(FileModelStore::new(&path).path(), path.as_path());
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let store = MemoryModelStore::with_contents("not json at all");
        assert!(matches!(store.load(), Err(PersistenceError::Decode(_))));
    }

    #[test]
    fn test_version_mismatch_is_incompatible() {
        let mut model = tiny_model();
        model.format_version = FORMAT_VERSION + 1;
        let store = MemoryModelStore::with_contents(serde_json::to_string(&model).unwrap());
        assert!(matches!(store.load(), Err(PersistenceError::Incompatible(_))));
    }

    #[test]
    fn test_feature_mismatch_is_incompatible() {
        let mut model = tiny_model();
        model.feature_names.swap(0, 1);
        assert!(matches!(model.check(), Err(PersistenceError::Incompatible(_))));
    }
}
