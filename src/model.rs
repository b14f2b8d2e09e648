use rand::{rngs::StdRng, SeedableRng};
use std::time::Instant;

use crate::aggregate::aggregate;
use crate::error::{MaintenanceError, ScoringError};
use crate::forest::{ForestParams, RandomForest};
use crate::store::{ModelStore, PersistedModel};
use crate::training::{synthesize, TrainingConfig};
use crate::types::{FeatureVector, MaintenancePrediction, TelemetrySample, FEATURE_NAMES};

/// Horizon, in days, that `days_until_maintenance` is scaled to.
pub const MAINTENANCE_HORIZON_DAYS: f64 = 30.0;

/// How the model reached the ready state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Loaded,
    Trained { persisted: bool },
}

/// The fitted classifier. Immutable once built; share it behind an `Arc`.
#[derive(Debug)]
pub struct MaintenanceModel {
    persisted: PersistedModel,
}

impl MaintenanceModel {
    /// Load from `store`, or train from synthetic data and write the result back.
    ///
    /// An absent, unreadable or incompatible stored model falls through to
    /// training. A failed write is logged and the fresh model is still used.
    pub fn load_or_train(
        store: &dyn ModelStore,
        config: &TrainingConfig,
    ) -> Result<(Self, Lifecycle), MaintenanceError> {
        match store.load() {
            Ok(Some(persisted)) => {
                tracing::info!(
                    "loaded model trained at {} ({} trees)",
                    persisted.trained_at,
                    persisted.forest.n_trees()
                );
                return Ok((Self { persisted }, Lifecycle::Loaded));
            }
            Ok(None) => tracing::info!("no stored model found"),
            Err(e) => tracing::warn!("stored model unusable, retraining: {}", e),
        }

        let model = Self::train(config)?;
        let persisted = match store.save(&model.persisted) {
            Ok(()) => {
                tracing::info!("model trained and saved");
                true
            }
            Err(e) => {
                tracing::error!("failed to save trained model, serving it from memory: {}", e);
                false
            }
        };
        Ok((model, Lifecycle::Trained { persisted }))
    }

    /// Fit a fresh forest on synthetic data. Never touches storage.
    pub fn train(config: &TrainingConfig) -> Result<Self, MaintenanceError> {
        tracing::info!(
            "training new model: {} samples, {} trees, seed {}",
            config.samples,
            config.trees,
            config.seed
        );
        let started = Instant::now();

        let mut rng = StdRng::seed_from_u64(config.seed);
        let (x, y) = synthesize(config.samples, &mut rng);
        let params = ForestParams {
            n_trees: config.trees,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
        };
        let forest = RandomForest::fit(&x, &y, &params, rng).map_err(MaintenanceError::Training)?;

        tracing::info!("training finished in {:?}", started.elapsed());
        Ok(Self {
            persisted: PersistedModel::new(forest, config.clone()),
        })
    }

    pub fn persisted(&self) -> &PersistedModel {
        &self.persisted
    }

    /// Score one feature vector.
    ///
    /// `confidence` is always the probability of the needs-maintenance class,
    /// not the confidence in whichever class was returned.
    pub fn score(&self, fv: &FeatureVector) -> Result<MaintenancePrediction, ScoringError> {
        let x = fv.to_array();
        for (value, feature) in x.iter().zip(FEATURE_NAMES) {
            if !value.is_finite() {
                return Err(ScoringError::NonFiniteFeature { feature, value: *value });
            }
        }

        let confidence = self.persisted.forest.predict_proba(&x)?;
        // argmax over [1 - p, p]; a tie goes to class 0
        let needs_maintenance = confidence > 0.5;

        Ok(MaintenancePrediction {
            needs_maintenance,
            confidence,
            days_until_maintenance: days_until_maintenance(needs_maintenance, confidence),
        })
    }
}

pub fn days_until_maintenance(needs_maintenance: bool, confidence: f64) -> u32 {
    if needs_maintenance {
        return 0;
    }
    ((1.0 - confidence) * MAINTENANCE_HORIZON_DAYS)
        .floor()
        .clamp(0.0, MAINTENANCE_HORIZON_DAYS) as u32
}

/// Handle given to request handlers. Holds the model if startup produced one.
#[derive(Debug)]
pub struct MaintenanceService {
    model: Option<MaintenanceModel>,
    log_predictions: bool,
}

impl MaintenanceService {
    pub fn new(model: Option<MaintenanceModel>) -> Self {
        Self {
            model,
            log_predictions: std::env::var("LOG_PRED").ok().as_deref() == Some("1"),
        }
    }

    /// Run the load-or-train lifecycle. A lifecycle failure leaves the
    /// service up without a model, so predictions report `ModelUnavailable`.
    pub fn start(store: &dyn ModelStore, config: &TrainingConfig) -> Self {
        match MaintenanceModel::load_or_train(store, config) {
            Ok((model, lifecycle)) => {
                tracing::info!("maintenance model ready ({:?})", lifecycle);
                Self::new(Some(model))
            }
            Err(e) => {
                tracing::error!("maintenance model unavailable: {}", e);
                Self::new(None)
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    pub fn predict(&self, fv: &FeatureVector) -> Result<MaintenancePrediction, MaintenanceError> {
        let model = self.model.as_ref().ok_or(MaintenanceError::ModelUnavailable)?;
        if self.log_predictions {
            tracing::info!(
                "scoring avg_temp={:.2} avg_battery={:.2} fuel_var={:.3} odometer={}",
                fv.avg_engine_temp,
                fv.avg_battery_voltage,
                fv.fuel_level_variance,
                fv.max_odometer
            );
        }
        model.score(fv).map_err(|e| {
            tracing::warn!("prediction error: {}", e);
            MaintenanceError::Scoring(e)
        })
    }

    /// Aggregate a telemetry window and score it.
    pub fn predict_window(&self, samples: &[TelemetrySample]) -> Result<MaintenancePrediction, MaintenanceError> {
        let fv = aggregate(samples)?;
        self.predict(&fv)
    }
}

// Handlers share one service across the tokio worker pool.
fn assert_send_sync<T: Send + Sync>() {}
const _: fn() = assert_send_sync::<MaintenanceService>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryModelStore;

    fn small_config() -> TrainingConfig {
        TrainingConfig { samples: 300, trees: 10, ..TrainingConfig::default() }
    }

    fn fv(temp: f64, battery: f64, fuel_var: f64, odo: u64) -> FeatureVector {
        FeatureVector {
            avg_engine_temp: temp,
            avg_battery_voltage: battery,
            fuel_level_variance: fuel_var,
            max_odometer: odo,
        }
    }

    #[test]
    fn test_days_until_maintenance_bounds() {
        assert_eq!(days_until_maintenance(true, 0.9), 0);
        assert_eq!(days_until_maintenance(true, 0.1), 0);
        assert_eq!(days_until_maintenance(false, 0.0), 30);
        assert_eq!(days_until_maintenance(false, 1.0), 0);
        assert_eq!(days_until_maintenance(false, 0.5), 15);
        assert_eq!(days_until_maintenance(false, 0.34), 19);
        for i in 0..=100 {
            let c = i as f64 / 100.0;
            assert!(days_until_maintenance(false, c) <= 30);
        }
    }

    #[test]
    fn test_non_finite_feature_is_scoring_error() {
        let model = MaintenanceModel::train(&small_config()).unwrap();
        let err = model.score(&fv(f64::NAN, 13.0, 0.0, 1_000)).unwrap_err();
        assert!(matches!(err, ScoringError::NonFiniteFeature { feature: "avg_engine_temp", .. }));
    }

    #[test]
    fn test_cold_start_trains_and_saves() {
        let store = MemoryModelStore::new();
        let (_, lifecycle) = MaintenanceModel::load_or_train(&store, &small_config()).unwrap();
        assert_eq!(lifecycle, Lifecycle::Trained { persisted: true });
        assert_eq!(store.saves(), 1);
        assert!(store.contents().is_some());
    }

    #[test]
    fn test_corrupt_store_retrains() {
        let store = MemoryModelStore::with_contents("{\"format_version\": 1");
        let (_, lifecycle) = MaintenanceModel::load_or_train(&store, &small_config()).unwrap();
        assert_eq!(lifecycle, Lifecycle::Trained { persisted: true });
    }

    #[test]
    fn test_invalid_config_leaves_service_unavailable() {
        let store = MemoryModelStore::new();
        let config = TrainingConfig { trees: 0, ..small_config() };
        let service = MaintenanceService::start(&store, &config);
        assert!(!service.is_ready());
        assert_eq!(store.saves(), 0);
        assert!(matches!(
            service.predict(&fv(90.0, 13.0, 1.0, 5_000)),
            Err(MaintenanceError::ModelUnavailable)
        ));
    }

    #[test]
    fn test_service_wraps_scoring_error() {
        let service = MaintenanceService::new(Some(MaintenanceModel::train(&small_config()).unwrap()));
        assert!(matches!(
            service.predict(&fv(90.0, f64::INFINITY, 1.0, 5_000)),
            Err(MaintenanceError::Scoring(_))
        ));
    }
}
