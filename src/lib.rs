//! Predictive-maintenance inference for fleet vehicles.
//!
//! A telemetry window is reduced to a four-value feature vector
//! ([`aggregate`]) and scored by a random forest ([`model`]) that is loaded
//! from disk or trained once on synthetic data. The HTTP surface lives in
//! [`api`].

pub mod aggregate;
pub mod api;
pub mod assistant;
pub mod config;
pub mod error;
pub mod forest;
pub mod model;
pub mod store;
pub mod telemetry;
pub mod training;
pub mod types;

pub use aggregate::{aggregate, aggregate_raw};
pub use error::{MaintenanceError, PersistenceError, ScoringError};
pub use model::{Lifecycle, MaintenanceModel, MaintenanceService};
pub use store::{FileModelStore, MemoryModelStore, ModelStore};
pub use training::TrainingConfig;
pub use types::{FeatureVector, MaintenancePrediction, RawTelemetry, TelemetrySample};
