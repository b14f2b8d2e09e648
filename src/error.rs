use thiserror::Error;

/// Failures of the prediction pipeline as seen by callers.
#[derive(Debug, Error)]
pub enum MaintenanceError {
    #[error("no telemetry data found")]
    NoData,

    #[error("telemetry row {index} is missing `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("telemetry row {index} has invalid `{field}`: {value}")]
    InvalidField { index: usize, field: &'static str, value: String },

    #[error("maintenance model is not ready")]
    ModelUnavailable,

    #[error("scoring failed: {0}")]
    Scoring(#[from] ScoringError),

    #[error("model training failed: {0}")]
    Training(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("telemetry database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Raised while turning a feature vector into a prediction. `score` returns
/// these as values so one bad request never takes the service down.
#[derive(Debug, Error, PartialEq)]
pub enum ScoringError {
    #[error("feature `{feature}` is not a finite number ({value})")]
    NonFiniteFeature { feature: &'static str, value: f64 },

    #[error("forest has no trees")]
    EmptyForest,

    #[error("forest expects {expected} features, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("model file i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("model file is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("incompatible model file: {0}")]
    Incompatible(String),
}
