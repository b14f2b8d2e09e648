use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::aggregate::aggregate_raw;
use crate::assistant::FleetAssistant;
use crate::error::MaintenanceError;
use crate::model::MaintenanceService;
use crate::telemetry::TelemetryRepo;
use crate::types::{RawTelemetry, VehiclePrediction};

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MaintenanceService>,
    /// `None` when the fleet database could not be opened at startup.
    pub telemetry: Option<Arc<TelemetryRepo>>,
    pub assistant: Arc<FleetAssistant>,
    pub telemetry_window: usize,
}

// ---------- Errors ----------

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(&'static str),
    PredictionFailed,
    Internal(String),
}

impl From<MaintenanceError> for AppError {
    fn from(e: MaintenanceError) -> Self {
        match e {
            MaintenanceError::NoData => AppError::NotFound("No telemetry data found"),
            MaintenanceError::MissingField { .. } | MaintenanceError::InvalidField { .. } => {
                AppError::BadRequest(e.to_string())
            }
            MaintenanceError::Database(err) => AppError::Internal(err.to_string()),
            MaintenanceError::ModelUnavailable
            | MaintenanceError::Scoring(_)
            | MaintenanceError::Training(_)
            | MaintenanceError::Persistence(_) => AppError::PredictionFailed,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.to_string()),
            AppError::PredictionFailed => (StatusCode::INTERNAL_SERVER_ERROR, "Prediction failed".to_string()),
            AppError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl AppState {
    fn telemetry(&self) -> Result<Arc<TelemetryRepo>, AppError> {
        self.telemetry
            .clone()
            .ok_or_else(|| AppError::Internal("telemetry database unavailable".into()))
    }

    /// Run a SQLite read on the blocking pool so a slow query never stalls
    /// the async workers.
    async fn read_telemetry<T, F>(&self, read: F) -> Result<T, AppError>
    where
        F: FnOnce(&TelemetryRepo) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let repo = self.telemetry()?;
        tokio::task::spawn_blocking(move || read(&repo))
            .await
            .map_err(|e| AppError::Internal(format!("telemetry read task failed: {}", e)))?
            .map_err(|e| MaintenanceError::from(e).into())
    }
}

// ---------- Request/Response types ----------

#[derive(Serialize)]
struct Health {
    status: &'static str,
    service: &'static str,
    mode: &'static str,
    model_ready: bool,
}

#[derive(Deserialize, Debug)]
pub struct ScoreWindow {
    pub vehicle_id: String,
    #[serde(default)]
    pub samples: Vec<RawTelemetry>,
}

#[derive(Deserialize, Debug)]
pub struct ChatQuestion {
    pub question: Option<String>,
}

#[derive(Serialize)]
struct ChatAnswer {
    question: String,
    answer: String,
}

// ---------- Handlers ----------

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "healthy",
        service: "ai-service",
        mode: "local-sqlite",
        model_ready: state.service.is_ready(),
    })
}

fn score(state: &AppState, vehicle_id: String, rows: &[RawTelemetry]) -> Result<Json<VehiclePrediction>, AppError> {
    let fv = aggregate_raw(rows)?;
    let prediction = state.service.predict(&fv)?;
    Ok(Json(VehiclePrediction { vehicle_id, prediction }))
}

async fn predict_stored(
    State(state): State<AppState>,
    Path(vehicle_id): Path<String>,
) -> Result<Json<VehiclePrediction>, AppError> {
    let window = state.telemetry_window;
    let id = vehicle_id.clone();
    let rows = state
        .read_telemetry(move |repo| repo.recent_samples(&id, window))
        .await?;
    score(&state, vehicle_id, &rows)
}

async fn predict_posted(
    State(state): State<AppState>,
    Json(payload): Json<ScoreWindow>,
) -> Result<Json<VehiclePrediction>, AppError> {
    let window = payload.samples.len().min(state.telemetry_window);
    score(&state, payload.vehicle_id, &payload.samples[..window])
}

async fn chat(
    State(state): State<AppState>,
    Json(payload): Json<ChatQuestion>,
) -> Result<Json<ChatAnswer>, AppError> {
    let question = payload
        .question
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("No question provided".into()))?;

    let context = state
        .read_telemetry(|repo| repo.fleet_context())
        .await?
        .to_string();

    let answer = state.assistant.ask(&question, &context).await;
    Ok(Json(ChatAnswer { question, answer }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/ai/predict-maintenance", post(predict_posted))
        .route("/api/ai/predict-maintenance/:vehicle_id", get(predict_stored))
        .route("/api/ai/chat", post(chat))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
