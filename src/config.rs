use std::{env, path::PathBuf};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub database_path: PathBuf,
    pub model_path: PathBuf,
    /// Most recent rows per vehicle fed to the aggregator.
    pub telemetry_window: usize,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 5001,
            database_path: PathBuf::from("../backend/vehicleiq.sqlite"),
            model_path: PathBuf::from("maintenance_model.json"),
            telemetry_window: 100,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-3.5-turbo".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Read from the process environment. Call `dotenvy::dotenv()` first to
    /// pick up a `.env` file. Unparseable numbers keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        Self {
            port: get("PORT")
                .or_else(|| get("AI_PORT"))
                .and_then(|p| p.parse().ok())
                .unwrap_or(d.port),
            database_path: get("DATABASE_PATH").map(PathBuf::from).unwrap_or(d.database_path),
            model_path: get("MODEL_PATH").map(PathBuf::from).unwrap_or(d.model_path),
            telemetry_window: get("TELEMETRY_WINDOW")
                .and_then(|w| w.parse().ok())
                .filter(|w| *w > 0)
                .unwrap_or(d.telemetry_window),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or(d.openai_base_url),
            openai_model: get("OPENAI_MODEL").unwrap_or(d.openai_model),
        }
    }
}
