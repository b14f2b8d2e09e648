use serde::{Deserialize, Serialize};

use crate::error::MaintenanceError;

/// Names of the model inputs, in the order the forest was trained on.
pub const FEATURE_NAMES: [&str; 4] = [
    "avg_engine_temp",
    "avg_battery_voltage",
    "fuel_level_variance",
    "max_odometer",
];

/// One telemetry row as it arrives from the database or a request body.
/// Every field is optional here; `TelemetrySample::try_from_raw` decides
/// whether the row is usable.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTelemetry {
    pub engine_temp: Option<f64>,
    pub battery_voltage: Option<f64>,
    pub fuel_level: Option<f64>,
    /// Signed so a corrupt negative reading can be reported rather than lost.
    pub odometer: Option<i64>,
}

/// A validated telemetry reading for one vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct TelemetrySample {
    pub engine_temp: f64,     // degrees
    pub battery_voltage: f64, // volts
    pub fuel_level: f64,      // percent, 0-100
    pub odometer: u64,
}

impl TelemetrySample {
    /// `index` is the row's position in its batch and is only used in the error.
    pub fn try_from_raw(index: usize, raw: &RawTelemetry) -> Result<Self, MaintenanceError> {
        let missing = |field: &'static str| MaintenanceError::MissingField { index, field };
        let odometer = raw.odometer.ok_or_else(|| missing("odometer"))?;
        let odometer = u64::try_from(odometer).map_err(|_| MaintenanceError::InvalidField {
            index,
            field: "odometer",
            value: odometer.to_string(),
        })?;
        Ok(Self {
            engine_temp: raw.engine_temp.ok_or_else(|| missing("engine_temp"))?,
            battery_voltage: raw.battery_voltage.ok_or_else(|| missing("battery_voltage"))?,
            fuel_level: raw.fuel_level.ok_or_else(|| missing("fuel_level"))?,
            odometer,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector {
    pub avg_engine_temp: f64,
    pub avg_battery_voltage: f64,
    pub fuel_level_variance: f64,
    pub max_odometer: u64,
}

impl FeatureVector {
    /// Model input, ordered as `FEATURE_NAMES`.
    pub fn to_array(&self) -> [f64; 4] {
        [
            self.avg_engine_temp,
            self.avg_battery_voltage,
            self.fuel_level_variance,
            self.max_odometer as f64,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MaintenancePrediction {
    pub needs_maintenance: bool,
    /// Probability of the positive (needs-maintenance) class.
    pub confidence: f64,
    pub days_until_maintenance: u32,
}

/// Prediction as returned over HTTP.
#[derive(Debug, Serialize, Clone)]
pub struct VehiclePrediction {
    pub vehicle_id: String,
    #[serde(flatten)]
    pub prediction: MaintenancePrediction,
}
