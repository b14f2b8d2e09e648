use crate::error::MaintenanceError;
use crate::types::{FeatureVector, RawTelemetry, TelemetrySample};

/// Reduce a telemetry window for one vehicle into the model's feature vector.
///
/// The batch is treated as an unordered set: means and variance are computed
/// over sorted copies of each column, and the odometer reading is the maximum
/// rather than the latest, so any permutation of the same rows yields the
/// same vector bit for bit.
///
/// # Arguments
/// * `samples` - The most recent readings for one vehicle (caller bounds the window)
///
/// # Returns
/// `Err(MaintenanceError::NoData)` for an empty batch, never a default vector.
pub fn aggregate(samples: &[TelemetrySample]) -> Result<FeatureVector, MaintenanceError> {
    if samples.is_empty() {
        return Err(MaintenanceError::NoData);
    }

    let temps = sorted_column(samples, |s| s.engine_temp);
    let volts = sorted_column(samples, |s| s.battery_voltage);
    let fuel = sorted_column(samples, |s| s.fuel_level);

    let max_odometer = samples
        .iter()
        .map(|s| s.odometer)
        .max()
        .ok_or(MaintenanceError::NoData)?;

    Ok(FeatureVector {
        avg_engine_temp: mean(&temps),
        avg_battery_voltage: mean(&volts),
        fuel_level_variance: sample_variance(&fuel),
        max_odometer,
    })
}

/// Validate raw rows, then aggregate. A row with any missing field fails the
/// whole batch.
pub fn aggregate_raw(rows: &[RawTelemetry]) -> Result<FeatureVector, MaintenanceError> {
    let samples = rows
        .iter()
        .enumerate()
        .map(|(i, raw)| TelemetrySample::try_from_raw(i, raw))
        .collect::<Result<Vec<_>, _>>()?;
    aggregate(&samples)
}

fn sorted_column(samples: &[TelemetrySample], pick: impl Fn(&TelemetrySample) -> f64) -> Vec<f64> {
    let mut col: Vec<f64> = samples.iter().map(pick).collect();
    col.sort_by(f64::total_cmp);
    col
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Unbiased (n - 1) variance; 0 for fewer than two values.
fn sample_variance(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (xs.len() - 1) as f64
}
