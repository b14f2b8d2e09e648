use rand::Rng;
use serde::{Deserialize, Serialize};

/// How the fallback model is built on a cold start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub samples: usize,
    pub trees: usize,
    /// Drives both data synthesis and forest fitting.
    pub seed: u64,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            samples: 1000,
            trees: 50,
            seed: 42,
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

/// Ground truth the synthetic model is trained to approximate.
pub fn needs_maintenance_rule(engine_temp: f64, battery_voltage: f64, odometer: u64) -> bool {
    engine_temp > 100.0 || battery_voltage < 12.0 || odometer > 80_000
}

/// One synthetic feature row in training order, drawn from the fixed ranges
/// the service was designed around. Column 2 is a placeholder for fuel
/// variance and carries no signal.
pub fn synth_row<R: Rng + ?Sized>(rng: &mut R) -> [f64; 4] {
    let temp = rng.gen_range(80.0..110.0);
    let battery = rng.gen_range(11.0..14.5);
    let fuel_var = rng.gen_range(0.0..5.0);
    let odometer: u64 = rng.gen_range(1_000..100_000);
    [temp, battery, fuel_var, odometer as f64]
}

/// `n` labeled rows.
pub fn synthesize<R: Rng + ?Sized>(n: usize, rng: &mut R) -> (Vec<[f64; 4]>, Vec<bool>) {
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for _ in 0..n {
        let row = synth_row(rng);
        y.push(needs_maintenance_rule(row[0], row[1], row[3] as u64));
        x.push(row);
    }
    (x, y)
}
