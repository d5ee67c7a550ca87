//! pure decisions derived from sampled values.

use serde::Serialize;

/// ambient humidity (%) below which the irrigation pump should run
pub const DEFAULT_THRESHOLD: f64 = 40.0;

/// actuation intent for the latest ambient value
///
/// unknown ambient state never actuates.
pub fn decide(ambient: Option<f64>, threshold: f64) -> bool {
    match ambient {
        Some(value) => value < threshold,
        None => false,
    }
}

/// coarse label for the light sensor; the ldr reads higher in the dark
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LightLevel {
    Strong,
    Medium,
    Weak,
    Dark,
}

impl LightLevel {
    pub fn classify(raw: f64) -> Self {
        if raw < 50_000.0 {
            LightLevel::Strong
        } else if raw < 90_000.0 {
            LightLevel::Medium
        } else if raw < 120_000.0 {
            LightLevel::Weak
        } else {
            LightLevel::Dark
        }
    }
}
