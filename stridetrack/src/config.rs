//! Tunable parameters for the telemetry reducers.
//!
//! The defaults are the values the tracker has always shipped with. They were
//! picked empirically, so they are exposed as configuration rather than baked
//! into the reducers.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};

/// Default jitter threshold: position increments at or below this are dropped.
pub const DEFAULT_JITTER_THRESHOLD_M: f64 = 2.0;

/// Default number of accepted points retained in a run's path.
pub const DEFAULT_PATH_CAPACITY: usize = 1000;

/// Configuration for the step detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    /// Acceleration magnitude a peak must exceed (m/s², includes gravity).
    /// Default: 12.0
    pub threshold: f64,

    /// Width of the hysteresis band below `threshold`. The detector re-arms
    /// once the magnitude drops under `threshold - hysteresis`.
    /// Default: 1.0
    pub hysteresis: f64,

    /// Minimum time between two emitted steps in milliseconds.
    /// Default: 280 (~3.6 steps/sec)
    pub cooldown_ms: i64,
}

impl StepConfig {
    /// Magnitude below which the detector re-arms for the next peak.
    pub fn release_threshold(&self) -> f64 {
        self.threshold - self.hysteresis
    }
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            threshold: 12.0,
            hysteresis: 1.0,
            cooldown_ms: 280,
        }
    }
}

/// Configuration for location and motion reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Minimum increment (meters) for a position sample to be accepted.
    /// Default: 2.0
    pub jitter_threshold_m: f64,

    /// Maximum number of accepted points kept in a run's path.
    /// Default: 1000
    pub path_capacity: usize,

    /// Reported accuracy (meters) above which the signal is considered poor.
    /// Default: 25.0
    pub poor_accuracy_m: f64,

    /// Reported accuracy (meters) above which the signal is unusable.
    /// Default: 60.0
    pub critical_accuracy_m: f64,

    /// Step detector parameters.
    pub step: StepConfig,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            jitter_threshold_m: DEFAULT_JITTER_THRESHOLD_M,
            path_capacity: DEFAULT_PATH_CAPACITY,
            poor_accuracy_m: 25.0,
            critical_accuracy_m: 60.0,
            step: StepConfig::default(),
        }
    }
}

impl TrackingConfig {
    /// Check that every parameter is usable.
    pub fn validate(&self) -> Result<()> {
        if !self.jitter_threshold_m.is_finite() || self.jitter_threshold_m < 0.0 {
            return Err(config_error(
                "jitter_threshold_m",
                "must be a finite, non-negative distance",
            ));
        }
        if self.path_capacity == 0 {
            return Err(config_error("path_capacity", "must be greater than zero"));
        }
        if !(self.poor_accuracy_m.is_finite() && self.critical_accuracy_m.is_finite()) {
            return Err(config_error("poor_accuracy_m", "accuracy thresholds must be finite"));
        }
        if self.poor_accuracy_m > self.critical_accuracy_m {
            return Err(config_error(
                "poor_accuracy_m",
                "must not exceed critical_accuracy_m",
            ));
        }
        if !self.step.threshold.is_finite() {
            return Err(config_error("step.threshold", "must be finite"));
        }
        if !self.step.hysteresis.is_finite() || self.step.hysteresis < 0.0 {
            return Err(config_error("step.hysteresis", "must be finite and non-negative"));
        }
        if self.step.cooldown_ms < 0 {
            return Err(config_error("step.cooldown_ms", "must not be negative"));
        }
        Ok(())
    }
}

fn config_error(field: &str, message: &str) -> TrackError {
    TrackError::ConfigError {
        field: field.to_string(),
        message: message.to_string(),
    }
}
