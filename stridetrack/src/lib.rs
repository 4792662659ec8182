//! # Stridetrack
//!
//! Telemetry reduction for a personal running tracker.
//!
//! This library provides:
//! - GPS distance and elevation accumulation with a jitter filter
//! - Step counting from accelerometer magnitude peaks
//! - Lifetime statistics and shoe mileage bookkeeping
//! - Pace/time formatting and small presentation helpers
//!
//! Everything here is pure and single-threaded: reducers take a state value
//! and a sample and hand back the next state. Owning that state, persisting
//! it and wiring sensor streams is the job of the app layer.
//!
//! ## Quick Start
//!
//! ```rust
//! use stridetrack::{reduce, LocationSample, TrackState, TrackingConfig};
//!
//! let config = TrackingConfig::default();
//! let mut state = TrackState::default();
//!
//! for (i, lat) in [51.5074, 51.5080, 51.5090].iter().enumerate() {
//!     let sample = LocationSample::new(*lat, -0.1278, i as i64 * 1000);
//!     state = reduce(state, sample, &config).state;
//! }
//!
//! assert_eq!(state.path.len(), 3);
//! assert!(state.distance_meters > 170.0);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TrackError};

// Reducer parameters
pub mod config;
pub use config::{StepConfig, TrackingConfig, DEFAULT_JITTER_THRESHOLD_M, DEFAULT_PATH_CAPACITY};

// Fixed-capacity ring buffer for run paths
pub mod path_buffer;
pub use path_buffer::PathBuffer;

// Haversine distance and the location reducer
pub mod location;
pub use location::{
    haversine_distance, haversine_meters, reduce, Reduction, SampleOutcome, TrackState,
};

// Accelerometer peak detection
pub mod steps;
pub use steps::{DetectorPhase, MotionSample, StepDetector, StepEvent};

// Persisted documents: runs, shoes, settings, lifetime stats
pub mod records;
pub use records::{ArchivePeriod, LifetimeStats, RunRecord, ShoeProfile, UserSettings};

// Folding completed runs into lifetime stats
pub mod aggregate;
pub use aggregate::{archive, is_archived};

// Pace, time and distance formatting
pub mod format;
pub use format::{format_km, format_pace, format_time, speed_kmh, NO_PACE};

// Recent-activity summary for the history view
pub mod history;
pub use history::{momentum, Momentum, MomentumBar};

// Normalized polyline for the path view
pub mod projection;
pub use projection::{project_path, ProjectedPath, Viewport};

// ============================================================================
// Core Types
// ============================================================================

/// A position fix as recorded in a run's path.
///
/// Field names on the wire match the stored run document
/// (`timestamp`, `accuracy`).
///
/// # Example
/// ```
/// use stridetrack::LocationSample;
/// let sample = LocationSample::new(51.5074, -0.1278, 1_700_000_000_000)
///     .with_altitude(35.0)
///     .with_accuracy(8.0);
/// assert!(sample.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Unix timestamp in milliseconds
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    /// Altitude in meters, when the provider reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// Horizontal accuracy radius in meters
    #[serde(rename = "accuracy", default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
}

impl LocationSample {
    /// Create a sample without altitude or accuracy.
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms,
            altitude: None,
            accuracy_m: None,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// Altitude, ignoring non-finite readings.
    pub fn finite_altitude(&self) -> Option<f64> {
        self.altitude.filter(|a| a.is_finite())
    }

    /// Validate the coordinates, returning the sample unchanged.
    pub fn validated(self) -> Result<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(TrackError::InvalidCoordinates {
                latitude: self.latitude,
                longitude: self.longitude,
                message: "latitude must be within ±90 and longitude within ±180".to_string(),
            })
        }
    }
}
