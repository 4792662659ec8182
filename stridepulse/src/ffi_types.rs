//! FFI-safe types with UniFFI derives.
//!
//! These mirror the session and stridetrack types but add UniFFI derives.
//! Conversion is done at the FFI boundary.

use stridetrack::{
    MotionSample, Momentum, MomentumBar, RunRecord, ShoeProfile, format_km, format_pace,
    format_time, project_path,
};

use crate::sensors::LocationReading;
use crate::session::{SignalQuality, SpeedAlert, StrideSession};

// ============================================================================
// Samples
// ============================================================================

/// Location fix as delivered by the platform
#[derive(Debug, Clone, Copy, PartialEq, uniffi::Record)]
pub struct FfiLocationFix {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub accuracy: Option<f64>,
    /// m/s
    pub speed: Option<f64>,
    pub timestamp_ms: i64,
}

impl From<FfiLocationFix> for LocationReading {
    fn from(f: FfiLocationFix) -> Self {
        Self {
            latitude: f.latitude,
            longitude: f.longitude,
            altitude: f.altitude,
            accuracy_m: f.accuracy,
            speed_mps: f.speed,
            timestamp_ms: f.timestamp_ms,
        }
    }
}

/// Accelerometer reading (m/s², gravity included)
#[derive(Debug, Clone, Copy, PartialEq, uniffi::Record)]
pub struct FfiMotionSample {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub timestamp_ms: i64,
}

impl From<FfiMotionSample> for MotionSample {
    fn from(s: FfiMotionSample) -> Self {
        Self {
            x: s.x,
            y: s.y,
            z: s.z,
            timestamp_ms: s.timestamp_ms,
        }
    }
}

// ============================================================================
// Readouts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiSignalQuality {
    Unknown,
    Good,
    Poor,
    Critical,
}

impl From<SignalQuality> for FfiSignalQuality {
    fn from(q: SignalQuality) -> Self {
        match q {
            SignalQuality::Unknown => Self::Unknown,
            SignalQuality::Good => Self::Good,
            SignalQuality::Poor => Self::Poor,
            SignalQuality::Critical => Self::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiSpeedAlert {
    InRange,
    TooSlow,
    TooFast,
}

impl From<SpeedAlert> for FfiSpeedAlert {
    fn from(a: SpeedAlert) -> Self {
        match a {
            SpeedAlert::None => Self::InRange,
            SpeedAlert::TooSlow => Self::TooSlow,
            SpeedAlert::TooFast => Self::TooFast,
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiShoe {
    pub id: String,
    pub name: String,
    pub mileage_meters: f64,
    pub limit_meters: f64,
    pub is_active: bool,
    pub wear_ratio: f64,
    pub needs_replacement: bool,
}

impl From<&ShoeProfile> for FfiShoe {
    fn from(s: &ShoeProfile) -> Self {
        Self {
            id: s.id.clone(),
            name: s.name.clone(),
            mileage_meters: s.mileage_meters,
            limit_meters: s.limit_meters,
            is_active: s.is_active,
            wear_ratio: s.wear_ratio(),
            needs_replacement: s.needs_replacement(),
        }
    }
}

/// Everything the live screen shows, formatted.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiRunSnapshot {
    pub id: String,
    pub start_time_ms: i64,
    pub distance_meters: f64,
    pub distance_km: String,
    pub steps: u64,
    pub duration_seconds: u64,
    pub elapsed: String,
    pub pace: String,
    pub elevation_gain_meters: f64,
    pub speed_kmh: f64,
    pub signal: FfiSignalQuality,
    pub speed_alert: FfiSpeedAlert,
    pub motion_offline: bool,
    pub shoe_id: Option<String>,
    pub path_point_count: u32,
    /// SVG path data for the route preview, when there are 2+ points
    pub path_svg: Option<String>,
}

impl FfiRunSnapshot {
    pub fn from_session(session: &StrideSession) -> Self {
        let run: &RunRecord = session.today();
        Self {
            id: run.id.clone(),
            start_time_ms: run.start_time_ms,
            distance_meters: run.distance_meters,
            distance_km: format_km(run.distance_meters, 2),
            steps: run.steps,
            duration_seconds: run.duration_seconds,
            elapsed: format_time(run.duration_seconds),
            pace: format_pace(run.duration_seconds, run.distance_meters),
            elevation_gain_meters: run.elevation_gain_meters,
            speed_kmh: session.latest_speed_kmh(),
            signal: session.signal_quality().into(),
            speed_alert: session.speed_alert().into(),
            motion_offline: session.motion_state() == crate::SensorState::Offline,
            shoe_id: run.shoe_id.clone(),
            path_point_count: run.path.len() as u32,
            path_svg: project_path(run.path.iter(), Default::default()).map(|p| p.svg_path()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiMomentumBar {
    pub run_id: String,
    pub start_time_ms: i64,
    pub distance_meters: f64,
    pub height_ratio: f64,
}

impl From<MomentumBar> for FfiMomentumBar {
    fn from(b: MomentumBar) -> Self {
        Self {
            run_id: b.run_id,
            start_time_ms: b.start_time_ms,
            distance_meters: b.distance_meters,
            height_ratio: b.height_ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiMomentum {
    pub bars: Vec<FfiMomentumBar>,
    pub average_distance_meters: f64,
    pub record_distance_meters: f64,
}

impl From<Momentum> for FfiMomentum {
    fn from(m: Momentum) -> Self {
        Self {
            bars: m.bars.into_iter().map(Into::into).collect(),
            average_distance_meters: m.average_distance_meters,
            record_distance_meters: m.record_distance_meters,
        }
    }
}
