//! Persisted documents: runs, shoes, settings and lifetime statistics.
//!
//! Field names on the wire are camelCase and match the JSON documents the
//! tracker has always stored, so existing saves load without migration.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{LocationSample, PathBuffer};

/// Share of a shoe's limit past which it should be replaced.
pub const SHOE_REPLACEMENT_RATIO: f64 = 0.9;

/// One day's activity, in progress or archived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: String,
    /// Unix timestamp in milliseconds
    #[serde(rename = "startTime")]
    pub start_time_ms: i64,
    #[serde(rename = "endTime", default, skip_serializing_if = "Option::is_none")]
    pub end_time_ms: Option<i64>,
    /// Meters
    #[serde(rename = "distance")]
    pub distance_meters: f64,
    pub steps: u64,
    #[serde(default)]
    pub path: PathBuffer<LocationSample>,
    /// Seconds
    #[serde(rename = "duration")]
    pub duration_seconds: u64,
    #[serde(rename = "elevationGain", default)]
    pub elevation_gain_meters: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_rest_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shoe_id: Option<String>,
    #[serde(rename = "avgAccuracy", default, skip_serializing_if = "Option::is_none")]
    pub avg_accuracy_m: Option<f64>,
}

impl RunRecord {
    pub fn new(id: impl Into<String>, start_time_ms: i64) -> Self {
        Self {
            id: id.into(),
            start_time_ms,
            end_time_ms: None,
            distance_meters: 0.0,
            steps: 0,
            path: PathBuffer::default(),
            duration_seconds: 0,
            elevation_gain_meters: 0.0,
            notes: None,
            is_rest_day: false,
            shoe_id: None,
            avg_accuracy_m: None,
        }
    }

    /// A fresh record starting at `now_ms`, identified by its start time.
    pub fn fresh(now_ms: i64) -> Self {
        Self::new(now_ms.to_string(), now_ms)
    }

    /// Mean reported accuracy over the retained path points that carry one.
    pub fn mean_path_accuracy(&self) -> Option<f64> {
        let (sum, count) = self
            .path
            .iter()
            .filter_map(|p| p.accuracy_m.filter(|a| a.is_finite()))
            .fold((0.0, 0usize), |(sum, count), a| (sum + a, count + 1));
        (count > 0).then(|| sum / count as f64)
    }
}

/// A pair of shoes and the distance run in them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoeProfile {
    pub id: String,
    pub name: String,
    /// Meters
    #[serde(rename = "currentMileage")]
    pub mileage_meters: f64,
    /// Meters
    #[serde(rename = "limit")]
    pub limit_meters: f64,
    pub is_active: bool,
}

impl ShoeProfile {
    /// Fraction of the limit used so far. Zero when no limit is set.
    pub fn wear_ratio(&self) -> f64 {
        if self.limit_meters > 0.0 {
            self.mileage_meters / self.limit_meters
        } else {
            0.0
        }
    }

    pub fn needs_replacement(&self) -> bool {
        self.wear_ratio() > SHOE_REPLACEMENT_RATIO
    }
}

/// How long archived history is meant to be kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArchivePeriod {
    #[default]
    #[serde(rename = "never")]
    Never,
    #[serde(rename = "6months")]
    SixMonths,
    #[serde(rename = "1year")]
    OneYear,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    /// km/h
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_speed_alert: Option<f64>,
    /// km/h
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_speed_alert: Option<f64>,
    #[serde(default)]
    pub auto_archive_period: ArchivePeriod,
}

/// Cumulative statistics over every archived run.
///
/// The totals are only ever changed by [`crate::archive`]; they always equal
/// the corresponding sums over `history`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LifetimeStats {
    /// Meters
    #[serde(rename = "totalDistance")]
    pub total_distance_meters: f64,
    /// Archived runs, rest days excluded
    pub total_runs: u64,
    pub total_steps: u64,
    /// Most recent first
    pub history: VecDeque<RunRecord>,
    pub shoes: Vec<ShoeProfile>,
    pub settings: UserSettings,
}

impl LifetimeStats {
    pub fn shoe(&self, id: &str) -> Option<&ShoeProfile> {
        self.shoes.iter().find(|s| s.id == id)
    }

    pub fn active_shoe(&self) -> Option<&ShoeProfile> {
        self.shoes.iter().find(|s| s.is_active)
    }
}
