//! The session controller.
//!
//! [`StrideSession`] owns the in-progress run, the lifetime stats and the
//! step detector. Every sample is routed through the pure reducers in
//! `stridetrack`, the results are written back to the owned documents, and
//! both documents are persisted after each change. Persistence is best
//! effort: a failed write is logged and the session keeps running in memory.
//!
//! The daily boundary is the local calendar date. A run started on an
//! earlier date is archived (if anything was recorded) and replaced by a
//! fresh one, either when the session opens or on [`StrideSession::roll_over`].

use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDate, TimeZone};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use stridetrack::{
    LifetimeStats, MotionSample, OptionExt, Reduction, RunRecord, SampleOutcome, ShoeProfile,
    StepDetector, StepEvent, TrackError, TrackState, TrackingConfig, UserSettings, archive,
    is_archived, reduce, speed_kmh,
};

use crate::feedback::FeedbackConfig;
use crate::persistence::{self, BlobStore, STATS_KEY, TODAY_KEY};
use crate::sensors::LocationReading;

/// A session shared with provider callbacks.
pub type SharedSession = Arc<Mutex<StrideSession>>;

/// Storage keys for the two persisted documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    pub today: String,
    pub stats: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            today: TODAY_KEY.to_string(),
            stats: STATS_KEY.to_string(),
        }
    }
}

/// Everything a session can be configured with.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub tracking: TrackingConfig,
    pub feedback: FeedbackConfig,
    pub storage: StorageKeys,
}

impl SessionConfig {
    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SensorState {
    /// Not subscribed
    #[default]
    Idle,
    Active,
    /// Access denied; stays off for the rest of the session
    Offline,
}

/// How trustworthy the latest fix is, from its reported accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalQuality {
    Unknown,
    Good,
    Poor,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedAlert {
    None,
    TooSlow,
    TooFast,
}

/// Local calendar date of a millisecond timestamp in `tz`.
pub fn local_date<Tz: TimeZone>(timestamp_ms: i64, tz: &Tz) -> Option<NaiveDate> {
    tz.timestamp_millis_opt(timestamp_ms)
        .earliest()
        .map(|dt| dt.date_naive())
}

/// Whether two timestamps fall on the same calendar date in `tz`.
pub fn same_day<Tz: TimeZone>(a_ms: i64, b_ms: i64, tz: &Tz) -> bool {
    match (local_date(a_ms, tz), local_date(b_ms, tz)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn has_activity(run: &RunRecord) -> bool {
    run.distance_meters > 0.0 || run.steps > 0 || run.duration_seconds > 0 || !run.path.is_empty()
}

pub struct StrideSession {
    store: Box<dyn BlobStore>,
    config: SessionConfig,
    today: RunRecord,
    stats: LifetimeStats,
    detector: StepDetector,
    selected_shoe_id: Option<String>,
    latest_accuracy_m: Option<f64>,
    latest_speed_mps: Option<f64>,
    location_state: SensorState,
    motion_state: SensorState,
}

impl StrideSession {
    /// Load both documents from the store and apply the daily boundary.
    pub fn open(
        store: Box<dyn BlobStore>,
        config: SessionConfig,
        now_ms: i64,
    ) -> stridetrack::Result<Self> {
        config.tracking.validate()?;

        let stats: LifetimeStats =
            persistence::load_or_default(store.as_ref(), &config.storage.stats);
        let stored: Option<RunRecord> =
            persistence::load_or_default(store.as_ref(), &config.storage.today);

        let mut today = stored.unwrap_or_else(|| RunRecord::fresh(now_ms));
        today.path.set_capacity(config.tracking.path_capacity);

        let selected_shoe_id = today
            .shoe_id
            .clone()
            .filter(|id| stats.shoe(id).is_some())
            .or_else(|| stats.active_shoe().map(|s| s.id.clone()));

        let mut session = Self {
            store,
            detector: StepDetector::new(config.tracking.step),
            config,
            today,
            stats,
            selected_shoe_id,
            latest_accuracy_m: None,
            latest_speed_mps: None,
            location_state: SensorState::Idle,
            motion_state: SensorState::Idle,
        };

        session.roll_over(now_ms);
        session.persist();
        info!(
            "[Session] Opened run {} ({} archived)",
            session.today.id,
            session.stats.history.len()
        );
        Ok(session)
    }

    pub fn shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn today(&self) -> &RunRecord {
        &self.today
    }

    pub fn stats(&self) -> &LifetimeStats {
        &self.stats
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn selected_shoe_id(&self) -> Option<&str> {
        self.selected_shoe_id.as_deref()
    }

    pub fn location_state(&self) -> SensorState {
        self.location_state
    }

    pub fn motion_state(&self) -> SensorState {
        self.motion_state
    }

    pub fn latest_speed_kmh(&self) -> f64 {
        speed_kmh(self.latest_speed_mps.unwrap_or(0.0))
    }

    pub fn latest_accuracy_m(&self) -> Option<f64> {
        self.latest_accuracy_m
    }

    pub fn today_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.today)
    }

    pub fn stats_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.stats)
    }

    pub(crate) fn set_location_state(&mut self, state: SensorState) {
        self.location_state = state;
    }

    /// Offline is sticky: once access was denied, later attaches are ignored.
    pub(crate) fn set_motion_state(&mut self, state: SensorState) {
        if self.motion_state != SensorState::Offline || state == SensorState::Offline {
            self.motion_state = state;
        }
    }

    // ========================================================================
    // Samples
    // ========================================================================

    /// Feed one location reading through the reducer.
    pub fn on_location(&mut self, reading: &LocationReading) -> SampleOutcome {
        self.latest_speed_mps = reading.speed_mps.filter(|s| s.is_finite());
        self.latest_accuracy_m = reading.accuracy_m.filter(|a| a.is_finite());

        let Some(sample) = reading.to_sample() else {
            debug!("[Session] Fix without position at {}", reading.timestamp_ms);
            return SampleOutcome::Invalid;
        };

        let state = TrackState {
            path: std::mem::take(&mut self.today.path),
            distance_meters: self.today.distance_meters,
            elevation_gain_meters: self.today.elevation_gain_meters,
        };
        let Reduction { state, outcome, .. } = reduce(state, sample, &self.config.tracking);

        self.today.path = state.path;
        self.today.distance_meters = state.distance_meters;
        self.today.elevation_gain_meters = state.elevation_gain_meters;

        if matches!(outcome, SampleOutcome::Seed | SampleOutcome::Accepted) {
            self.today.shoe_id = self.selected_shoe_id.clone();
            self.today.avg_accuracy_m = self.today.mean_path_accuracy();
            self.persist();
        }
        outcome
    }

    pub fn on_location_error(&mut self, message: &str) {
        warn!("[Session] Location provider error: {}", message);
    }

    /// Feed one accelerometer sample through the step detector.
    pub fn on_motion(&mut self, sample: &MotionSample) -> Option<StepEvent> {
        if self.motion_state == SensorState::Offline {
            return None;
        }
        let event = self.detector.process(sample)?;
        self.today.steps += 1;
        self.persist();
        Some(event)
    }

    /// Add elapsed seconds to the run's duration.
    pub fn tick(&mut self, seconds: u64) {
        if seconds == 0 {
            return;
        }
        self.today.duration_seconds += seconds;
        self.persist();
    }

    // ========================================================================
    // Archival
    // ========================================================================

    /// Archive the current run as a rest day with optional notes.
    ///
    /// The in-progress run is kept as is, so saving again the same day is a
    /// no-op. Returns whether anything was archived.
    pub fn save_rest_day(&mut self, notes: Option<String>) -> bool {
        if is_archived(&self.stats, &self.today.id) {
            debug!("[Session] Run {} already archived", self.today.id);
            return false;
        }
        let mut record = self.today.clone();
        record.is_rest_day = true;
        record.notes = notes.filter(|n| !n.trim().is_empty());
        record.end_time_ms = record.path.last().map(|p| p.timestamp_ms);

        self.stats = archive(std::mem::take(&mut self.stats), record);
        self.persist();
        true
    }

    /// Start a new run if `now_ms` is on a later local date than the current
    /// one. The old run is archived first unless it is empty. Returns whether
    /// the day rolled over.
    pub fn roll_over(&mut self, now_ms: i64) -> bool {
        self.roll_over_in(now_ms, &Local)
    }

    pub fn roll_over_in<Tz: TimeZone>(&mut self, now_ms: i64, tz: &Tz) -> bool {
        if same_day(self.today.start_time_ms, now_ms, tz) {
            return false;
        }

        let mut fresh = RunRecord::fresh(now_ms);
        fresh.path.set_capacity(self.config.tracking.path_capacity);
        let mut stale = std::mem::replace(&mut self.today, fresh);
        self.detector.reset();

        if has_activity(&stale) {
            stale.end_time_ms = stale.end_time_ms.or(stale.path.last().map(|p| p.timestamp_ms));
            info!("[Session] Day rolled over, archiving {}", stale.id);
            self.stats = archive(std::mem::take(&mut self.stats), stale);
        } else {
            info!("[Session] Day rolled over, discarding empty run {}", stale.id);
        }
        self.persist();
        true
    }

    /// Forget everything: clear the store and start from empty documents.
    pub fn wipe(&mut self, now_ms: i64) {
        if let Err(e) = self.store.clear() {
            warn!("[Session] Failed to clear store: {}", e);
        }
        self.stats = LifetimeStats::default();
        self.today = RunRecord::fresh(now_ms);
        self.today.path.set_capacity(self.config.tracking.path_capacity);
        self.detector.reset();
        self.selected_shoe_id = None;
        self.latest_accuracy_m = None;
        self.latest_speed_mps = None;
        info!("[Session] Wiped all data");
    }

    // ========================================================================
    // Shoes and settings
    // ========================================================================

    /// Register a new pair of shoes with a mileage limit in kilometers.
    /// The first pair becomes the active and selected one.
    pub fn add_shoe(
        &mut self,
        name: &str,
        limit_km: f64,
        now_ms: i64,
    ) -> stridetrack::Result<ShoeProfile> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TrackError::ConfigError {
                field: "name".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if !limit_km.is_finite() || limit_km <= 0.0 {
            return Err(TrackError::ConfigError {
                field: "limit_km".to_string(),
                message: "must be a positive distance".to_string(),
            });
        }

        let mut id = now_ms;
        while self.stats.shoe(&id.to_string()).is_some() {
            id += 1;
        }

        let shoe = ShoeProfile {
            id: id.to_string(),
            name: name.to_string(),
            mileage_meters: 0.0,
            limit_meters: limit_km * 1000.0,
            is_active: self.stats.shoes.is_empty(),
        };
        if shoe.is_active {
            self.selected_shoe_id = Some(shoe.id.clone());
        }
        self.stats.shoes.push(shoe.clone());
        self.persist();
        info!("[Session] Added shoe {} ({})", shoe.name, shoe.id);
        Ok(shoe)
    }

    /// Make one shoe the only active pair and select it for new samples.
    pub fn set_active_shoe(&mut self, id: &str) -> stridetrack::Result<()> {
        self.stats.shoe(id).ok_or_not_found("shoe", id)?;
        for shoe in &mut self.stats.shoes {
            shoe.is_active = shoe.id == id;
        }
        self.selected_shoe_id = Some(id.to_string());
        self.persist();
        Ok(())
    }

    /// Choose which shoe accepted samples are credited to, without changing
    /// the active pair. `None` clears the selection.
    pub fn select_shoe(&mut self, id: Option<&str>) -> stridetrack::Result<()> {
        if let Some(id) = id {
            self.stats.shoe(id).ok_or_not_found("shoe", id)?;
        }
        self.selected_shoe_id = id.map(str::to_string);
        Ok(())
    }

    pub fn update_settings(&mut self, settings: UserSettings) {
        self.stats.settings = settings;
        self.persist();
    }

    // ========================================================================
    // Live readouts
    // ========================================================================

    pub fn signal_quality(&self) -> SignalQuality {
        let tracking = &self.config.tracking;
        match self.latest_accuracy_m {
            None => SignalQuality::Unknown,
            Some(a) if a > tracking.critical_accuracy_m => SignalQuality::Critical,
            Some(a) if a > tracking.poor_accuracy_m => SignalQuality::Poor,
            Some(_) => SignalQuality::Good,
        }
    }

    /// Compare the latest reported speed with the configured alert band.
    pub fn speed_alert(&self) -> SpeedAlert {
        let Some(mps) = self.latest_speed_mps else {
            return SpeedAlert::None;
        };
        let kmh = speed_kmh(mps);
        let settings = &self.stats.settings;
        if settings.min_speed_alert.is_some_and(|min| kmh < min) {
            SpeedAlert::TooSlow
        } else if settings.max_speed_alert.is_some_and(|max| kmh > max) {
            SpeedAlert::TooFast
        } else {
            SpeedAlert::None
        }
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    fn persist(&mut self) {
        let keys = &self.config.storage;
        if let Err(e) = persistence::save_json(self.store.as_mut(), &keys.today, &self.today) {
            warn!("[Session] Failed to save {}: {}", keys.today, e);
        }
        if let Err(e) = persistence::save_json(self.store.as_mut(), &keys.stats, &self.stats) {
            warn!("[Session] Failed to save {}: {}", keys.stats, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryBlobStore;
    use chrono::Utc;

    const DAY_MS: i64 = 86_400_000;
    /// 2024-06-10 12:00:00 UTC
    const NOON: i64 = 1_718_020_800_000;

    fn open(now_ms: i64) -> StrideSession {
        StrideSession::open(Box::new(MemoryBlobStore::new()), SessionConfig::default(), now_ms)
            .unwrap()
    }

    fn fix(lat: f64, lon: f64, t: i64) -> LocationReading {
        LocationReading {
            latitude: Some(lat),
            longitude: Some(lon),
            timestamp_ms: t,
            ..LocationReading::default()
        }
    }

    #[test]
    fn test_same_day_in_utc() {
        assert!(same_day(NOON, NOON + 11 * 3_600_000, &Utc));
        assert!(!same_day(NOON, NOON + 12 * 3_600_000, &Utc));
        assert!(!same_day(NOON, NOON - DAY_MS, &Utc));
    }

    #[test]
    fn test_location_updates_run() {
        let mut session = open(NOON);
        assert_eq!(session.on_location(&fix(51.5, -0.12, NOON)), SampleOutcome::Seed);
        assert_eq!(session.on_location(&fix(51.5, -0.12, NOON + 1000)), SampleOutcome::Jitter);
        assert_eq!(session.on_location(&fix(51.501, -0.12, NOON + 2000)), SampleOutcome::Accepted);
        assert_eq!(session.today().path.len(), 2);
        assert!(session.today().distance_meters > 100.0);

        let blank = LocationReading {
            timestamp_ms: NOON + 3000,
            ..LocationReading::default()
        };
        assert_eq!(session.on_location(&blank), SampleOutcome::Invalid);
    }

    #[test]
    fn test_accepted_samples_take_selected_shoe_and_accuracy() {
        let mut session = open(NOON);
        let shoe = session.add_shoe("Clifton", 700.0, NOON).unwrap();
        assert!(shoe.is_active);
        assert_eq!(session.selected_shoe_id(), Some(shoe.id.as_str()));

        let mut reading = fix(10.0, 10.0, NOON);
        reading.accuracy_m = Some(4.0);
        session.on_location(&reading);
        let mut reading = fix(10.001, 10.0, NOON + 5000);
        reading.accuracy_m = Some(8.0);
        session.on_location(&reading);

        assert_eq!(session.today().shoe_id.as_deref(), Some(shoe.id.as_str()));
        assert_eq!(session.today().avg_accuracy_m, Some(6.0));
    }

    #[test]
    fn test_steps_and_ticks() {
        let mut session = open(NOON);
        for (i, m) in [0.0, 13.0, 0.0, 13.0].iter().enumerate() {
            session.on_motion(&MotionSample::new(*m, 0.0, 0.0, NOON + i as i64 * 300));
        }
        session.tick(1);
        session.tick(1);
        assert_eq!(session.today().steps, 2);
        assert_eq!(session.today().duration_seconds, 2);
    }

    #[test]
    fn test_offline_motion_is_ignored() {
        let mut session = open(NOON);
        session.set_motion_state(SensorState::Offline);
        session.set_motion_state(SensorState::Active);
        assert_eq!(session.motion_state(), SensorState::Offline);
        assert!(session.on_motion(&MotionSample::new(13.0, 0.0, 0.0, NOON)).is_none());
        assert_eq!(session.today().steps, 0);
    }

    #[test]
    fn test_rest_day_is_saved_once() {
        let mut session = open(NOON);
        session.tick(30);
        assert!(session.save_rest_day(Some("easy day".into())));
        assert!(!session.save_rest_day(Some("again".into())));

        let stats = session.stats();
        assert_eq!(stats.history.len(), 1);
        assert_eq!(stats.total_runs, 0);
        assert!(stats.history[0].is_rest_day);
        assert_eq!(stats.history[0].notes.as_deref(), Some("easy day"));
        assert!(!session.today().is_rest_day);
    }

    #[test]
    fn test_roll_over_archives_active_run() {
        let mut session = open(NOON);
        session.on_location(&fix(0.0, 0.0, NOON));
        session.on_location(&fix(0.001, 0.0, NOON + 1000));
        let old_id = session.today().id.clone();
        let distance = session.today().distance_meters;

        assert!(!session.roll_over_in(NOON + 3_600_000, &Utc));
        assert!(session.roll_over_in(NOON + DAY_MS, &Utc));

        assert_eq!(session.today().id, (NOON + DAY_MS).to_string());
        assert_eq!(session.today().distance_meters, 0.0);
        assert_eq!(session.stats().history[0].id, old_id);
        assert_eq!(session.stats().total_distance_meters, distance);
        assert_eq!(session.stats().total_runs, 1);
    }

    #[test]
    fn test_roll_over_discards_empty_run() {
        let mut session = open(NOON);
        assert!(session.roll_over_in(NOON + DAY_MS, &Utc));
        assert!(session.stats().history.is_empty());
    }

    #[test]
    fn test_shoes() {
        let mut session = open(NOON);
        let first = session.add_shoe("Road", 800.0, NOON).unwrap();
        let second = session.add_shoe("Trail", 600.0, NOON).unwrap();
        assert_ne!(first.id, second.id);
        assert!(!second.is_active);
        assert_eq!(second.limit_meters, 600_000.0);

        session.set_active_shoe(&second.id).unwrap();
        let active: Vec<&str> = session
            .stats()
            .shoes
            .iter()
            .filter(|s| s.is_active)
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(active, vec![second.id.as_str()]);
        assert_eq!(session.selected_shoe_id(), Some(second.id.as_str()));

        assert!(matches!(
            session.set_active_shoe("nope"),
            Err(TrackError::NotFound { kind: "shoe", .. })
        ));
        assert!(session.select_shoe(Some("nope")).is_err());
        session.select_shoe(None).unwrap();
        assert_eq!(session.selected_shoe_id(), None);

        assert!(session.add_shoe("  ", 500.0, NOON).is_err());
        assert!(session.add_shoe("Spikes", f64::NAN, NOON).is_err());
    }

    #[test]
    fn test_signal_quality_and_speed_alerts() {
        let mut session = open(NOON);
        assert_eq!(session.signal_quality(), SignalQuality::Unknown);
        assert_eq!(session.speed_alert(), SpeedAlert::None);

        session.update_settings(UserSettings {
            min_speed_alert: Some(6.0),
            max_speed_alert: Some(15.0),
            ..UserSettings::default()
        });

        let mut reading = fix(0.0, 0.0, NOON);
        for (accuracy, expected) in [
            (10.0, SignalQuality::Good),
            (25.0, SignalQuality::Good),
            (30.0, SignalQuality::Poor),
            (61.0, SignalQuality::Critical),
        ] {
            reading.accuracy_m = Some(accuracy);
            session.on_location(&reading);
            assert_eq!(session.signal_quality(), expected);
        }

        for (mps, expected) in [
            (1.0, SpeedAlert::TooSlow),
            (3.0, SpeedAlert::None),
            (5.0, SpeedAlert::TooFast),
        ] {
            reading.speed_mps = Some(mps);
            session.on_location(&reading);
            assert_eq!(session.speed_alert(), expected);
        }
        assert!((session.latest_speed_kmh() - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_wipe() {
        let mut session = open(NOON);
        session.add_shoe("Road", 800.0, NOON).unwrap();
        session.tick(10);
        session.save_rest_day(None);
        session.wipe(NOON + 5);
        assert_eq!(session.stats(), &LifetimeStats::default());
        assert_eq!(session.today().id, (NOON + 5).to_string());
        assert_eq!(session.selected_shoe_id(), None);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = SessionConfig::default();
        config.tracking.path_capacity = 0;
        assert!(StrideSession::open(Box::new(MemoryBlobStore::new()), config, NOON).is_err());
    }

    #[test]
    fn test_config_from_json() {
        let config = SessionConfig::from_json(
            r#"{"tracking": {"jitter_threshold_m": 5.0}, "storage": {"stats": "custom"}}"#,
        )
        .unwrap();
        assert_eq!(config.tracking.jitter_threshold_m, 5.0);
        assert_eq!(config.storage.stats, "custom");
        assert_eq!(config.storage.today, TODAY_KEY);
    }
}
