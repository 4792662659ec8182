//! FFI bindings for mobile platforms (iOS/Android).
//!
//! The mobile shell owns the platform sensors and pushes their readings in
//! through these functions. A single global runtime holds the session and the
//! two manual providers the pushed readings are fanned out through; starting
//! and stopping tracking attaches and cancels the provider subscriptions.
//!
//! All functions are safe to call before `stride_init`: they return false,
//! `None` or do nothing.

use std::sync::{Arc, Mutex};

use log::{info, warn};
use once_cell::sync::Lazy;
use stridetrack::{MotionSample, UserSettings, format_pace, format_time, momentum};

use crate::feedback::{self, RunSummaryRequest};
use crate::ffi_types::{FfiLocationFix, FfiMomentum, FfiMotionSample, FfiRunSnapshot, FfiShoe};
use crate::persistence::SqliteBlobStore;
use crate::sensors::{
    AccessDecision, LocationEvent, ManualProvider, Subscription, attach_location, attach_motion,
};
use crate::session::{SensorState, SessionConfig, SharedSession, StrideSession};
use crate::{FeedbackConfig, init_logging, now_ms};

struct FfiRuntime {
    session: SharedSession,
    location: Arc<ManualProvider<LocationEvent>>,
    motion: Arc<ManualProvider<MotionSample>>,
    location_sub: Option<Subscription>,
    motion_sub: Option<Subscription>,
}

/// Global runtime instance.
///
/// This singleton allows FFI calls to reach the session without passing
/// state back and forth across the FFI boundary.
static RUNTIME: Lazy<Mutex<Option<FfiRuntime>>> = Lazy::new(|| Mutex::new(None));

fn with_runtime<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut FfiRuntime) -> R,
{
    let mut guard = RUNTIME.lock().ok()?;
    guard.as_mut().map(f)
}

/// Run `f` against the session. The runtime lock is released first so
/// provider callbacks never wait on it.
fn with_session<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut StrideSession) -> R,
{
    let session = with_runtime(|rt| Arc::clone(&rt.session))?;
    let mut guard = session.lock().ok()?;
    Some(f(&mut guard))
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Open (or create) the database at `db_path` and start a session.
/// Replaces any existing session. Returns false on failure.
#[uniffi::export]
pub fn stride_init(db_path: String) -> bool {
    init_logging();

    let store = match SqliteBlobStore::open(&db_path) {
        Ok(store) => store,
        Err(e) => {
            warn!("[FFI] Failed to open store at {}: {}", db_path, e);
            return false;
        }
    };
    let config = SessionConfig {
        feedback: FeedbackConfig::from_env(),
        ..SessionConfig::default()
    };
    let session = match StrideSession::open(Box::new(store), config, now_ms()) {
        Ok(session) => session,
        Err(e) => {
            warn!("[FFI] Failed to open session: {}", e);
            return false;
        }
    };

    let Ok(mut guard) = RUNTIME.lock() else {
        return false;
    };
    *guard = Some(FfiRuntime {
        session: session.shared(),
        location: Arc::new(ManualProvider::new()),
        motion: Arc::new(ManualProvider::new()),
        location_sub: None,
        motion_sub: None,
    });
    info!("[FFI] Initialized with {}", db_path);
    true
}

#[uniffi::export]
pub fn stride_is_initialized() -> bool {
    with_runtime(|_| ()).is_some()
}

/// Record the outcome of the platform's motion permission prompt.
/// Takes effect at the next `stride_start_tracking`.
#[uniffi::export]
pub fn stride_set_motion_access(granted: bool) -> bool {
    let decision = if granted {
        AccessDecision::Granted
    } else {
        AccessDecision::Denied
    };
    with_runtime(|rt| rt.motion.set_access(decision)).is_some()
}

/// Subscribe the session to location and motion. Returns whether motion
/// tracking is active (false when access was denied).
#[uniffi::export]
pub fn stride_start_tracking() -> bool {
    with_runtime(|rt| {
        if rt.location_sub.is_none() {
            rt.location_sub = Some(attach_location(&rt.session, rt.location.as_ref()));
        }
        if rt.motion_sub.is_none() {
            rt.motion_sub = attach_motion(&rt.session, rt.motion.as_ref());
        }
        rt.motion_sub.is_some()
    })
    .unwrap_or(false)
}

#[uniffi::export]
pub fn stride_stop_location() {
    let session = with_runtime(|rt| {
        if let Some(mut sub) = rt.location_sub.take() {
            sub.cancel();
        }
        Arc::clone(&rt.session)
    });
    if let Some(Ok(mut s)) = session.as_ref().map(|s| s.lock()) {
        s.set_location_state(SensorState::Idle);
    }
}

#[uniffi::export]
pub fn stride_stop_motion() {
    let session = with_runtime(|rt| {
        if let Some(mut sub) = rt.motion_sub.take() {
            sub.cancel();
        }
        Arc::clone(&rt.session)
    });
    if let Some(Ok(mut s)) = session.as_ref().map(|s| s.lock()) {
        s.set_motion_state(SensorState::Idle);
    }
}

// ============================================================================
// Samples
// ============================================================================

/// Push a location fix. Returns false if location tracking isn't running.
#[uniffi::export]
pub fn stride_push_location(fix: FfiLocationFix) -> bool {
    let Some(provider) = with_runtime(|rt| Arc::clone(&rt.location)) else {
        return false;
    };
    provider.emit(LocationEvent::Fix(fix.into())) > 0
}

#[uniffi::export]
pub fn stride_push_location_error(message: String) {
    if let Some(provider) = with_runtime(|rt| Arc::clone(&rt.location)) {
        provider.emit(LocationEvent::Error(message));
    }
}

/// Push an accelerometer sample. Returns false if motion tracking isn't
/// running.
#[uniffi::export]
pub fn stride_push_motion(sample: FfiMotionSample) -> bool {
    let Some(provider) = with_runtime(|rt| Arc::clone(&rt.motion)) else {
        return false;
    };
    provider.emit(sample.into()) > 0
}

/// Advance the run clock. Also checks the day boundary.
#[uniffi::export]
pub fn stride_tick(seconds: u64) {
    with_session(|s| {
        s.roll_over(now_ms());
        s.tick(seconds);
    });
}

// ============================================================================
// Run, shoes, settings
// ============================================================================

#[uniffi::export]
pub fn stride_save_rest_day(notes: Option<String>) -> bool {
    with_session(|s| s.save_rest_day(notes)).unwrap_or(false)
}

#[uniffi::export]
pub fn stride_add_shoe(name: String, limit_km: f64) -> Option<FfiShoe> {
    with_session(|s| match s.add_shoe(&name, limit_km, now_ms()) {
        Ok(shoe) => Some(FfiShoe::from(&shoe)),
        Err(e) => {
            warn!("[FFI] add_shoe: {}", e);
            None
        }
    })
    .flatten()
}

#[uniffi::export]
pub fn stride_set_active_shoe(id: String) -> bool {
    with_session(|s| match s.set_active_shoe(&id) {
        Ok(()) => true,
        Err(e) => {
            warn!("[FFI] set_active_shoe: {}", e);
            false
        }
    })
    .unwrap_or(false)
}

#[uniffi::export]
pub fn stride_get_shoes() -> Vec<FfiShoe> {
    with_session(|s| s.stats().shoes.iter().map(FfiShoe::from).collect()).unwrap_or_default()
}

/// Replace the user settings with a JSON document.
#[uniffi::export]
pub fn stride_update_settings(settings_json: String) -> bool {
    let settings: UserSettings = match serde_json::from_str(&settings_json) {
        Ok(settings) => settings,
        Err(e) => {
            warn!("[FFI] Invalid settings: {}", e);
            return false;
        }
    };
    with_session(|s| s.update_settings(settings)).is_some()
}

/// Clear all stored data and start over.
#[uniffi::export]
pub fn stride_wipe() -> bool {
    with_session(|s| s.wipe(now_ms())).is_some()
}

// ============================================================================
// Snapshots
// ============================================================================

#[uniffi::export]
pub fn stride_get_today() -> Option<FfiRunSnapshot> {
    with_session(|s| FfiRunSnapshot::from_session(s))
}

#[uniffi::export]
pub fn stride_get_today_json() -> Option<String> {
    with_session(|s| s.today_json().ok()).flatten()
}

#[uniffi::export]
pub fn stride_get_stats_json() -> Option<String> {
    with_session(|s| s.stats_json().ok()).flatten()
}

#[uniffi::export]
pub fn stride_get_momentum() -> Option<FfiMomentum> {
    with_session(|s| momentum(&s.stats().history).map(Into::into)).flatten()
}

// ============================================================================
// Formatting
// ============================================================================

#[uniffi::export]
pub fn stride_format_pace(seconds: u64, meters: f64) -> String {
    format_pace(seconds, meters)
}

#[uniffi::export]
pub fn stride_format_time(seconds: u64) -> String {
    format_time(seconds)
}

// ============================================================================
// Feedback
// ============================================================================

/// Ask for feedback on today's run in the background.
/// Returns false if not initialized or a request is already running.
/// Poll `stride_take_feedback` for the result.
#[uniffi::export]
pub fn stride_request_feedback() -> bool {
    let Some((config, req)) = with_session(|s| {
        (
            s.config().feedback.clone(),
            RunSummaryRequest::from(s.today()),
        )
    }) else {
        return false;
    };
    feedback::start_background_feedback(config, req)
}

#[uniffi::export]
pub fn stride_take_feedback() -> Option<String> {
    feedback::take_feedback()
}
