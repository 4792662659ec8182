//! Stridepulse - app layer and mobile FFI bindings for stridetrack
//!
//! This crate provides:
//! - The session controller that owns today's run and lifetime stats
//! - SQLite-backed blob persistence
//! - Sensor provider lifecycle (access request, subscribe, cancel)
//! - HTTP client for AI run feedback
//! - UniFFI bindings for iOS/Android

// Re-export all public types from stridetrack
pub use stridetrack::*;

pub mod error;
pub use error::{FeedbackError, StoreError, StoreResult};

// Persistence layer with SQLite storage
mod migrations;
pub mod persistence;
pub use persistence::{BlobStore, MemoryBlobStore, STATS_KEY, SqliteBlobStore, TODAY_KEY};

pub mod session;
pub use session::{
    SensorState, SessionConfig, SharedSession, SignalQuality, SpeedAlert, StorageKeys,
    StrideSession,
};

pub mod sensors;
pub use sensors::{
    AccessDecision, LocationEvent, LocationProvider, LocationReading, ManualProvider,
    MotionProvider, Subscription, attach_location, attach_motion,
};

// HTTP client for run feedback
pub mod feedback;
pub use feedback::{FeedbackClient, FeedbackConfig, RunSummaryRequest};

// FFI bindings for mobile platforms
pub mod ffi;
pub mod ffi_types;

uniffi::setup_scaffolding!();

/// Current wall-clock time in Unix milliseconds.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Initialize logging for Android
#[cfg(target_os = "android")]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("stridepulse"),
    );
}

/// Initialize logging for iOS
#[cfg(target_os = "ios")]
pub(crate) fn init_logging() {
    use log::LevelFilter;

    // Err only means a logger is already installed
    let _ = oslog::OsLogger::new("com.stridepulse")
        .level_filter(LevelFilter::Debug)
        .init();
}

#[cfg(not(any(target_os = "android", target_os = "ios")))]
pub(crate) fn init_logging() {
    // No-op on other platforms; tests install env_logger themselves
}
