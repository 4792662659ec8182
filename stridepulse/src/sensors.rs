//! Sensor provider lifecycle.
//!
//! Location and motion arrive from platform providers that the app layer
//! doesn't own. Each provider is plugged in through a trait with a two-phase
//! lifecycle: an optional access request, then a subscription that delivers
//! samples to a sink until it is cancelled or dropped.
//!
//! [`ManualProvider`] is the provider used when samples are pushed in from
//! outside (the FFI layer, tests): it fans each pushed event out to the
//! current subscribers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use stridetrack::{LocationSample, MotionSample};

use crate::session::{SensorState, SharedSession};

/// A raw fix as reported by the platform.
///
/// Coordinates are optional because providers occasionally deliver fixes
/// without a position; those are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LocationReading {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    /// Horizontal accuracy radius in meters
    pub accuracy_m: Option<f64>,
    /// Ground speed in m/s
    pub speed_mps: Option<f64>,
    pub timestamp_ms: i64,
}

impl LocationReading {
    /// The path sample for this reading, if it carries a position.
    pub fn to_sample(&self) -> Option<LocationSample> {
        Some(LocationSample {
            latitude: self.latitude?,
            longitude: self.longitude?,
            timestamp_ms: self.timestamp_ms,
            altitude: self.altitude,
            accuracy_m: self.accuracy_m,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    Fix(LocationReading),
    /// Provider-side failure (timeout, signal lost). Informational only.
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    Denied,
}

/// Receives samples from a provider.
pub type Sink<T> = Box<dyn FnMut(T) + Send>;

/// Handle to an active provider subscription.
///
/// Cancelling is immediate and idempotent. Dropping the handle cancels it.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to tear down.
    pub fn inert() -> Self {
        Self { cancel: None }
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

pub trait LocationProvider {
    fn subscribe(&self, sink: Sink<LocationEvent>) -> Subscription;
}

pub trait MotionProvider {
    /// Whether the platform gates motion data behind a permission prompt.
    fn requires_access(&self) -> bool {
        false
    }

    fn request_access(&self) -> AccessDecision {
        AccessDecision::Granted
    }

    fn subscribe(&self, sink: Sink<MotionSample>) -> Subscription;
}

// ============================================================================
// Manual provider
// ============================================================================

type SharedSink<T> = Arc<Mutex<Sink<T>>>;
type Listeners<T> = Arc<Mutex<Vec<(u64, SharedSink<T>)>>>;

/// Provider fed by explicit [`ManualProvider::emit`] calls.
pub struct ManualProvider<T> {
    listeners: Listeners<T>,
    next_id: AtomicU64,
    access: Mutex<Option<AccessDecision>>,
}

impl<T> ManualProvider<T> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
            access: Mutex::new(None),
        }
    }

    /// Gate motion access behind a decision that `request_access` returns.
    pub fn with_access(decision: AccessDecision) -> Self {
        let provider = Self::new();
        provider.set_access(decision);
        provider
    }

    pub fn set_access(&self, decision: AccessDecision) {
        if let Ok(mut access) = self.access.lock() {
            *access = Some(decision);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    fn is_registered(&self, id: u64) -> bool {
        self.listeners
            .lock()
            .map(|l| l.iter().any(|(sid, _)| *sid == id))
            .unwrap_or(false)
    }

    fn add(&self, sink: Sink<T>) -> Subscription
    where
        T: 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match self.listeners.lock() {
            Ok(mut listeners) => listeners.push((id, Arc::new(Mutex::new(sink)))),
            Err(_) => {
                warn!("[Sensors] Listener list poisoned, subscription ignored");
                return Subscription::inert();
            }
        }
        let listeners = Arc::clone(&self.listeners);
        Subscription::new(move || {
            if let Ok(mut listeners) = listeners.lock() {
                listeners.retain(|(sid, _)| *sid != id);
            }
        })
    }
}

impl<T: Clone> ManualProvider<T> {
    /// Deliver an event to every current subscriber. Returns how many got it.
    ///
    /// The listener list is not locked while sinks run, so a sink may cancel
    /// any subscription, its own included.
    pub fn emit(&self, event: T) -> usize {
        let snapshot: Vec<(u64, SharedSink<T>)> = match self.listeners.lock() {
            Ok(listeners) => listeners
                .iter()
                .map(|(id, sink)| (*id, Arc::clone(sink)))
                .collect(),
            Err(_) => return 0,
        };

        let mut delivered = 0;
        for (id, sink) in snapshot {
            // Skip sinks cancelled earlier in this delivery
            if !self.is_registered(id) {
                continue;
            }
            if let Ok(mut sink) = sink.lock() {
                (*sink)(event.clone());
                delivered += 1;
            }
        }
        delivered
    }
}

impl<T> Default for ManualProvider<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationProvider for ManualProvider<LocationEvent> {
    fn subscribe(&self, sink: Sink<LocationEvent>) -> Subscription {
        self.add(sink)
    }
}

impl MotionProvider for ManualProvider<MotionSample> {
    fn requires_access(&self) -> bool {
        self.access.lock().map(|a| a.is_some()).unwrap_or(false)
    }

    fn request_access(&self) -> AccessDecision {
        self.access
            .lock()
            .ok()
            .and_then(|a| *a)
            .unwrap_or(AccessDecision::Granted)
    }

    fn subscribe(&self, sink: Sink<MotionSample>) -> Subscription {
        self.add(sink)
    }
}

// ============================================================================
// Wiring providers to a session
// ============================================================================

/// Route a location provider into the session.
pub fn attach_location(session: &SharedSession, provider: &dyn LocationProvider) -> Subscription {
    let target = Arc::clone(session);
    let subscription = provider.subscribe(Box::new(move |event: LocationEvent| {
        let Ok(mut session) = target.lock() else {
            return;
        };
        match event {
            LocationEvent::Fix(reading) => {
                session.on_location(&reading);
            }
            LocationEvent::Error(message) => session.on_location_error(&message),
        }
    }));
    if let Ok(mut s) = session.lock() {
        s.set_location_state(SensorState::Active);
    }
    info!("[Sensors] Location attached");
    subscription
}

/// Ask for motion access and, if granted, route the provider into the
/// session. On denial the session's motion state becomes
/// [`SensorState::Offline`] and `None` is returned; nothing else changes.
pub fn attach_motion(
    session: &SharedSession,
    provider: &dyn MotionProvider,
) -> Option<Subscription> {
    if provider.requires_access() && provider.request_access() == AccessDecision::Denied {
        warn!("[Sensors] Motion access denied, step counting offline");
        if let Ok(mut s) = session.lock() {
            s.set_motion_state(SensorState::Offline);
        }
        return None;
    }

    let target = Arc::clone(session);
    let subscription = provider.subscribe(Box::new(move |sample: MotionSample| {
        if let Ok(mut session) = target.lock() {
            session.on_motion(&sample);
        }
    }));
    if let Ok(mut s) = session.lock() {
        s.set_motion_state(SensorState::Active);
    }
    info!("[Sensors] Motion attached");
    Some(subscription)
}
