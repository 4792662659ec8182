//! Location reduction: haversine distance and the jitter-filtered reducer.
//!
//! Raw fixes arrive one at a time. Each is compared against the last
//! *accepted* point; it is kept only when it moved the runner further than
//! the jitter threshold. Sub-threshold fixes are dropped outright rather than
//! buffered, so a very slow walk can under-count distance. That is accepted
//! in exchange for a distance total that doesn't creep while standing still.

use log::debug;

use crate::{LocationSample, PathBuffer, TrackingConfig};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two coordinates in meters.
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Haversine distance between two samples in meters.
pub fn haversine_distance(from: &LocationSample, to: &LocationSample) -> f64 {
    haversine_meters(from.latitude, from.longitude, to.latitude, to.longitude)
}

/// Accumulated location state for one run.
///
/// `distance_meters` and `elevation_gain_meters` are running totals; they are
/// never recomputed from `path`, so evicting old points doesn't change them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackState {
    pub path: PathBuffer<LocationSample>,
    pub distance_meters: f64,
    pub elevation_gain_meters: f64,
}

/// What happened to a sample handed to [`reduce`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// First point of an empty path
    Seed,
    /// Moved further than the jitter threshold
    Accepted,
    /// Within the jitter threshold of the last accepted point; dropped
    Jitter,
    /// Non-finite or out-of-range coordinates; dropped
    Invalid,
}

/// Result of reducing one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub state: TrackState,
    pub outcome: SampleOutcome,
    /// Distance added to the running total (0 unless accepted)
    pub distance_delta: f64,
    /// Elevation gain added to the running total (0 unless accepted)
    pub elevation_delta: f64,
}

impl Reduction {
    /// Whether the sample was appended to the path.
    pub fn accepted(&self) -> bool {
        matches!(self.outcome, SampleOutcome::Seed | SampleOutcome::Accepted)
    }

    fn unchanged(state: TrackState, outcome: SampleOutcome) -> Self {
        Self {
            state,
            outcome,
            distance_delta: 0.0,
            elevation_delta: 0.0,
        }
    }
}

/// Fold one location sample into the track state.
///
/// - An empty path always takes the sample as its seed.
/// - Otherwise the sample is accepted only if its haversine distance from the
///   last accepted point is strictly greater than
///   `config.jitter_threshold_m`; the distance is then added to the total.
/// - Elevation gain grows by the climb from the last accepted point when both
///   carry an altitude and the new one is higher. Descents add nothing.
/// - Rejected samples leave the state exactly as it was.
pub fn reduce(mut state: TrackState, sample: LocationSample, config: &TrackingConfig) -> Reduction {
    if !sample.is_valid() {
        debug!(
            "[Reducer] Dropping invalid fix ({}, {})",
            sample.latitude, sample.longitude
        );
        return Reduction::unchanged(state, SampleOutcome::Invalid);
    }

    if state.path.capacity() != config.path_capacity {
        state.path.set_capacity(config.path_capacity);
    }

    let Some(last) = state.path.last().copied() else {
        state.path.push(sample);
        return Reduction::unchanged(state, SampleOutcome::Seed);
    };

    let increment = haversine_distance(&last, &sample);
    // Negated comparison so a NaN increment is treated as jitter too
    if !(increment > config.jitter_threshold_m) {
        debug!("[Reducer] Dropping jitter fix ({:.2}m)", increment);
        return Reduction::unchanged(state, SampleOutcome::Jitter);
    }

    let climb = match (last.finite_altitude(), sample.finite_altitude()) {
        (Some(previous), Some(current)) if current > previous => current - previous,
        _ => 0.0,
    };

    state.distance_meters += increment;
    state.elevation_gain_meters += climb;
    state.path.push(sample);

    Reduction {
        state,
        outcome: SampleOutcome::Accepted,
        distance_delta: increment,
        elevation_delta: climb,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Distance, Haversine, Point};

    /// ~1.1 m of latitude
    const TINY_STEP_DEG: f64 = 0.00001;
    /// ~11 m of latitude
    const STEP_DEG: f64 = 0.0001;

    fn sample(lat: f64, lon: f64) -> LocationSample {
        LocationSample::new(lat, lon, 0)
    }

    fn feed(samples: &[LocationSample]) -> TrackState {
        let config = TrackingConfig::default();
        samples
            .iter()
            .fold(TrackState::default(), |state, s| reduce(state, *s, &config).state)
    }

    #[test]
    fn test_haversine_identity_and_symmetry() {
        let london = sample(51.5074, -0.1278);
        let paris = sample(48.8566, 2.3522);

        assert_eq!(haversine_distance(&london, &london), 0.0);
        let ab = haversine_distance(&london, &paris);
        let ba = haversine_distance(&paris, &london);
        assert!((ab - ba).abs() < 1e-6);
        // ~343.5 km
        assert!((ab / 1000.0 - 343.5).abs() < 1.0, "got {}", ab);
    }

    #[test]
    fn test_haversine_agrees_with_geo() {
        let a = sample(40.7128, -74.0060);
        let b = sample(40.7306, -73.9352);
        let ours = haversine_distance(&a, &b);
        let theirs = Haversine::distance(
            Point::new(a.longitude, a.latitude),
            Point::new(b.longitude, b.latitude),
        );
        // geo uses a slightly different mean radius
        assert!((ours - theirs).abs() / theirs < 1e-5);
    }

    #[test]
    fn test_seed_is_always_accepted() {
        let config = TrackingConfig::default();
        let seed = sample(10.0, 10.0).with_altitude(100.0);
        let result = reduce(TrackState::default(), seed, &config);
        assert_eq!(result.outcome, SampleOutcome::Seed);
        assert!(result.accepted());
        assert_eq!(result.state.path.len(), 1);
        assert_eq!(result.state.distance_meters, 0.0);
        assert_eq!(result.state.elevation_gain_meters, 0.0);
    }

    #[test]
    fn test_jitter_is_dropped() {
        let config = TrackingConfig::default();
        let state = feed(&[sample(10.0, 10.0)]);
        let before = state.clone();

        let result = reduce(state, sample(10.0 + TINY_STEP_DEG, 10.0), &config);
        assert_eq!(result.outcome, SampleOutcome::Jitter);
        assert!(!result.accepted());
        assert_eq!(result.state, before);
    }

    #[test]
    fn test_exactly_threshold_is_dropped() {
        let config = TrackingConfig {
            jitter_threshold_m: haversine_distance(&sample(0.0, 0.0), &sample(STEP_DEG, 0.0)),
            ..TrackingConfig::default()
        };
        let state = feed(&[sample(0.0, 0.0)]);
        let result = reduce(state, sample(STEP_DEG, 0.0), &config);
        assert_eq!(result.outcome, SampleOutcome::Jitter);
    }

    #[test]
    fn test_accepted_adds_exact_haversine() {
        let config = TrackingConfig::default();
        let a = sample(51.5, -0.12);
        let b = sample(51.5 + STEP_DEG, -0.12);
        let state = feed(&[a]);

        let result = reduce(state, b, &config);
        let expected = haversine_distance(&a, &b);
        assert_eq!(result.outcome, SampleOutcome::Accepted);
        assert!((result.state.distance_meters - expected).abs() < 1e-9);
        assert!((result.distance_delta - expected).abs() < 1e-9);
        assert_eq!(result.state.path.last(), Some(&b));
    }

    #[test]
    fn test_jitter_measured_from_last_accepted_point() {
        // Three tiny steps never pass individually, but distance is measured
        // from the seed, so the third one (3.3 m away) is accepted.
        let state = feed(&[
            sample(0.0, 0.0),
            sample(TINY_STEP_DEG, 0.0),
            sample(2.0 * TINY_STEP_DEG, 0.0),
            sample(3.0 * TINY_STEP_DEG, 0.0),
        ]);
        assert_eq!(state.path.len(), 2);
        let expected = haversine_distance(&sample(0.0, 0.0), &sample(3.0 * TINY_STEP_DEG, 0.0));
        assert!((state.distance_meters - expected).abs() < 1e-9);
    }

    #[test]
    fn test_elevation_gain_only() {
        let state = feed(&[
            sample(0.0, 0.0).with_altitude(100.0),
            sample(STEP_DEG, 0.0).with_altitude(110.0),
            sample(2.0 * STEP_DEG, 0.0).with_altitude(95.0),
            sample(3.0 * STEP_DEG, 0.0).with_altitude(100.0),
        ]);
        assert!((state.elevation_gain_meters - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_elevation_needs_both_altitudes() {
        let state = feed(&[
            sample(0.0, 0.0).with_altitude(100.0),
            sample(STEP_DEG, 0.0),
            sample(2.0 * STEP_DEG, 0.0).with_altitude(150.0),
        ]);
        assert_eq!(state.elevation_gain_meters, 0.0);
    }

    #[test]
    fn test_elevation_ignored_on_jitter() {
        let state = feed(&[
            sample(0.0, 0.0).with_altitude(100.0),
            sample(TINY_STEP_DEG, 0.0).with_altitude(140.0),
        ]);
        assert_eq!(state.elevation_gain_meters, 0.0);
        assert_eq!(state.path.len(), 1);
    }

    #[test]
    fn test_elevation_never_decreases() {
        let config = TrackingConfig::default();
        let altitudes = [50.0, 20.0, 80.0, 79.0, 10.0, 200.0, 150.0];
        let mut state = TrackState::default();
        let mut previous_gain = 0.0;
        for (i, alt) in altitudes.iter().enumerate() {
            let s = sample(i as f64 * STEP_DEG, 0.0).with_altitude(*alt);
            state = reduce(state, s, &config).state;
            assert!(state.elevation_gain_meters >= previous_gain);
            previous_gain = state.elevation_gain_meters;
        }
        assert!((previous_gain - (60.0 + 190.0)).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_sample_is_dropped() {
        let config = TrackingConfig::default();
        let result = reduce(TrackState::default(), sample(f64::NAN, 0.0), &config);
        assert_eq!(result.outcome, SampleOutcome::Invalid);
        assert!(result.state.path.is_empty());

        let state = feed(&[sample(0.0, 0.0)]);
        let result = reduce(state, sample(0.0, 200.0), &config);
        assert_eq!(result.outcome, SampleOutcome::Invalid);
        assert_eq!(result.state.path.len(), 1);
    }

    #[test]
    fn test_path_retention_keeps_latest_thousand() {
        let config = TrackingConfig::default();
        let mut state = TrackState::default();
        let mut accepted = Vec::new();
        for i in 0..1500 {
            let s = LocationSample::new(i as f64 * STEP_DEG, 0.0, i as i64);
            let result = reduce(state, s, &config);
            assert!(result.accepted());
            accepted.push(s);
            state = result.state;
        }
        assert_eq!(state.path.len(), 1000);
        assert_eq!(state.path.to_vec(), accepted[500..].to_vec());

        // Totals cover all 1500 points, not just the retained ones
        let expected: f64 = accepted
            .windows(2)
            .map(|w| haversine_distance(&w[0], &w[1]))
            .sum();
        assert!((state.distance_meters - expected).abs() < 1e-6);
    }

    #[test]
    fn test_custom_threshold_and_capacity() {
        let config = TrackingConfig {
            jitter_threshold_m: 20.0,
            path_capacity: 3,
            ..TrackingConfig::default()
        };
        let mut state = TrackState::default();
        for i in 0..10 {
            state = reduce(state, sample(i as f64 * STEP_DEG, 0.0), &config).state;
        }
        // 11 m steps: every other sample clears 20 m from the last accepted one
        assert_eq!(state.path.capacity(), 3);
        assert_eq!(state.path.len(), 3);
        assert_eq!(state.path.last(), Some(&sample(8.0 * STEP_DEG, 0.0)));
    }
}
