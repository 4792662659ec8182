//! Step detection from accelerometer magnitude peaks.
//!
//! The detector looks at the magnitude of the raw acceleration vector
//! (gravity included, so a phone at rest reads ~9.8). A step is a rising
//! crossing of `threshold` while armed, rate-limited by a cooldown. After a
//! step the detector stays at-peak until the magnitude falls below the
//! release threshold, which keeps one long peak from counting twice.
//!
//! ```text
//!            m > threshold, rising, cooldown elapsed  -> emit
//!   Armed  ------------------------------------------>  AtPeak
//!          <------------------------------------------
//!                   m < threshold - hysteresis
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

use crate::StepConfig;

/// One accelerometer reading in m/s².
///
/// Axes are optional because platform motion events can arrive with missing
/// components; such samples are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    /// Unix timestamp in milliseconds
    pub timestamp_ms: i64,
}

impl MotionSample {
    pub fn new(x: f64, y: f64, z: f64, timestamp_ms: i64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
            timestamp_ms,
        }
    }

    /// Euclidean magnitude, or `None` if any axis is missing or non-finite.
    pub fn magnitude(&self) -> Option<f64> {
        let (x, y, z) = (self.x?, self.y?, self.z?);
        let m = (x * x + y * y + z * z).sqrt();
        m.is_finite().then_some(m)
    }
}

/// A detected step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepEvent {
    pub timestamp_ms: i64,
    /// Magnitude of the sample that triggered the step
    pub magnitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorPhase {
    /// Waiting for the next peak
    Armed,
    /// A step was emitted and the magnitude hasn't dropped back yet
    AtPeak,
}

/// Peak-detecting step counter with hysteresis and cooldown.
#[derive(Debug, Clone)]
pub struct StepDetector {
    config: StepConfig,
    last_magnitude: f64,
    is_at_peak: bool,
    last_event_ms: Option<i64>,
    emitted: u64,
}

impl StepDetector {
    pub fn new(config: StepConfig) -> Self {
        Self {
            config,
            last_magnitude: 0.0,
            is_at_peak: false,
            last_event_ms: None,
            emitted: 0,
        }
    }

    /// Process a single sample. Returns a step event if one was detected.
    pub fn process(&mut self, sample: &MotionSample) -> Option<StepEvent> {
        let Some(magnitude) = sample.magnitude() else {
            debug!("[Steps] Ignoring sample with missing axis at {}", sample.timestamp_ms);
            return None;
        };

        let mut event = None;
        let rising = magnitude > self.last_magnitude;
        if magnitude > self.config.threshold && rising && !self.is_at_peak {
            let cooled_down = self.last_event_ms.is_none_or(|last| {
                sample.timestamp_ms.saturating_sub(last) > self.config.cooldown_ms
            });
            if cooled_down {
                self.last_event_ms = Some(sample.timestamp_ms);
                self.is_at_peak = true;
                self.emitted += 1;
                event = Some(StepEvent {
                    timestamp_ms: sample.timestamp_ms,
                    magnitude,
                });
            }
        } else if magnitude < self.config.release_threshold() {
            self.is_at_peak = false;
        }

        self.last_magnitude = magnitude;
        event
    }

    /// Process a batch of samples and return all detected steps.
    pub fn process_batch(&mut self, samples: &[MotionSample]) -> Vec<StepEvent> {
        samples.iter().filter_map(|s| self.process(s)).collect()
    }

    pub fn phase(&self) -> DetectorPhase {
        if self.is_at_peak {
            DetectorPhase::AtPeak
        } else {
            DetectorPhase::Armed
        }
    }

    /// Steps emitted since creation or the last reset.
    pub fn total_steps(&self) -> u64 {
        self.emitted
    }

    pub fn config(&self) -> &StepConfig {
        &self.config
    }

    /// Reset the detector state, keeping the configuration.
    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }
}

impl Default for StepDetector {
    fn default() -> Self {
        Self::new(StepConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(magnitudes: &[f64], interval_ms: i64) -> Vec<MotionSample> {
        magnitudes
            .iter()
            .enumerate()
            .map(|(i, m)| MotionSample::new(*m, 0.0, 0.0, i as i64 * interval_ms))
            .collect()
    }

    const PEAKS: [f64; 6] = [0.0, 13.0, 0.0, 13.0, 0.0, 13.0];

    #[test]
    fn test_magnitude() {
        let sample = MotionSample::new(3.0, 4.0, 12.0, 0);
        assert_eq!(sample.magnitude(), Some(13.0));

        let missing = MotionSample {
            y: None,
            ..sample
        };
        assert_eq!(missing.magnitude(), None);

        let nan = MotionSample::new(f64::NAN, 0.0, 0.0, 0);
        assert_eq!(nan.magnitude(), None);
    }

    #[test]
    fn test_fast_peaks_are_rate_limited() {
        let mut detector = StepDetector::default();
        let steps = detector.process_batch(&series(&PEAKS, 50));
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].timestamp_ms, 50);
    }

    #[test]
    fn test_spaced_peaks_all_count() {
        let mut detector = StepDetector::default();
        let steps = detector.process_batch(&series(&PEAKS, 300));
        assert_eq!(steps.len(), 3);
        assert_eq!(detector.total_steps(), 3);
    }

    #[test]
    fn test_cooldown_boundary_is_exclusive() {
        // Peaks exactly 280 ms apart: second is suppressed
        let samples = [
            MotionSample::new(13.0, 0.0, 0.0, 0),
            MotionSample::new(0.0, 0.0, 0.0, 140),
            MotionSample::new(13.0, 0.0, 0.0, 280),
            MotionSample::new(0.0, 0.0, 0.0, 420),
            MotionSample::new(13.0, 0.0, 0.0, 561),
        ];
        let mut detector = StepDetector::default();
        let steps = detector.process_batch(&samples);
        let times: Vec<i64> = steps.iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(times, vec![0, 561]);
    }

    #[test]
    fn test_no_two_events_within_cooldown() {
        let magnitudes: Vec<f64> = (0..400)
            .map(|i| if i % 3 == 0 { 14.0 } else { 9.0 + (i % 5) as f64 * 0.1 })
            .collect();
        let mut detector = StepDetector::default();
        let steps = detector.process_batch(&series(&magnitudes, 40));
        assert!(steps.len() > 1);
        assert!(steps
            .windows(2)
            .all(|w| w[1].timestamp_ms - w[0].timestamp_ms > 280));
    }

    #[test]
    fn test_sustained_peak_counts_once() {
        let mut detector = StepDetector::default();
        let steps = detector.process_batch(&series(&[13.0, 14.0, 15.0, 16.0, 17.0], 500));
        assert_eq!(steps.len(), 1);
        assert_eq!(detector.phase(), DetectorPhase::AtPeak);
    }

    #[test]
    fn test_hysteresis_band_does_not_rearm() {
        // Dipping to 11.5 stays inside the band, so the next rise is ignored
        let mut detector = StepDetector::default();
        let steps = detector.process_batch(&series(&[13.0, 11.5, 13.0, 10.5, 13.0], 500));
        let times: Vec<i64> = steps.iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(times, vec![0, 2000]);
    }

    #[test]
    fn test_peak_must_be_rising() {
        let mut detector = StepDetector::default();
        assert!(detector.process(&MotionSample::new(13.0, 0.0, 0.0, 0)).is_some());
        detector.process(&MotionSample::new(10.0, 0.0, 0.0, 100));
        // Suppressed by cooldown, so the detector stays armed
        assert!(detector.process(&MotionSample::new(20.0, 0.0, 0.0, 200)).is_none());
        assert_eq!(detector.phase(), DetectorPhase::Armed);
        // Above threshold but falling from 20
        assert!(detector.process(&MotionSample::new(15.0, 0.0, 0.0, 600)).is_none());
        assert!(detector.process(&MotionSample::new(16.0, 0.0, 0.0, 700)).is_some());
        assert_eq!(detector.total_steps(), 2);
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let mut detector = StepDetector::default();
        assert!(detector.process(&MotionSample::new(13.0, 0.0, 0.0, 1000)).is_some());
        detector.process(&MotionSample::new(0.0, 0.0, 0.0, 1100));
        assert!(detector.process(&MotionSample::new(13.0, 0.0, 0.0, i64::MIN)).is_none());
        detector.process(&MotionSample::new(0.0, 0.0, 0.0, 1200));
        assert!(detector.process(&MotionSample::new(13.0, 0.0, 0.0, i64::MAX)).is_some());
        assert_eq!(detector.total_steps(), 2);
    }

    #[test]
    fn test_missing_axis_leaves_state_untouched() {
        let mut detector = StepDetector::default();
        detector.process(&MotionSample::new(13.0, 0.0, 0.0, 0));
        let gap = MotionSample {
            x: None,
            y: Some(0.0),
            z: Some(0.0),
            timestamp_ms: 100,
        };
        assert!(detector.process(&gap).is_none());
        assert_eq!(detector.phase(), DetectorPhase::AtPeak);
    }

    #[test]
    fn test_reset() {
        let mut detector = StepDetector::default();
        detector.process_batch(&series(&PEAKS, 300));
        detector.reset();
        assert_eq!(detector.total_steps(), 0);
        assert_eq!(detector.phase(), DetectorPhase::Armed);
        assert!(detector.process(&MotionSample::new(13.0, 0.0, 0.0, 1)).is_some());
    }
}
