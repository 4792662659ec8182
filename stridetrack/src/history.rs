//! Recent-activity summary for the history view.

use serde::Serialize;

use crate::RunRecord;

/// Number of recent runs the summary covers.
pub const MOMENTUM_WINDOW: usize = 7;

/// One bar of the momentum chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MomentumBar {
    pub run_id: String,
    pub start_time_ms: i64,
    pub distance_meters: f64,
    /// Bar height relative to the longest run in the window, 0..=1
    pub height_ratio: f64,
}

/// Summary of the most recent non-rest runs, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Momentum {
    pub bars: Vec<MomentumBar>,
    pub average_distance_meters: f64,
    pub record_distance_meters: f64,
}

/// Summarize the last [`MOMENTUM_WINDOW`] runs of a most-recent-first
/// history, skipping rest days. Returns `None` with fewer than two runs.
pub fn momentum<'a, I>(history: I) -> Option<Momentum>
where
    I: IntoIterator<Item = &'a RunRecord>,
{
    let mut recent: Vec<&RunRecord> = history
        .into_iter()
        .filter(|r| !r.is_rest_day)
        .take(MOMENTUM_WINDOW)
        .collect();
    if recent.len() < 2 {
        return None;
    }
    recent.reverse();

    let record = recent
        .iter()
        .map(|r| r.distance_meters)
        .fold(0.0_f64, f64::max);
    let scale = if record > 0.0 { record } else { 1.0 };
    let total: f64 = recent.iter().map(|r| r.distance_meters).sum();

    let bars = recent
        .iter()
        .map(|r| MomentumBar {
            run_id: r.id.clone(),
            start_time_ms: r.start_time_ms,
            distance_meters: r.distance_meters,
            height_ratio: r.distance_meters / scale,
        })
        .collect();

    Some(Momentum {
        bars,
        average_distance_meters: total / recent.len() as f64,
        record_distance_meters: record,
    })
}
