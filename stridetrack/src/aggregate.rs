//! Folding completed runs into lifetime statistics.

use log::{debug, info};

use crate::{LifetimeStats, RunRecord};

/// Whether a run with this id is already in the history.
pub fn is_archived(stats: &LifetimeStats, run_id: &str) -> bool {
    stats.history.iter().any(|r| r.id == run_id)
}

/// Fold a completed run into the lifetime statistics.
///
/// Idempotent on the run id: archiving an id that is already in the history
/// returns the stats untouched. Otherwise the run is prepended to the
/// history, its distance is added to the total and to the shoe it references
/// (if that shoe still exists), and the step total grows by its steps. Rest
/// days count towards distance and steps but not towards `total_runs`.
///
/// No plausibility checks are made on the run's values.
pub fn archive(mut stats: LifetimeStats, run: RunRecord) -> LifetimeStats {
    if is_archived(&stats, &run.id) {
        debug!("[Aggregate] Run {} already archived", run.id);
        return stats;
    }

    if let Some(shoe_id) = run.shoe_id.as_deref() {
        if let Some(shoe) = stats.shoes.iter_mut().find(|s| s.id == shoe_id) {
            shoe.mileage_meters += run.distance_meters;
        }
    }

    stats.total_distance_meters += run.distance_meters;
    if !run.is_rest_day {
        stats.total_runs += 1;
    }
    stats.total_steps += run.steps;

    info!(
        "[Aggregate] Archived {} ({:.0}m, {} steps{})",
        run.id,
        run.distance_meters,
        run.steps,
        if run.is_rest_day { ", rest day" } else { "" }
    );
    stats.history.push_front(run);
    stats
}
