//! Pace, time and distance formatting for the live readouts.

/// Shown in place of a pace when there is nothing to divide by.
pub const NO_PACE: &str = "--:--";

/// Paces at or above this many minutes per km render as [`NO_PACE`].
const MAX_PACE_MINUTES: f64 = u32::MAX as f64;

/// Format the average pace as `M:SS` per kilometer.
///
/// Minutes are floored; the remaining fraction is rounded to whole seconds
/// and carried into the minutes when it rounds up to 60. Returns
/// [`NO_PACE`] when either the distance or the duration is zero, when the
/// distance isn't a positive finite number, or when the pace is too slow to
/// display.
///
/// # Example
/// ```
/// use stridetrack::format_pace;
/// assert_eq!(format_pace(330, 1000.0), "5:30");
/// assert_eq!(format_pace(0, 1000.0), "--:--");
/// ```
pub fn format_pace(seconds: u64, meters: f64) -> String {
    if seconds == 0 || !(meters > 0.0) || !meters.is_finite() {
        return NO_PACE.to_string();
    }

    let minutes_per_km = (seconds as f64 / 60.0) / (meters / 1000.0);
    if !minutes_per_km.is_finite() || minutes_per_km >= MAX_PACE_MINUTES {
        return NO_PACE.to_string();
    }
    let mut mins = minutes_per_km.floor() as u64;
    let mut secs = ((minutes_per_km - mins as f64) * 60.0).round() as u64;
    if secs >= 60 {
        mins += 1;
        secs -= 60;
    }
    format!("{}:{:02}", mins, secs)
}

/// Format elapsed seconds as `H:MM:SS`, dropping the hour when it is zero.
pub fn format_time(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Meters as kilometers with a fixed number of decimals.
pub fn format_km(meters: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, meters / 1000.0)
}

/// Convert a speed in m/s to km/h.
pub fn speed_kmh(meters_per_second: f64) -> f64 {
    meters_per_second * 3.6
}
