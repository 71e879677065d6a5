//! Human-readable time formatting for file descriptions and logs.
//!
//! Recording spans run from minutes to multiple days, while inter-ensemble
//! deltas are usually sub-second. The two helpers here pick a display shape
//! for each magnitude so every module renders times the same way.

use std::time::Duration;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 3_600;
const SECS_PER_DAY: u64 = 86_400;

/// Format a duration in whole seconds as `H:MM:SS`, or `Dd-H:MM:SS` once it
/// crosses a day.
///
/// # Examples
///
/// ```
/// use exportr_common::human_time::format_hms;
///
/// assert_eq!(format_hms(61), "0:01:01");
/// assert_eq!(format_hms(7_500), "2:05:00");
/// assert_eq!(format_hms(90_000), "1d-1:00:00");
/// ```
pub fn format_hms(total_secs: u64) -> String {
    let days = total_secs / SECS_PER_DAY;
    let hours = (total_secs % SECS_PER_DAY) / SECS_PER_HOUR;
    let mins = (total_secs % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let secs = total_secs % SECS_PER_MINUTE;

    if days > 0 {
        format!("{}d-{}:{:02}:{:02}", days, hours, mins, secs)
    } else {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    }
}

/// Format an inter-ensemble delta. Whole seconds render as `Ns`; anything
/// with a fractional part keeps two decimals.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use exportr_common::human_time::format_delta;
///
/// assert_eq!(format_delta(Duration::from_secs(2)), "2s");
/// assert_eq!(format_delta(Duration::from_millis(250)), "0.25s");
/// ```
pub fn format_delta(delta: Duration) -> String {
    if delta.subsec_nanos() == 0 {
        format!("{}s", delta.as_secs())
    } else {
        format!("{:.2}s", delta.as_secs_f64())
    }
}
