//! Human-readable playback time formatting
//!
//! Clock strings (`MM:SS`) and the text progress bar shown in "now playing"
//! panels. Unknown or zero durations are rendered as `LIVE`.

/// Label used for streams without a known duration
pub const LIVE: &str = "LIVE";

/// Default number of cells in a progress bar
pub const DEFAULT_BAR_LENGTH: usize = 20;

const BAR_CELL: &str = "▬";
const BAR_KNOB: &str = "🔘";

/// Format seconds as `MM:SS`; minutes are not wrapped into hours
///
/// ```
/// use roomq_common::human_time::format_clock;
///
/// assert_eq!(format_clock(0), "00:00");
/// assert_eq!(format_clock(75), "01:15");
/// assert_eq!(format_clock(6000), "100:00");
/// ```
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Format a total duration, `LIVE` when unknown
pub fn format_total(total_secs: Option<u64>) -> String {
    match known_total(total_secs) {
        Some(total) => format_clock(total),
        None => LIVE.to_string(),
    }
}

/// `elapsed / total` line, e.g. `01:15 / 03:20`
pub fn progress_clock(elapsed_secs: u64, total_secs: Option<u64>) -> String {
    format!("{} / {}", format_clock(elapsed_secs), format_total(total_secs))
}

/// Text progress bar with a knob at the elapsed fraction
///
/// The knob never leaves the bar, even when `elapsed` overshoots `total`.
///
/// ```
/// use roomq_common::human_time::progress_bar;
///
/// assert_eq!(progress_bar(0, Some(100), 5), "🔘▬▬▬▬");
/// assert_eq!(progress_bar(50, Some(100), 5), "▬▬🔘▬▬");
/// assert_eq!(progress_bar(10, None, 5), "LIVE");
/// ```
pub fn progress_bar(elapsed_secs: u64, total_secs: Option<u64>, length: usize) -> String {
    let Some(total) = known_total(total_secs) else {
        return LIVE.to_string();
    };
    let length = length.max(1);

    let filled = (length as u64).saturating_mul(elapsed_secs) / total;
    let knob = (filled as usize).min(length - 1);

    let mut bar = String::with_capacity(length * BAR_CELL.len() + BAR_KNOB.len());
    bar.push_str(&BAR_CELL.repeat(knob));
    bar.push_str(BAR_KNOB);
    bar.push_str(&BAR_CELL.repeat(length - knob - 1));
    bar
}

fn known_total(total_secs: Option<u64>) -> Option<u64> {
    total_secs.filter(|total| *total > 0)
}
