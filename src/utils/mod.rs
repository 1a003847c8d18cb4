const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Formats a duration in seconds as `M:SS`, or `N/A` when unknown.
pub fn format_duration(seconds: Option<f64>) -> String {
    match seconds {
        Some(secs) if secs.is_finite() && secs >= 0.0 => {
            let total = secs.floor() as u64;
            format!("{}:{:02}", total / 60, total % 60)
        }
        _ => "N/A".to_string(),
    }
}

/// Formats a byte count as megabytes with one decimal, or `Unknown`.
pub fn format_filesize(bytes: Option<f64>) -> String {
    match bytes {
        Some(b) if b.is_finite() && b > 0.0 => format!("{:.1} MB", b / BYTES_PER_MB),
        _ => "Unknown".to_string(),
    }
}
