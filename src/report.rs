//! Console reporting helpers.

/// Format a millisecond duration for humans.
///
/// Sub-second durations render as `123ms`; longer ones as `2h 3m 4s`,
/// keeping zero minutes/seconds once a larger component exists.
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        return format!("{ms}ms");
    }
    let seconds = ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    if hours > 0 {
        return format!("{hours}h {}m {}s", minutes % 60, seconds % 60);
    }
    if minutes > 0 {
        return format!("{minutes}m {}s", seconds % 60);
    }
    format!("{seconds}s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_millis() {
        assert_eq!(format_duration(0), "0ms");
        assert_eq!(format_duration(999), "999ms");
    }

    #[test]
    fn test_format_duration_seconds() {
        assert_eq!(format_duration(1000), "1s");
        assert_eq!(format_duration(59_999), "59s");
    }

    #[test]
    fn test_format_duration_minutes() {
        assert_eq!(format_duration(60_000), "1m 0s");
        assert_eq!(format_duration(61_000), "1m 1s");
        assert_eq!(format_duration(123_000), "2m 3s");
    }

    #[test]
    fn test_format_duration_hours() {
        assert_eq!(format_duration(3_600_000), "1h 0m 0s");
        assert_eq!(format_duration(7_384_000), "2h 3m 4s");
    }
}
