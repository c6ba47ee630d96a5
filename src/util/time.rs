const INTERVALS: [(&str, i64); 6] = [
    ("year", 31_536_000),
    ("month", 2_592_000),
    ("day", 86_400),
    ("hour", 3_600),
    ("minute", 60),
    ("second", 1),
];

/// Format `timestamp` relative to `now` (both Unix seconds): "3 hours ago".
///
/// Future timestamps and anything under a second read "just now".
pub fn relative_time(timestamp: i64, now: i64) -> String {
    let elapsed = now.saturating_sub(timestamp);
    for (label, secs) in INTERVALS {
        let count = elapsed / secs;
        if count >= 1 {
            let plural = if count == 1 { "" } else { "s" };
            return format!("{count} {label}{plural} ago");
        }
    }
    "just now".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_time_units() {
        let now = 1_700_000_000;
        assert_eq!(relative_time(now, now), "just now");
        assert_eq!(relative_time(now + 50, now), "just now");
        assert_eq!(relative_time(now - 1, now), "1 second ago");
        assert_eq!(relative_time(now - 59, now), "59 seconds ago");
        assert_eq!(relative_time(now - 60, now), "1 minute ago");
        assert_eq!(relative_time(now - 3 * 3_600, now), "3 hours ago");
        assert_eq!(relative_time(now - 86_400, now), "1 day ago");
        assert_eq!(relative_time(now - 40 * 86_400, now), "1 month ago");
        assert_eq!(relative_time(now - 2 * 31_536_000, now), "2 years ago");
    }
}
