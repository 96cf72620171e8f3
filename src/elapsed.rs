use std::time::Duration;

/// Format an elapsed duration as `HH:MM:SS`, truncating fractional seconds.
///
/// Hours keep growing past 99 rather than wrapping.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let hours = total / 3600;
    let minutes = (total / 60) % 60;
    let seconds = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero() {
        assert_eq!(format_elapsed(Duration::ZERO), "00:00:00");
    }

    #[test]
    fn truncates_fraction() {
        assert_eq!(format_elapsed(Duration::from_secs_f64(125.4)), "00:02:05");
        assert_eq!(format_elapsed(Duration::from_millis(999)), "00:00:00");
    }

    #[test]
    fn minutes_wrap_into_hours() {
        assert_eq!(format_elapsed(Duration::from_secs(3599)), "00:59:59");
        assert_eq!(format_elapsed(Duration::from_secs(3600)), "01:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(3 * 3600 + 61)), "03:01:01");
    }

    #[test]
    fn hours_do_not_wrap() {
        assert_eq!(format_elapsed(Duration::from_secs(100 * 3600)), "100:00:00");
    }
}
