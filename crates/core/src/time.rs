// Time formatting and progress helpers for the presentation layer

/// Format a position as `minutes:seconds` with zero-padded seconds.
///
/// Non-finite input yields `"0:00"` instead of leaking `NaN` into the view.
/// Negative values are treated as zero.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }

    let whole = seconds.floor() as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}

/// Ratio of `position` to `duration` for progress bars.
///
/// An unknown or zero duration is replaced by 1 so the ratio never divides by zero.
pub fn progress_ratio(position_seconds: f64, duration_seconds: Option<f64>) -> f64 {
    let duration = match duration_seconds {
        Some(d) if d.is_finite() && d > 0.0 => d,
        _ => 1.0,
    };
    let position = if position_seconds.is_finite() {
        position_seconds
    } else {
        0.0
    };
    position / duration
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(125.0), "2:05");
        assert_eq!(format_time(59.0), "0:59");
        assert_eq!(format_time(59.9), "0:59");
        assert_eq!(format_time(60.0), "1:00");
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(3725.0), "62:05");
    }

    #[test]
    fn test_format_time_invalid_input() {
        assert_eq!(format_time(f64::NAN), "0:00");
        assert_eq!(format_time(f64::INFINITY), "0:00");
        assert_eq!(format_time(f64::NEG_INFINITY), "0:00");
        assert_eq!(format_time(-5.0), "0:00");
    }

    #[test]
    fn test_progress_ratio_guards_zero_duration() {
        assert_eq!(progress_ratio(30.0, Some(120.0)), 0.25);
        assert_eq!(progress_ratio(0.0, Some(0.0)), 0.0);
        assert_eq!(progress_ratio(0.5, None), 0.5);
        assert_eq!(progress_ratio(f64::NAN, Some(10.0)), 0.0);
    }
}
