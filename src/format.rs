/// `M:SS.mmm`; "N/A" for missing or non-finite values.
pub fn format_lap_time(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds.filter(|s| s.is_finite()) else {
        return "N/A".to_string();
    };
    let sign = if seconds < 0.0 { "-" } else { "" };
    // whole milliseconds first so 59.9996 carries into the next minute
    let total_ms = (seconds.abs() * 1000.0).round() as u64;
    let minutes = total_ms / 60_000;
    let ms = total_ms % 60_000;
    format!("{}{}:{:02}.{:03}", sign, minutes, ms / 1000, ms % 1000)
}

/// Inverse of [`format_lap_time`]. Accepts `M:SS.mmm` or plain seconds.
pub fn parse_lap_time(text: &str) -> Option<f64> {
    let text = text.trim();
    let (sign, body) = match text.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, text),
    };
    let seconds = match body.split_once(':') {
        Some((m, s)) => {
            let minutes: u64 = m.parse().ok()?;
            let secs: f64 = s.parse().ok()?;
            if !(0.0..60.0).contains(&secs) {
                return None;
            }
            minutes as f64 * 60.0 + secs
        }
        None => body.parse().ok()?,
    };
    seconds.is_finite().then_some(sign * seconds)
}

/// Pace band relative to the best lap.
pub fn lap_pace_category(lap_time: f64, best_time: f64) -> &'static str {
    if lap_time == best_time {
        "Best"
    } else if lap_time <= best_time * 1.02 {
        "Fast"
    } else if lap_time <= best_time * 1.05 {
        "Medium"
    } else {
        "Slow"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        assert_eq!(format_lap_time(Some(92.345)), "1:32.345");
        assert_eq!(format_lap_time(Some(5.0)), "0:05.000");
        assert_eq!(format_lap_time(Some(59.9996)), "1:00.000");
        assert_eq!(format_lap_time(Some(-1.5)), "-0:01.500");
        assert_eq!(format_lap_time(None), "N/A");
        assert_eq!(format_lap_time(Some(f64::NAN)), "N/A");
    }

    #[test]
    fn test_round_trip_to_the_millisecond() {
        let mut t = 0.0;
        while t < 3600.0 {
            let back = parse_lap_time(&format_lap_time(Some(t))).unwrap();
            assert!((back - t).abs() <= 0.0005 + 1e-9, "{t} -> {back}");
            t += 7.919;
        }
        assert!((parse_lap_time("1:32.345").unwrap() - 92.345).abs() < 1e-9);
        assert_eq!(parse_lap_time("88.1"), Some(88.1));
        assert_eq!(parse_lap_time("1:75.0"), None);
        assert_eq!(parse_lap_time("abc"), None);
    }

    #[test]
    fn test_pace_category() {
        assert_eq!(lap_pace_category(90.0, 90.0), "Best");
        assert_eq!(lap_pace_category(91.5, 90.0), "Fast");
        assert_eq!(lap_pace_category(94.0, 90.0), "Medium");
        assert_eq!(lap_pace_category(95.0, 90.0), "Slow");
    }
}
