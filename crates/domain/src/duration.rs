//! ISO-8601 duration parsing (`PT1H30M`, `PT45S`) and formatting.

use regex::Regex;
use std::sync::OnceLock;

fn pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").expect("static pattern is valid")
    })
}

/// Parses an ISO-8601 duration string into whole seconds.
///
/// Missing components default to zero; a string that doesn't match the
/// pattern at all yields 0 rather than an error (cooking durations are
/// bounded and malformed input is an authoring concern caught at load
/// validation, not a parse-time failure).
pub fn parse_iso_duration(duration: &str) -> i64 {
    let caps = match pattern().captures(duration) {
        Some(c) => c,
        None => return 0,
    };
    let hours: i64 = caps.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    let minutes: i64 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    let seconds: i64 = caps.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    hours * 3600 + minutes * 60 + seconds
}

/// Returns true if `duration` matches the ISO-8601 subset this engine
/// understands and encodes a nonzero span.
pub fn is_parseable_duration(duration: &str) -> bool {
    pattern().is_match(duration)
}

/// Formats seconds back into an ISO-8601 duration string, emitting only
/// the nonzero components. This is the exact inverse of
/// [`parse_iso_duration`] for any nonnegative input.
pub fn format_iso(total_secs: i64) -> String {
    let total_secs = total_secs.max(0);
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours == 0 && minutes == 0 && seconds == 0 {
        return "PT0S".to_string();
    }
    let mut out = String::from("PT");
    if hours > 0 {
        out.push_str(&format!("{hours}H"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}M"));
    }
    if seconds > 0 {
        out.push_str(&format!("{seconds}S"));
    }
    out
}

/// Formats seconds into a short spoken/display phrase, e.g. `"50 minutes"`,
/// `"1h 5m"`, `"45 seconds"`. Used for the `duration_str` a user or
/// assistant reads; not expected to round-trip through the parser.
pub fn format_human(total_secs: i64) -> String {
    let total_secs = total_secs.max(0);
    if total_secs < 60 {
        return format!("{total_secs} seconds");
    }
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours == 0 {
        if seconds == 0 {
            if minutes == 1 {
                "1 minute".to_string()
            } else {
                format!("{minutes} minutes")
            }
        } else {
            format!("{minutes}m {seconds}s")
        }
    } else if minutes == 0 {
        if hours == 1 {
            "1 hour".to_string()
        } else {
            format!("{hours} hours")
        }
    } else {
        format!("{hours}h {minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_components() {
        assert_eq!(parse_iso_duration("PT1H30M15S"), 5415);
    }

    #[test]
    fn parses_minutes_only() {
        assert_eq!(parse_iso_duration("PT45M"), 2700);
    }

    #[test]
    fn parses_seconds_only() {
        assert_eq!(parse_iso_duration("PT30S"), 30);
    }

    #[test]
    fn missing_or_unmatched_yields_zero() {
        assert_eq!(parse_iso_duration(""), 0);
        assert_eq!(parse_iso_duration("bogus"), 0);
        assert_eq!(parse_iso_duration("P1D"), 0);
    }

    #[test]
    fn iso_format_round_trips() {
        for secs in [0, 5, 59, 60, 90, 3000, 3661, 7200] {
            let formatted = format_iso(secs);
            assert_eq!(parse_iso_duration(&formatted), secs, "mismatch for {secs}");
        }
    }

    #[test]
    fn human_format_sub_minute_renders_seconds() {
        assert_eq!(format_human(45), "45 seconds");
    }

    #[test]
    fn human_format_minutes_and_hours() {
        assert_eq!(format_human(3000), "50 minutes");
        assert_eq!(format_human(3661), "1h 1m");
        assert_eq!(format_human(7200), "2 hours");
    }
}
