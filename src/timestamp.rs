// src/timestamp.rs
//
// Frame timestamps arrive as free-form strings (OCR of the camera overlay or
// whatever the caller supplies). Everything downstream stores them in the
// canonical `YYYY-MM-DD HH:MM:SS` form; duration math parses them back here.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use tracing::debug;

pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    // Month-first wins when both readings are valid
    "%m-%d-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

/// Parse a timestamp string into an absolute time.
///
/// Accepts RFC 3339, the formats in `DATETIME_FORMATS`, the camera overlay form
/// `MM-DD-YYYY Weekday HH:MM:SS`, and bare `HH:MM:SS` (anchored to 1970-01-01,
/// so only differences between two bare times are meaningful).
///
/// Overlay text is usually OCR output with noise around it (camera ids, `REC`),
/// so a `date [weekday] time` run of tokens is searched for anywhere in the text.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }
    let joined = tokens.join(" ");

    if let Ok(dt) = DateTime::parse_from_rfc3339(&joined) {
        return Some(dt.naive_utc());
    }

    if let Some(dt) = find_date_time_window(&tokens) {
        return Some(dt);
    }

    if let Some(dt) = parse_with_formats(&joined) {
        return Some(dt);
    }

    if tokens.len() == 1 {
        if let Ok(time) = NaiveTime::parse_from_str(tokens[0], "%H:%M:%S") {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
            return Some(NaiveDateTime::new(epoch, time));
        }
    }

    None
}

/// First `DATE TIME` or `DATE WEEKDAY TIME` run that parses, scanning left to right.
fn find_date_time_window(tokens: &[&str]) -> Option<NaiveDateTime> {
    tokens.iter().enumerate().find_map(|(i, date)| {
        if !looks_like_date(date) {
            return None;
        }
        let time = match (tokens.get(i + 1), tokens.get(i + 2)) {
            (Some(next), _) if looks_like_time(next) => next,
            (Some(weekday), Some(next))
                if weekday.chars().all(|c| c.is_ascii_alphabetic()) && looks_like_time(next) =>
            {
                next
            }
            _ => return None,
        };
        parse_with_formats(&format!("{} {}", date, time))
    })
}

fn looks_like_date(token: &str) -> bool {
    let parts: Vec<&str> = token.split(['-', '/']).collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.len() <= 4 && p.chars().all(|c| c.is_ascii_digit()))
}

// H:MM:SS or HH:MM:SS
fn looks_like_time(token: &str) -> bool {
    let parts: Vec<&str> = token.split(':').collect();
    parts.len() == 3
        && (1..=2).contains(&parts[0].len())
        && parts[1].len() == 2
        && parts[2].len() == 2
        && parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit()))
}

fn parse_with_formats(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

pub fn normalize(raw: &str) -> Option<String> {
    parse_timestamp(raw).map(|dt| dt.format(CANONICAL_FORMAT).to_string())
}

/// Minutes from `entry` to `exit`, or `None` if either side is unparseable.
pub fn minutes_between(entry: &str, exit: &str) -> Option<f64> {
    let entry = parse_timestamp(entry)?;
    let exit = parse_timestamp(exit)?;
    Some((exit - entry).num_milliseconds() as f64 / 60_000.0)
}

pub fn now_string() -> String {
    Local::now().format(CANONICAL_FORMAT).to_string()
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// FRAME CLOCK
// ============================================================================

/// Resolves a timestamp for every frame and remembers the session span.
///
/// Fallback order when a frame's own timestamp is missing or unreadable:
/// last good timestamp, then local wall-clock time.
#[derive(Debug, Default)]
pub struct FrameClock {
    last: Option<String>,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimestampSpan {
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: f64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, raw: Option<&str>) -> String {
        if let Some(dt) = raw.and_then(parse_timestamp) {
            let canonical = dt.format(CANONICAL_FORMAT).to_string();
            self.start.get_or_insert(dt);
            self.end = Some(dt);
            self.last = Some(canonical.clone());
            return canonical;
        }

        if let Some(raw) = raw {
            debug!("Unreadable frame timestamp {:?}, using fallback", raw);
        }
        self.last.clone().unwrap_or_else(now_string)
    }

    pub fn span(&self) -> TimestampSpan {
        let fmt = |dt: Option<NaiveDateTime>| {
            dt.map(|d| d.format(CANONICAL_FORMAT).to_string())
                .unwrap_or_else(|| "N/A".to_string())
        };
        let duration_minutes = match (self.start, self.end) {
            (Some(start), Some(end)) => {
                round2(((end - start).num_milliseconds() as f64 / 60_000.0).max(0.0))
            }
            _ => 0.0,
        };

        TimestampSpan {
            start_time: fmt(self.start),
            end_time: fmt(self.end),
            duration_minutes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_and_variants() {
        let expected = "2024-05-01 10:00:00";
        assert_eq!(normalize("2024-05-01 10:00:00").as_deref(), Some(expected));
        assert_eq!(normalize("2024-05-01T10:00:00").as_deref(), Some(expected));
        assert_eq!(normalize("05-01-2024 10:00:00").as_deref(), Some(expected));
        assert_eq!(normalize("2024-05-01T10:00:00Z").as_deref(), Some(expected));
    }

    #[test]
    fn test_parse_camera_overlay_with_weekday() {
        assert_eq!(
            normalize("05-01-2024  Wednesday 10:15:30").as_deref(),
            Some("2024-05-01 10:15:30")
        );
    }

    #[test]
    fn test_parse_overlay_inside_noise() {
        let expected = Some("2024-05-01 10:15:30");
        assert_eq!(
            normalize("CAM1 05-01-2024 Wednesday 10:15:30").as_deref(),
            expected
        );
        assert_eq!(normalize("05-01-2024 Wed 10:15:30 REC").as_deref(), expected);
        assert_eq!(normalize("REC 2024-05-01 10:15:30 CAM-2").as_deref(), expected);
        assert_eq!(normalize("gate 05/01/2024 9:05:00").as_deref(), Some("2024-05-01 09:05:00"));
        // A date with no time next to it is not a timestamp
        assert!(parse_timestamp("CAM1 05-01-2024 REC").is_none());
    }

    #[test]
    fn test_clock_keeps_advancing_on_noisy_overlay() {
        let mut clock = FrameClock::new();
        clock.resolve(Some("CAM1 05-01-2024 Wednesday 10:00:00"));
        let exit = clock.resolve(Some("CAM1 05-01-2024 Wednesday 10:30:00 REC"));
        assert_eq!(exit, "2024-05-01 10:30:00");
        assert_eq!(clock.span().duration_minutes, 30.0);
    }

    #[test]
    fn test_day_first_fallback() {
        // 25 cannot be a month
        assert_eq!(
            normalize("25-12-2024 08:00:00").as_deref(),
            Some("2024-12-25 08:00:00")
        );
    }

    #[test]
    fn test_unparseable_returns_none() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("frame 12").is_none());
        assert!(minutes_between("garbage", "2024-05-01 10:00:00").is_none());
    }

    #[test]
    fn test_minutes_between() {
        let m = minutes_between("2024-05-01 10:00:00", "2024-05-01 10:30:00").unwrap();
        assert_eq!(m, 30.0);
        let bare = minutes_between("10:00:00", "10:45:30").unwrap();
        assert_eq!(bare, 45.5);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(13.333333), 13.33);
        assert_eq!(round2(2.005001), 2.01);
    }

    #[test]
    fn test_clock_falls_back_to_last_good_timestamp() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.resolve(Some("2024-05-01 10:00:00")), "2024-05-01 10:00:00");
        assert_eq!(clock.resolve(Some("???")), "2024-05-01 10:00:00");
        assert_eq!(clock.resolve(None), "2024-05-01 10:00:00");
        clock.resolve(Some("2024-05-01 11:30:00"));

        let span = clock.span();
        assert_eq!(span.start_time, "2024-05-01 10:00:00");
        assert_eq!(span.end_time, "2024-05-01 11:30:00");
        assert_eq!(span.duration_minutes, 90.0);
    }

    #[test]
    fn test_empty_clock_span() {
        let clock = FrameClock::new();
        let span = clock.span();
        assert_eq!(span.start_time, "N/A");
        assert_eq!(span.duration_minutes, 0.0);
    }
}
