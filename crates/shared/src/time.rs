//! C1: timezone-aware datetime helpers shared by the intent extractor,
//! slot generator and calendar model.

use chrono::{DateTime, Datelike, Days, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

pub const DEFAULT_TIME_ZONE: &str = "UTC";

/// The three-letter weekday abbreviations used by advising-day sets,
/// matching the vocabulary used for `advisingWeekdays`.
pub const WEEKDAY_ABBREVIATIONS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// A half-open `[start, end)` UTC interval. `end` is required to be
/// strictly greater than `start` by every constructor in this module;
/// callers that build intervals from untrusted input should use
/// [`TimeInterval::new`] and propagate `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (end > start).then_some(Self { start, end })
    }

    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &TimeInterval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

pub fn normalize_time_zone(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    trimmed.parse::<Tz>().ok().map(|tz| tz.name().to_string())
}

pub fn parse_time_zone_or_default(value: &str) -> Tz {
    normalize_time_zone(value)
        .and_then(|normalized| normalized.parse::<Tz>().ok())
        .unwrap_or(chrono_tz::UTC)
}

pub fn resolve_local_datetime(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(value) => Some(value),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => None,
    }
}

pub fn local_day_bounds_utc(
    local_date: NaiveDate,
    time_zone: &str,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start_of_day = local_date.and_hms_opt(0, 0, 0)?;
    let next_day = local_date.checked_add_days(Days::new(1))?;
    let start_of_next_day = next_day.and_hms_opt(0, 0, 0)?;

    let tz = parse_time_zone_or_default(time_zone);
    let local_start = resolve_local_datetime(&tz, start_of_day)?;
    let local_end = resolve_local_datetime(&tz, start_of_next_day)?;

    Some((
        local_start.with_timezone(&Utc),
        local_end.with_timezone(&Utc),
    ))
}

/// Converts a local naive datetime (in `time_zone`) to UTC, resolving
/// DST ambiguity by preferring the earlier instant (matches
/// [`resolve_local_datetime`]).
pub fn local_to_utc(local: NaiveDateTime, time_zone: &str) -> Option<DateTime<Utc>> {
    let tz = parse_time_zone_or_default(time_zone);
    resolve_local_datetime(&tz, local).map(|dt| dt.with_timezone(&Utc))
}

pub fn weekday_abbrev(date: NaiveDate) -> &'static str {
    WEEKDAY_ABBREVIATIONS[date.weekday().num_days_from_sunday() as usize]
}

/// The next date (strictly after `from`) whose weekday matches
/// `target_abbrev`, or `from` itself plus 7 days if `from` is already on
/// that weekday. This is the "next occurrence" primitive used by the
/// weekday descriptor; the "next week" qualifier adds a further 7 days on
/// top of it, by design.
pub fn next_weekday_on_or_after(from: NaiveDate, target_abbrev: &str) -> Option<NaiveDate> {
    let target_index = WEEKDAY_ABBREVIATIONS
        .iter()
        .position(|abbrev| abbrev.eq_ignore_ascii_case(target_abbrev))?;
    let from_index = from.weekday().num_days_from_sunday() as usize;
    let mut delta = (target_index + 7 - from_index) % 7;
    if delta == 0 {
        delta = 7;
    }
    from.checked_add_days(Days::new(delta as u64))
}

pub fn iso_to_utc(iso: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(iso)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn utc_to_iso(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Timelike, Utc};

    use super::{
        DEFAULT_TIME_ZONE, TimeInterval, iso_to_utc, local_day_bounds_utc,
        next_weekday_on_or_after, normalize_time_zone, utc_to_iso, weekday_abbrev,
    };

    #[test]
    fn normalize_time_zone_accepts_valid_iana_name() {
        assert_eq!(
            normalize_time_zone("America/Los_Angeles"),
            Some("America/Los_Angeles".to_string())
        );
    }

    #[test]
    fn normalize_time_zone_rejects_invalid_values() {
        assert_eq!(normalize_time_zone(""), None);
        assert_eq!(normalize_time_zone("Mars/Olympus"), None);
        assert_eq!(DEFAULT_TIME_ZONE, "UTC");
    }

    #[test]
    fn local_day_bounds_convert_local_midnight_to_utc() {
        let local_date = NaiveDate::from_ymd_opt(2026, 2, 17).expect("valid local date");
        let (start_utc, end_utc) =
            local_day_bounds_utc(local_date, "America/Los_Angeles").expect("time bounds");

        assert_eq!(start_utc.date_naive().to_string(), "2026-02-17");
        assert_eq!(start_utc.hour(), 8);
        assert_eq!(end_utc.hour(), 8);
    }

    #[test]
    fn next_weekday_skips_to_following_week_when_already_on_weekday() {
        let tuesday = NaiveDate::from_ymd_opt(2026, 2, 17).expect("valid date");
        assert_eq!(weekday_abbrev(tuesday), "Tue");
        let next_tuesday = next_weekday_on_or_after(tuesday, "Tue").expect("resolves");
        assert_eq!(next_tuesday, NaiveDate::from_ymd_opt(2026, 2, 24).unwrap());
    }

    #[test]
    fn next_weekday_finds_nearer_day_within_the_week() {
        let tuesday = NaiveDate::from_ymd_opt(2026, 2, 17).expect("valid date");
        let wednesday = next_weekday_on_or_after(tuesday, "Wed").expect("resolves");
        assert_eq!(wednesday, NaiveDate::from_ymd_opt(2026, 2, 18).unwrap());
    }

    #[test]
    fn time_interval_overlap_is_half_open() {
        let a = TimeInterval::new(
            Utc.with_ymd_and_hms(2026, 3, 3, 17, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 3, 17, 30, 0).unwrap(),
        )
        .unwrap();
        let b = TimeInterval::new(
            Utc.with_ymd_and_hms(2026, 3, 3, 17, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 3, 18, 0, 0).unwrap(),
        )
        .unwrap();
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn iso_round_trips_through_utc() {
        let value = iso_to_utc("2026-03-03T13:00:00-05:00").expect("parses");
        assert_eq!(value.hour(), 18);
        let back = utc_to_iso(value);
        assert_eq!(back, "2026-03-03T18:00:00Z");
    }
}
