//! C2: multi-stage natural-language intent extractor.
//!
//! `extract` is a pure function — it never performs I/O and never panics
//! on malformed input; every stage degrades to "no match" rather than
//! raising a diagnostic (spec's documented failure policy).

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::models::{IntentRecord, MeetingType, RequestedWindow};
use crate::time::{self, parse_time_zone_or_default};

const TIMEZONE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("PST", "America/Los_Angeles"),
    ("PDT", "America/Los_Angeles"),
    ("MST", "America/Denver"),
    ("MDT", "America/Denver"),
    ("CST", "America/Chicago"),
    ("CDT", "America/Chicago"),
    ("EST", "America/New_York"),
    ("EDT", "America/New_York"),
    ("UTC", "UTC"),
    ("GMT", "UTC"),
];

const WEEKDAY_NAMES: &[(&str, &str)] = &[
    ("sunday", "Sun"),
    ("sun", "Sun"),
    ("monday", "Mon"),
    ("mon", "Mon"),
    ("tuesday", "Tue"),
    ("tues", "Tue"),
    ("tue", "Tue"),
    ("wednesday", "Wed"),
    ("wed", "Wed"),
    ("thursday", "Thu"),
    ("thurs", "Thu"),
    ("thur", "Thu"),
    ("thu", "Thu"),
    ("friday", "Fri"),
    ("fri", "Fri"),
    ("saturday", "Sat"),
    ("sat", "Sat"),
];

const MONTH_NAMES: &[(&str, u32)] = &[
    ("january", 1),
    ("jan", 1),
    ("february", 2),
    ("feb", 2),
    ("march", 3),
    ("mar", 3),
    ("april", 4),
    ("apr", 4),
    ("may", 5),
    ("june", 6),
    ("jun", 6),
    ("july", 7),
    ("jul", 7),
    ("august", 8),
    ("aug", 8),
    ("september", 9),
    ("sept", 9),
    ("sep", 9),
    ("october", 10),
    ("oct", 10),
    ("november", 11),
    ("nov", 11),
    ("december", 12),
    ("dec", 12),
];

/// `(name, start_hour, start_min, end_hour, end_min)`, ordered longest-name
/// first so substring matching never mistakes "late morning" for "morning".
const DAYPARTS: &[(&str, u32, u32, u32, u32)] = &[
    ("early morning", 6, 0, 9, 0),
    ("late morning", 10, 0, 12, 0),
    ("late afternoon", 15, 0, 17, 0),
    ("morning", 8, 0, 12, 0),
    ("afternoon", 12, 0, 17, 0),
    ("evening", 17, 0, 20, 0),
    ("night", 20, 0, 22, 0),
    ("lunch", 12, 0, 13, 0),
    ("noon", 12, 0, 13, 0),
];

fn is_morning_family(name: &str) -> bool {
    matches!(name, "early morning" | "morning" | "late morning")
}

static TIMEZONE_EXPLICIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)timezone\s*[:=]\s*([A-Za-z_]+(?:/[A-Za-z_]+){1,2})").unwrap()
});

static IN_PERSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)in-person|in person|onsite").unwrap());

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b([1-9]\d{0,2})\s*(minutes?|mins?|hours?|hrs?)\b").unwrap());

static ISO_DATETIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2})").unwrap()
});

static TIME_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\s*(?:-|to|and)\s*(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\b").unwrap()
});

static YMD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap());

static SLASH_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{2,4}))?\b").unwrap());

static MONTH_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    let months = MONTH_NAMES
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(
        r"(?i)\b({months})\s+(\d{{1,2}})(?:st|nd|rd|th)?(?:,?\s*(\d{{4}}))?\b"
    ))
    .unwrap()
});

static WEEKDAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    let names = WEEKDAY_NAMES
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(next\s+week\s+|next\s+|this\s+)?({names})\b")).unwrap()
});

static RELATIVE_DAY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(today|tomorrow)\b").unwrap());

static WEEK_OF_MONTH_FORWARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    let months = MONTH_NAMES
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(
        r"(?i)\b(first|1st|second|2nd|third|3rd|fourth|4th|last)\s+week\s+of\s+({months})(?:\s+(\d{{4}}))?\b"
    ))
    .unwrap()
});

static WEEK_OF_MONTH_REVERSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let months = MONTH_NAMES
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(
        r"(?i)\b({months})\s+(first|1st|second|2nd|third|3rd|fourth|4th|last)\s+week(?:\s+(\d{{4}}))?\b"
    ))
    .unwrap()
});

static MONTH_ONLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    let months = MONTH_NAMES
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(
        r"(?i)\b(?:in|during)\s+({months})(?:\s+(\d{{4}}))?\b"
    ))
    .unwrap()
});

struct ResolvedWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

pub fn extract(
    subject: &str,
    body: &str,
    from_email: &str,
    reference_now_iso: Option<&str>,
    fallback_timezone: &str,
    default_duration_minutes: u32,
) -> IntentRecord {
    let combined = format!("{subject}\n{body}");

    let client_timezone = extract_client_timezone(&combined);
    let working_tz_name = client_timezone
        .clone()
        .unwrap_or_else(|| fallback_timezone.to_string());
    let working_tz = parse_time_zone_or_default(&working_tz_name);

    let reference_now = reference_now_iso
        .and_then(time::iso_to_utc)
        .unwrap_or_else(Utc::now);
    let reference_local_date = reference_now.with_timezone(&working_tz).date_naive();

    let meeting_type = if IN_PERSON_RE.is_match(&combined) {
        MeetingType::InPerson
    } else {
        MeetingType::Online
    };

    let duration_minutes = extract_duration(&combined).unwrap_or(default_duration_minutes);

    let windows = extract_requested_windows(&combined, reference_local_date, &working_tz);

    IntentRecord {
        client_email: from_email.trim().to_ascii_lowercase(),
        meeting_type,
        duration_minutes,
        requested_windows: windows
            .into_iter()
            .map(|w| RequestedWindow {
                start_iso: time::utc_to_iso(w.start),
                end_iso: time::utc_to_iso(w.end),
            })
            .collect(),
        client_timezone,
    }
}

fn extract_client_timezone(text: &str) -> Option<String> {
    if let Some(captures) = TIMEZONE_EXPLICIT_RE.captures(text) {
        let candidate = captures.get(1)?.as_str();
        if let Some(normalized) = time::normalize_time_zone(candidate) {
            return Some(normalized);
        }
    }

    for (abbrev, iana) in TIMEZONE_ABBREVIATIONS {
        let pattern = format!(r"(?i)\b{abbrev}\b");
        if Regex::new(&pattern).unwrap().is_match(text) {
            return Some((*iana).to_string());
        }
    }

    None
}

fn extract_duration(text: &str) -> Option<u32> {
    let captures = DURATION_RE.captures(text)?;
    let value: u32 = captures.get(1)?.as_str().parse().ok()?;
    let unit = captures.get(2)?.as_str().to_ascii_lowercase();
    if unit.starts_with("hour") || unit.starts_with("hr") {
        Some(value * 60)
    } else {
        Some(value)
    }
}

fn extract_requested_windows(
    text: &str,
    reference_local_date: NaiveDate,
    tz: &chrono_tz::Tz,
) -> Vec<ResolvedWindow> {
    let iso_windows = extract_iso_windows(text);
    if !iso_windows.is_empty() {
        return dedup_and_sort(iso_windows);
    }

    let point_windows = extract_point_windows(text, reference_local_date, tz);
    if !point_windows.is_empty() {
        return dedup_and_sort(point_windows);
    }

    dedup_and_sort(extract_span_windows(text, reference_local_date, tz))
}

fn extract_iso_windows(text: &str) -> Vec<ResolvedWindow> {
    let matches: Vec<DateTime<Utc>> = ISO_DATETIME_RE
        .find_iter(text)
        .filter_map(|m| time::iso_to_utc(m.as_str()))
        .collect();

    matches
        .chunks_exact(2)
        .filter_map(|pair| {
            let (start, end) = (pair[0], pair[1]);
            (end > start).then_some(ResolvedWindow { start, end })
        })
        .collect()
}

/// Splits on `[\n.;]+`, matching the clause boundary the parser's natural
/// language layers operate over.
fn split_clauses(text: &str) -> Vec<&str> {
    static CLAUSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\n.;]+").unwrap());
    CLAUSE_RE
        .split(text)
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .collect()
}

struct TimeOfDay {
    start: NaiveTime,
    end: NaiveTime,
    /// Days to add to the end date beyond the start date's, from the
    /// roll-forward policy (0 normally, 1 when the range crosses midnight).
    end_day_offset: i64,
}

/// Resolves an explicit `<t1> (-|to|and) <t2>` range plus an optional
/// daypart fallback for meridiem defaults, per §4.1 step 5's
/// natural-language layer.
fn resolve_time_range(clause: &str, daypart_meridiem_is_am: Option<bool>) -> Option<TimeOfDay> {
    let captures = TIME_RANGE_RE.captures(clause)?;
    let start_hour: u32 = captures.get(1)?.as_str().parse().ok()?;
    let start_min: u32 = captures
        .get(2)
        .map(|m| m.as_str().parse().unwrap_or(0))
        .unwrap_or(0);
    let start_meridiem = captures.get(3).map(|m| m.as_str().to_ascii_lowercase());
    let end_hour: u32 = captures.get(4)?.as_str().parse().ok()?;
    let end_min: u32 = captures
        .get(5)
        .map(|m| m.as_str().parse().unwrap_or(0))
        .unwrap_or(0);
    let end_meridiem = captures.get(6).map(|m| m.as_str().to_ascii_lowercase());

    // Resolve meridiem: explicit on this side, else the other side's
    // explicit meridiem, else the daypart's default, else reject.
    let resolved_is_am = |own: &Option<String>, other: &Option<String>| -> Option<bool> {
        if let Some(value) = own {
            return Some(value == "am");
        }
        if let Some(value) = other {
            return Some(value == "am");
        }
        daypart_meridiem_is_am
    };

    let start_is_am = resolved_is_am(&start_meridiem, &end_meridiem)?;
    let end_is_am = resolved_is_am(&end_meridiem, &start_meridiem)?;

    let to_24h = |hour: u32, is_am: bool| -> u32 {
        let hour12 = hour % 12;
        if is_am { hour12 } else { hour12 + 12 }
    };

    let start_time = NaiveTime::from_hms_opt(to_24h(start_hour, start_is_am), start_min, 0)?;
    let mut end_time = NaiveTime::from_hms_opt(to_24h(end_hour, end_is_am), end_min, 0)?;
    let mut end_day_offset = 0i64;

    if end_time <= start_time {
        let (plus_12, overflow_12) = end_time.overflowing_add_signed(Duration::hours(12));
        if overflow_12 > 0 || plus_12 > start_time {
            end_time = plus_12;
            end_day_offset = overflow_12;
        } else {
            let (plus_24, overflow_24) = end_time.overflowing_add_signed(Duration::hours(24));
            end_time = plus_24;
            end_day_offset = overflow_24;
        }
    }

    Some(TimeOfDay {
        start: start_time,
        end: end_time,
        end_day_offset,
    })
}

fn match_daypart(clause: &str) -> Option<(&'static str, TimeOfDay)> {
    let lowered = clause.to_ascii_lowercase();
    for (name, sh, sm, eh, em) in DAYPARTS {
        if lowered.contains(name) {
            let start = NaiveTime::from_hms_opt(*sh, *sm, 0)?;
            let end = NaiveTime::from_hms_opt(*eh, *em, 0)?;
            return Some((
                name,
                TimeOfDay {
                    start,
                    end,
                    end_day_offset: 0,
                },
            ));
        }
    }
    None
}

enum DayDescriptor {
    Weekday { is_next: bool, abbrev: String },
    RelativeToday,
    RelativeTomorrow,
    Ymd(NaiveDate),
}

fn match_day_descriptor(clause: &str) -> Option<DayDescriptor> {
    if let Some(captures) = YMD_RE.captures(clause) {
        let year: i32 = captures.get(1)?.as_str().parse().ok()?;
        let month: u32 = captures.get(2)?.as_str().parse().ok()?;
        let day: u32 = captures.get(3)?.as_str().parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day).map(DayDescriptor::Ymd);
    }

    if let Some(captures) = RELATIVE_DAY_RE.captures(clause) {
        return match captures.get(1)?.as_str().to_ascii_lowercase().as_str() {
            "today" => Some(DayDescriptor::RelativeToday),
            "tomorrow" => Some(DayDescriptor::RelativeTomorrow),
            _ => None,
        };
    }

    if let Some(captures) = WEEKDAY_RE.captures(clause) {
        let qualifier = captures
            .get(1)
            .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase());
        let is_next = matches!(qualifier.as_deref(), Some("next") | Some("next week"));
        let name = captures.get(2)?.as_str().to_ascii_lowercase();
        let abbrev = WEEKDAY_NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, abbrev)| (*abbrev).to_string())?;
        return Some(DayDescriptor::Weekday { is_next, abbrev });
    }

    if let Some(captures) = MONTH_DAY_RE.captures(clause) {
        let month_name = captures.get(1)?.as_str().to_ascii_lowercase();
        let month = MONTH_NAMES
            .iter()
            .find(|(name, _)| *name == month_name)
            .map(|(_, num)| *num)?;
        let day: u32 = captures.get(2)?.as_str().parse().ok()?;
        let explicit_year: Option<i32> = captures.get(3).and_then(|m| m.as_str().parse().ok());
        return Some(DayDescriptor::Ymd(NaiveDate::from_ymd_opt(
            explicit_year.unwrap_or(1),
            month,
            day,
        )?));
    }

    if let Some(captures) = SLASH_DATE_RE.captures(clause) {
        let month: u32 = captures.get(1)?.as_str().parse().ok()?;
        let day: u32 = captures.get(2)?.as_str().parse().ok()?;
        let explicit_year = captures.get(3).and_then(|m| {
            let raw = m.as_str();
            let parsed: i32 = raw.parse().ok()?;
            Some(if raw.len() == 2 { 2000 + parsed } else { parsed })
        });
        return Some(DayDescriptor::Ymd(NaiveDate::from_ymd_opt(
            explicit_year.unwrap_or(1),
            month,
            day,
        )?));
    }

    None
}

/// Resolves a `DayDescriptor` against `reference_local_date`, implementing
/// §4.1's year-rollover and weekday-qualifier policies.
fn resolve_day_descriptor(descriptor: &DayDescriptor, reference_local_date: NaiveDate) -> Option<NaiveDate> {
    match descriptor {
        DayDescriptor::RelativeToday => Some(reference_local_date),
        DayDescriptor::RelativeTomorrow => {
            reference_local_date.checked_add_days(chrono::Days::new(1))
        }
        DayDescriptor::Weekday { is_next, abbrev } => {
            let next_occurrence = time::next_weekday_on_or_after(reference_local_date, abbrev)?;
            if *is_next {
                next_occurrence.checked_add_days(chrono::Days::new(7))
            } else {
                Some(next_occurrence)
            }
        }
        DayDescriptor::Ymd(date) => {
            if date.year() != 1 {
                return Some(*date);
            }
            // Year was not provided: prefer the current year, rolling
            // forward a year if the result falls before reference start-of-day.
            let candidate = NaiveDate::from_ymd_opt(
                reference_local_date.year(),
                date.month(),
                date.day(),
            )?;
            if candidate < reference_local_date {
                NaiveDate::from_ymd_opt(reference_local_date.year() + 1, date.month(), date.day())
            } else {
                Some(candidate)
            }
        }
    }
}

fn extract_point_windows(
    text: &str,
    reference_local_date: NaiveDate,
    tz: &chrono_tz::Tz,
) -> Vec<ResolvedWindow> {
    let mut windows = Vec::new();

    for clause in split_clauses(text) {
        let Some(descriptor) = match_day_descriptor(clause) else {
            continue;
        };
        let Some(date) = resolve_day_descriptor(&descriptor, reference_local_date) else {
            continue;
        };

        let daypart_match = match_daypart(clause);
        let daypart_is_am = daypart_match.as_ref().map(|(name, _)| is_morning_family(name));

        let time_of_day = match resolve_time_range(clause, daypart_is_am) {
            Some(range) => Some(range),
            None => daypart_match.map(|(_, range)| range),
        };

        let Some(time_of_day) = time_of_day else {
            continue;
        };

        if time_of_day.end <= time_of_day.start {
            continue;
        }

        let Some(start) = time::local_to_utc(date.and_time(time_of_day.start), tz.name()) else {
            continue;
        };
        let Some(end_date) = date.checked_add_days(chrono::Days::new(time_of_day.end_day_offset as u64)) else {
            continue;
        };
        let Some(end) = time::local_to_utc(end_date.and_time(time_of_day.end), tz.name()) else {
            continue;
        };

        if end > start {
            windows.push(ResolvedWindow { start, end });
        }
    }

    windows
}

fn ordinal_to_index(ordinal: &str) -> usize {
    match ordinal.to_ascii_lowercase().as_str() {
        "first" | "1st" => 0,
        "second" | "2nd" => 1,
        "third" | "3rd" => 2,
        "fourth" | "4th" => 3,
        _ => usize::MAX,
    }
}

fn month_span(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((start, end.pred_opt()?))
}

fn resolve_span_year(explicit_year: Option<i32>, month: u32, reference_local_date: NaiveDate) -> i32 {
    match explicit_year {
        Some(year) => year,
        None => {
            let candidate_end = month_span(reference_local_date.year(), month)
                .map(|(_, end)| end)
                .unwrap_or(reference_local_date);
            if candidate_end < reference_local_date {
                reference_local_date.year() + 1
            } else {
                reference_local_date.year()
            }
        }
    }
}

/// Recognises week-of-month and month-only broad spans, then iterates
/// every day in the span, intersecting each day's explicit range/daypart
/// (or the full day, absent either) with the span bounds.
fn extract_span_windows(
    text: &str,
    reference_local_date: NaiveDate,
    tz: &chrono_tz::Tz,
) -> Vec<ResolvedWindow> {
    let daypart_match = match_daypart(text);
    let daypart_is_am = daypart_match.as_ref().map(|(name, _)| is_morning_family(name));
    let time_of_day = resolve_time_range(text, daypart_is_am)
        .or_else(|| daypart_match.map(|(_, range)| range))
        .unwrap_or(TimeOfDay {
            start: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
            end_day_offset: 0,
        });

    let span = extract_week_of_month_span(text, reference_local_date)
        .or_else(|| extract_month_only_span(text, reference_local_date));

    let Some((span_start, span_end)) = span else {
        return Vec::new();
    };

    let mut windows = Vec::new();
    let mut day = span_start;
    while day <= span_end {
        if let (Some(start), Some(end)) = (
            time::local_to_utc(day.and_time(time_of_day.start), tz.name()),
            time::local_to_utc(day.and_time(time_of_day.end), tz.name()),
        ) {
            if end > start {
                windows.push(ResolvedWindow { start, end });
            }
        }
        let Some(next) = day.checked_add_days(chrono::Days::new(1)) else {
            break;
        };
        day = next;
    }

    windows
}

fn nth_weekday_span(year: i32, month: u32, ordinal: &str) -> Option<(NaiveDate, NaiveDate)> {
    let (month_start, month_end) = month_span(year, month)?;
    if ordinal.eq_ignore_ascii_case("last") {
        let last_week_start = month_end.checked_sub_days(chrono::Days::new(6))?;
        return Some((last_week_start.max(month_start), month_end));
    }

    let index = ordinal_to_index(ordinal);
    if index == usize::MAX {
        return None;
    }
    let week_start = month_start.checked_add_days(chrono::Days::new((index as u64) * 7))?;
    if week_start > month_end {
        return None;
    }
    let week_end = week_start
        .checked_add_days(chrono::Days::new(6))
        .unwrap_or(month_end)
        .min(month_end);
    Some((week_start, week_end))
}

fn extract_week_of_month_span(
    text: &str,
    reference_local_date: NaiveDate,
) -> Option<(NaiveDate, NaiveDate)> {
    if let Some(captures) = WEEK_OF_MONTH_FORWARD_RE.captures(text) {
        let ordinal = captures.get(1)?.as_str();
        let month_name = captures.get(2)?.as_str().to_ascii_lowercase();
        let month = MONTH_NAMES.iter().find(|(n, _)| *n == month_name).map(|(_, m)| *m)?;
        let explicit_year: Option<i32> = captures.get(3).and_then(|m| m.as_str().parse().ok());
        let year = resolve_span_year(explicit_year, month, reference_local_date);
        return nth_weekday_span(year, month, ordinal);
    }

    if let Some(captures) = WEEK_OF_MONTH_REVERSE_RE.captures(text) {
        let month_name = captures.get(1)?.as_str().to_ascii_lowercase();
        let ordinal = captures.get(2)?.as_str();
        let month = MONTH_NAMES.iter().find(|(n, _)| *n == month_name).map(|(_, m)| *m)?;
        let explicit_year: Option<i32> = captures.get(3).and_then(|m| m.as_str().parse().ok());
        let year = resolve_span_year(explicit_year, month, reference_local_date);
        return nth_weekday_span(year, month, ordinal);
    }

    None
}

fn extract_month_only_span(
    text: &str,
    reference_local_date: NaiveDate,
) -> Option<(NaiveDate, NaiveDate)> {
    let captures = MONTH_ONLY_RE.captures(text)?;
    let month_name = captures.get(1)?.as_str().to_ascii_lowercase();
    let month = MONTH_NAMES.iter().find(|(n, _)| *n == month_name).map(|(_, m)| *m)?;

    // Reject when immediately followed by a day number — that belongs to
    // the point layer's "Mon D" descriptor, not a month-only span.
    let match_end = captures.get(0)?.end();
    let remainder = text[match_end..].trim_start();
    if remainder
        .split_whitespace()
        .next()
        .is_some_and(|token| token.trim_start_matches(',').chars().next().is_some_and(|c| c.is_ascii_digit()))
    {
        return None;
    }

    let explicit_year: Option<i32> = captures.get(2).and_then(|m| m.as_str().parse().ok());
    let year = resolve_span_year(explicit_year, month, reference_local_date);
    month_span(year, month)
}

fn dedup_and_sort(windows: Vec<ResolvedWindow>) -> Vec<ResolvedWindow> {
    let mut seen = BTreeSet::new();
    let mut unique = Vec::new();
    for window in windows {
        let key = (window.start, window.end);
        if seen.insert(key) {
            unique.push(window);
        }
    }
    unique.sort_by_key(|w| w.start);
    unique
}
