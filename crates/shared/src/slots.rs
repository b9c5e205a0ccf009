//! C3: deterministic enumeration of the first K non-conflicting candidate
//! slots under advising-day, workday-hour, duration and window constraints.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::models::{BusyInterval, CandidateSlot};
use crate::time::{parse_time_zone_or_default, weekday_abbrev};

pub struct SlotGenerationParams<'a> {
    pub busy_utc: &'a [BusyInterval],
    pub requested_windows_utc: &'a [(DateTime<Utc>, DateTime<Utc>)],
    pub host_timezone: &'a str,
    pub advising_weekdays: &'a [String],
    pub search_start: DateTime<Utc>,
    pub search_end: DateTime<Utc>,
    pub workday_start_hour: u32,
    pub workday_end_hour: u32,
    pub duration_minutes: u32,
    pub max_suggestions: u32,
}

/// Never panics: invalid `searchStart`/`searchEnd` bounds (end before or
/// equal to start, or an out-of-range workday) resolve to an empty result.
pub fn generate(params: SlotGenerationParams<'_>) -> Vec<CandidateSlot> {
    if params.search_end <= params.search_start
        || params.duration_minutes == 0
        || params.workday_end_hour <= params.workday_start_hour
        || params.workday_end_hour > 24
        || params.max_suggestions == 0
    {
        return Vec::new();
    }

    let tz = parse_time_zone_or_default(params.host_timezone);
    let mut slots = Vec::new();

    let mut day = params.search_start.with_timezone(&tz).date_naive();
    let last_day = params.search_end.with_timezone(&tz).date_naive();

    while day <= last_day {
        if slots.len() as u32 >= params.max_suggestions {
            break;
        }

        if !params
            .advising_weekdays
            .iter()
            .any(|name| name.eq_ignore_ascii_case(weekday_abbrev(day)))
        {
            let Some(next_day) = day.succ_opt() else {
                break;
            };
            day = next_day;
            continue;
        }

        let Some(workday_start_local) = day.and_hms_opt(params.workday_start_hour, 0, 0) else {
            break;
        };
        let Some(workday_end_local) = day.and_hms_opt(0, 0, 0).and_then(|midnight| {
            midnight.checked_add_signed(Duration::hours(params.workday_end_hour as i64))
        }) else {
            break;
        };

        let mut slot_start_local = workday_start_local;
        while slot_start_local + Duration::minutes(params.duration_minutes as i64)
            <= workday_end_local
        {
            if slots.len() as u32 >= params.max_suggestions {
                break;
            }

            let slot_end_local =
                slot_start_local + Duration::minutes(params.duration_minutes as i64);

            if let Some(candidate) = build_candidate(
                slot_start_local,
                slot_end_local,
                &tz,
                params.search_start,
                params.search_end,
                params.requested_windows_utc,
                params.busy_utc,
            ) {
                slots.push(candidate);
            }

            slot_start_local += Duration::minutes(params.duration_minutes as i64);
        }

        let Some(next_day) = day.succ_opt() else {
            break;
        };
        day = next_day;
    }

    slots
}

fn build_candidate(
    slot_start_local: chrono::NaiveDateTime,
    slot_end_local: chrono::NaiveDateTime,
    tz: &Tz,
    search_start: DateTime<Utc>,
    search_end: DateTime<Utc>,
    requested_windows_utc: &[(DateTime<Utc>, DateTime<Utc>)],
    busy_utc: &[BusyInterval],
) -> Option<CandidateSlot> {
    let start_utc = crate::time::local_to_utc(slot_start_local, tz.name())?.with_timezone(&Utc);
    let end_utc = crate::time::local_to_utc(slot_end_local, tz.name())?.with_timezone(&Utc);

    if start_utc < search_start || end_utc > search_end {
        return None;
    }

    if !requested_windows_utc.is_empty()
        && !requested_windows_utc
            .iter()
            .any(|(window_start, window_end)| *window_start <= start_utc && end_utc <= *window_end)
    {
        return None;
    }

    if busy_utc
        .iter()
        .any(|busy| busy.start < end_utc && start_utc < busy.end)
    {
        return None;
    }

    Some(CandidateSlot {
        start_utc,
        end_utc,
        start_host_local: start_utc.with_timezone(tz).format("%Y-%m-%d %H:%M").to_string(),
        end_host_local: end_utc.with_timezone(tz).format("%Y-%m-%d %H:%M").to_string(),
        host_timezone: tz.name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn slot_generation_skips_busy_and_respects_advising_weekdays() {
        let busy = vec![BusyInterval {
            start: Utc.with_ymd_and_hms(2026, 3, 3, 17, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 3, 3, 17, 30, 0).unwrap(),
            calendar_id: None,
        }];

        let params = SlotGenerationParams {
            busy_utc: &busy,
            requested_windows_utc: &[],
            host_timezone: "America/Los_Angeles",
            advising_weekdays: &["Tue".to_string(), "Wed".to_string()],
            search_start: Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 0).unwrap(),
            search_end: Utc.with_ymd_and_hms(2026, 3, 5, 0, 0, 0).unwrap(),
            workday_start_hour: 9,
            workday_end_hour: 17,
            duration_minutes: 30,
            max_suggestions: 2,
        };

        let slots = generate(params);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].start_utc, Utc.with_ymd_and_hms(2026, 3, 3, 17, 30, 0).unwrap());
        assert_eq!(slots[1].start_utc, Utc.with_ymd_and_hms(2026, 3, 3, 18, 0, 0).unwrap());
    }

    #[test]
    fn invalid_search_bounds_return_empty() {
        let params = SlotGenerationParams {
            busy_utc: &[],
            requested_windows_utc: &[],
            host_timezone: "UTC",
            advising_weekdays: &["Mon".to_string()],
            search_start: Utc.with_ymd_and_hms(2026, 3, 5, 0, 0, 0).unwrap(),
            search_end: Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 0).unwrap(),
            workday_start_hour: 9,
            workday_end_hour: 17,
            duration_minutes: 30,
            max_suggestions: 3,
        };
        assert!(generate(params).is_empty());
    }

    #[test]
    fn respects_max_suggestions_cap() {
        let params = SlotGenerationParams {
            busy_utc: &[],
            requested_windows_utc: &[],
            host_timezone: "UTC",
            advising_weekdays: &[
                "Mon".to_string(),
                "Tue".to_string(),
                "Wed".to_string(),
                "Thu".to_string(),
                "Fri".to_string(),
            ],
            search_start: Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap(),
            search_end: Utc.with_ymd_and_hms(2026, 3, 20, 0, 0, 0).unwrap(),
            workday_start_hour: 9,
            workday_end_hour: 17,
            duration_minutes: 30,
            max_suggestions: 5,
        };
        assert_eq!(generate(params).len(), 5);
    }

    #[test]
    fn requested_window_must_fully_contain_slot() {
        let window_start = Utc.with_ymd_and_hms(2026, 3, 3, 17, 0, 0).unwrap();
        let window_end = Utc.with_ymd_and_hms(2026, 3, 3, 17, 15, 0).unwrap();

        let params = SlotGenerationParams {
            busy_utc: &[],
            requested_windows_utc: &[(window_start, window_end)],
            host_timezone: "UTC",
            advising_weekdays: &["Tue".to_string()],
            search_start: Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 0).unwrap(),
            search_end: Utc.with_ymd_and_hms(2026, 3, 4, 0, 0, 0).unwrap(),
            workday_start_hour: 9,
            workday_end_hour: 17,
            duration_minutes: 30,
            max_suggestions: 5,
        };

        assert!(generate(params).is_empty());
    }
}
