//! C4: projects busy/client-meeting/non-client-busy data into a rendered
//! day × row grid with merge spans, for the public availability view.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::models::{BusyInterval, ClientMeeting, MeetingStatus};
use crate::time::{parse_time_zone_or_default, weekday_abbrev};

pub struct CalendarBuildParams<'a> {
    pub busy_utc: &'a [BusyInterval],
    pub client_meetings_utc: &'a [ClientMeeting],
    pub non_client_busy_utc: &'a [BusyInterval],
    pub host_timezone: &'a str,
    pub advising_days: &'a [String],
    pub search_start: DateTime<Utc>,
    pub search_end: DateTime<Utc>,
    pub workday_start_hour: u32,
    pub workday_end_hour: u32,
    pub slot_minutes: u32,
    pub requested_duration_minutes: u32,
    pub max_cells: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStatus {
    Open,
    Busy,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeetingRef {
    pub title: String,
    pub status: MeetingStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridCell {
    pub status: CellStatus,
    pub slot_start_utc: DateTime<Utc>,
    pub slot_end_utc: DateTime<Utc>,
    pub has_client_meeting: bool,
    pub client_meeting_state: Option<MeetingStatus>,
    pub has_overlap: bool,
    pub fits_requested_duration: bool,
    pub meetings: Vec<MeetingRef>,
    /// Render plan: number of rows this cell spans when rendered, 0 if
    /// hidden by a preceding merged cell.
    pub rowspan: u32,
    pub render: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarGrid {
    pub days: Vec<String>,
    pub rows: u32,
    pub slot_minutes: u32,
    pub requested_duration_minutes: u32,
    pub open_count: u32,
    pub busy_count: u32,
    /// `cells[day_index][row_index]`.
    pub cells: Vec<Vec<GridCell>>,
}

pub fn build(params: CalendarBuildParams<'_>) -> CalendarGrid {
    let tz = parse_time_zone_or_default(params.host_timezone);

    let rows = if params.slot_minutes == 0 || params.workday_end_hour <= params.workday_start_hour
    {
        0
    } else {
        ((params.workday_end_hour - params.workday_start_hour) * 60) / params.slot_minutes
    };

    let max_days = if rows == 0 {
        0
    } else {
        (params.max_cells / rows).max(0)
    };

    let mut days = Vec::new();
    if params.search_end > params.search_start && max_days > 0 {
        let mut day = params.search_start.with_timezone(&tz).date_naive();
        let last_day = params.search_end.with_timezone(&tz).date_naive();
        while day <= last_day && (days.len() as u32) < max_days {
            if params
                .advising_days
                .iter()
                .any(|name| name.eq_ignore_ascii_case(weekday_abbrev(day)))
            {
                days.push(day);
            }
            let Some(next_day) = day.succ_opt() else {
                break;
            };
            day = next_day;
        }
    }

    let mut grid_cells: Vec<Vec<GridCell>> = Vec::with_capacity(days.len());
    let mut open_count = 0u32;
    let mut busy_count = 0u32;

    for day in &days {
        let mut row_cells = Vec::with_capacity(rows as usize);
        for row in 0..rows {
            let Some(cell) = build_cell(
                *day,
                row,
                params.workday_start_hour,
                params.slot_minutes,
                &tz,
                params.busy_utc,
                params.client_meetings_utc,
                params.non_client_busy_utc,
            ) else {
                continue;
            };

            match cell.status {
                CellStatus::Open => open_count += 1,
                CellStatus::Busy => busy_count += 1,
            }

            row_cells.push(cell);
        }
        grid_cells.push(row_cells);
    }

    apply_requested_duration_highlight(&mut grid_cells, params.requested_duration_minutes, params.slot_minutes);
    apply_merge_plan(&mut grid_cells);

    CalendarGrid {
        days: days.iter().map(|d| d.to_string()).collect(),
        rows,
        slot_minutes: params.slot_minutes,
        requested_duration_minutes: params.requested_duration_minutes,
        open_count,
        busy_count,
        cells: grid_cells,
    }
}

fn build_cell(
    day: chrono::NaiveDate,
    row: u32,
    workday_start_hour: u32,
    slot_minutes: u32,
    tz: &Tz,
    busy_utc: &[BusyInterval],
    client_meetings_utc: &[ClientMeeting],
    non_client_busy_utc: &[BusyInterval],
) -> Option<GridCell> {
    let slot_start_local: NaiveDateTime = day.and_hms_opt(workday_start_hour, 0, 0)?
        + Duration::minutes((row * slot_minutes) as i64);
    let slot_end_local = slot_start_local + Duration::minutes(slot_minutes as i64);

    let slot_start_utc = crate::time::local_to_utc(slot_start_local, tz.name())?.with_timezone(&Utc);
    let slot_end_utc = crate::time::local_to_utc(slot_end_local, tz.name())?.with_timezone(&Utc);

    let busy_in_slot: Vec<&BusyInterval> = busy_utc
        .iter()
        .filter(|busy| busy.start < slot_end_utc && slot_start_utc < busy.end)
        .collect();

    let meetings_in_slot: Vec<&ClientMeeting> = client_meetings_utc
        .iter()
        .filter(|meeting| meeting.start < slot_end_utc && slot_start_utc < meeting.end)
        .collect();

    let has_client_meeting = !meetings_in_slot.is_empty();

    let non_client_overlap = non_client_busy_utc
        .iter()
        .any(|busy| busy.start < slot_end_utc && slot_start_utc < busy.end);

    let has_overlap = non_client_overlap
        || busy_without_client_meeting(slot_start_utc, slot_end_utc, &busy_in_slot, &meetings_in_slot);

    let status = if !busy_in_slot.is_empty() || has_client_meeting {
        CellStatus::Busy
    } else {
        CellStatus::Open
    };

    let client_meeting_state = if meetings_in_slot
        .iter()
        .any(|m| m.advisor_response_status == MeetingStatus::Accepted)
    {
        Some(MeetingStatus::Accepted)
    } else if has_client_meeting {
        Some(MeetingStatus::Pending)
    } else {
        None
    };

    Some(GridCell {
        status,
        slot_start_utc,
        slot_end_utc,
        has_client_meeting,
        client_meeting_state,
        has_overlap,
        fits_requested_duration: false,
        meetings: meetings_in_slot
            .iter()
            .map(|m| MeetingRef {
                title: m.title.clone(),
                status: m.advisor_response_status,
            })
            .collect(),
        rowspan: 1,
        render: true,
    })
}

/// Tests whether some sub-range of `[cell_start, cell_end)` is covered by a
/// busy interval but not by any client meeting, by sampling the midpoint of
/// every interval between sorted breakpoints (cell bounds + busy bounds +
/// meeting bounds clamped to the cell).
fn busy_without_client_meeting(
    cell_start: DateTime<Utc>,
    cell_end: DateTime<Utc>,
    busy_in_slot: &[&BusyInterval],
    meetings_in_slot: &[&ClientMeeting],
) -> bool {
    if busy_in_slot.is_empty() {
        return false;
    }

    let mut breakpoints = vec![cell_start, cell_end];
    for busy in busy_in_slot {
        breakpoints.push(busy.start.max(cell_start).min(cell_end));
        breakpoints.push(busy.end.max(cell_start).min(cell_end));
    }
    for meeting in meetings_in_slot {
        breakpoints.push(meeting.start.max(cell_start).min(cell_end));
        breakpoints.push(meeting.end.max(cell_start).min(cell_end));
    }
    breakpoints.sort();
    breakpoints.dedup();

    breakpoints.windows(2).any(|window| {
        let (left, right) = (window[0], window[1]);
        if left >= right {
            return false;
        }
        let midpoint = left + (right - left) / 2;
        let covered_by_busy = busy_in_slot
            .iter()
            .any(|busy| busy.start <= midpoint && midpoint < busy.end);
        let covered_by_meeting = meetings_in_slot
            .iter()
            .any(|meeting| meeting.start <= midpoint && midpoint < meeting.end);
        covered_by_busy && !covered_by_meeting
    })
}

fn apply_requested_duration_highlight(
    grid_cells: &mut [Vec<GridCell>],
    requested_duration_minutes: u32,
    slot_minutes: u32,
) {
    if slot_minutes == 0 || requested_duration_minutes <= slot_minutes {
        return;
    }

    let required_rows = requested_duration_minutes.div_ceil(slot_minutes) as usize;

    for day_cells in grid_cells.iter_mut() {
        let total_rows = day_cells.len();
        let mut fits = vec![false; total_rows];
        for start_row in 0..total_rows {
            if start_row + required_rows > total_rows {
                break;
            }
            let all_open = day_cells[start_row..start_row + required_rows]
                .iter()
                .all(|cell| cell.status == CellStatus::Open);
            fits[start_row] = all_open && day_cells[start_row].status == CellStatus::Open;
        }
        for (row, cell) in day_cells.iter_mut().enumerate() {
            cell.fits_requested_duration = fits[row];
        }
    }
}

/// Composite key a run of cells must share to merge: `(status,
/// clientMeetingState, hasOverlap, single-meeting-identity)`. Only cells
/// with exactly one client meeting may participate in a merge.
fn merge_key(cell: &GridCell) -> Option<(CellStatus, Option<MeetingStatus>, bool, Option<(String, MeetingStatus)>)> {
    let single_meeting = match cell.meetings.len() {
        0 => None,
        1 => Some((cell.meetings[0].title.clone(), cell.meetings[0].status)),
        _ => return None,
    };
    Some((cell.status, cell.client_meeting_state, cell.has_overlap, single_meeting))
}

fn apply_merge_plan(grid_cells: &mut [Vec<GridCell>]) {
    for day_cells in grid_cells.iter_mut() {
        let mut row = 0;
        while row < day_cells.len() {
            let Some(key) = merge_key(&day_cells[row]) else {
                day_cells[row].rowspan = 1;
                day_cells[row].render = true;
                row += 1;
                continue;
            };

            let mut span = 1;
            while row + span < day_cells.len() && merge_key(&day_cells[row + span]).as_ref() == Some(&key) {
                span += 1;
            }

            day_cells[row].rowspan = span as u32;
            day_cells[row].render = true;
            for hidden in day_cells.iter_mut().skip(row + 1).take(span - 1) {
                hidden.rowspan = 0;
                hidden.render = false;
            }

            row += span;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn single_accepted_meeting_merges_three_rows() {
        let meetings = vec![ClientMeeting {
            start: Utc.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 3, 3, 10, 30, 0).unwrap(),
            title: "Intro call".to_string(),
            advisor_response_status: MeetingStatus::Accepted,
        }];

        let grid = build(CalendarBuildParams {
            busy_utc: &[],
            client_meetings_utc: &meetings,
            non_client_busy_utc: &[],
            host_timezone: "UTC",
            advising_days: &["Tue".to_string()],
            search_start: Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 0).unwrap(),
            search_end: Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 0).unwrap(),
            workday_start_hour: 9,
            workday_end_hour: 18,
            slot_minutes: 30,
            requested_duration_minutes: 30,
            max_cells: 1000,
        });

        assert_eq!(grid.days.len(), 1);
        let day_cells = &grid.cells[0];
        let rendered: Vec<&GridCell> = day_cells.iter().filter(|c| c.render).collect();
        let merged = rendered
            .iter()
            .find(|c| c.has_client_meeting)
            .expect("a rendered merged meeting cell");
        assert_eq!(merged.rowspan, 3);

        let total_rowspan: u32 = day_cells.iter().filter(|c| c.render).map(|c| c.rowspan).sum();
        assert_eq!(total_rowspan, grid.rows);
    }

    #[test]
    fn open_and_busy_counts_cover_every_cell() {
        let busy = vec![BusyInterval {
            start: Utc.with_ymd_and_hms(2026, 3, 3, 17, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 3, 3, 17, 30, 0).unwrap(),
            calendar_id: None,
        }];

        let grid = build(CalendarBuildParams {
            busy_utc: &busy,
            client_meetings_utc: &[],
            non_client_busy_utc: &[],
            host_timezone: "UTC",
            advising_days: &["Tue".to_string()],
            search_start: Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 0).unwrap(),
            search_end: Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 0).unwrap(),
            workday_start_hour: 9,
            workday_end_hour: 18,
            slot_minutes: 30,
            requested_duration_minutes: 30,
            max_cells: 1000,
        });

        assert_eq!(grid.open_count + grid.busy_count, grid.rows * grid.days.len() as u32);
    }

    #[test]
    fn fits_requested_duration_requires_following_rows_open() {
        let busy = vec![BusyInterval {
            start: Utc.with_ymd_and_hms(2026, 3, 3, 17, 30, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 3, 3, 18, 0, 0).unwrap(),
            calendar_id: None,
        }];

        let grid = build(CalendarBuildParams {
            busy_utc: &busy,
            client_meetings_utc: &[],
            non_client_busy_utc: &[],
            host_timezone: "UTC",
            advising_days: &["Tue".to_string()],
            search_start: Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 0).unwrap(),
            search_end: Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 0).unwrap(),
            workday_start_hour: 9,
            workday_end_hour: 18,
            slot_minutes: 30,
            requested_duration_minutes: 60,
            max_cells: 1000,
        });

        let day_cells = &grid.cells[0];
        let row_17_00 = day_cells
            .iter()
            .find(|c| c.slot_start_utc == Utc.with_ymd_and_hms(2026, 3, 3, 17, 0, 0).unwrap())
            .unwrap();
        assert!(!row_17_00.fits_requested_duration);
    }
}
