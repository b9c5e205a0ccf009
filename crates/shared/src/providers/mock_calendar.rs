//! No-op [`CalendarProvider`] for `CALENDAR_MODE=mock` deployments. The
//! orchestrator's own mock path sources busy intervals straight from the
//! request body (`mockBusyIntervals`, §4.5 step 7) and never calls this
//! collaborator; it only backs the public availability view, which has no
//! request body to source mock data from, so it renders an all-open grid.

use crate::collaborators::{
    BusyIntervalLookup, CalendarProvider, ClientMeetingLookup, ClientMeetingLookupResult,
    CollaboratorError,
};
use crate::models::BusyInterval;

use super::BoxFuture;

pub struct MockCalendarProvider;

impl CalendarProvider for MockCalendarProvider {
    fn lookup_busy_intervals<'a>(
        &'a self,
        _lookup: BusyIntervalLookup,
    ) -> BoxFuture<'a, Result<Vec<BusyInterval>, CollaboratorError>> {
        Box::pin(async move { Ok(Vec::new()) })
    }

    fn lookup_client_meetings<'a>(
        &'a self,
        _lookup: ClientMeetingLookup,
    ) -> BoxFuture<'a, Result<ClientMeetingLookupResult, CollaboratorError>> {
        Box::pin(async move {
            Ok(ClientMeetingLookupResult {
                client_meetings: Vec::new(),
                non_client_busy_intervals: Vec::new(),
            })
        })
    }
}
