//! [`RawEmailObjectStore`] that always misses. The inbound webhook usually
//! carries the full body inline (§4.5 step 1's fallback-to-`""` path
//! exists for exactly the case where it doesn't and no object store is
//! configured); wiring a real S3/object-store client is environment-
//! specific and out of this crate's scope.

use crate::collaborators::{CollaboratorError, RawEmailObjectStore};

use super::BoxFuture;

pub struct NullRawEmailObjectStore;

impl RawEmailObjectStore for NullRawEmailObjectStore {
    fn fetch_raw_body<'a>(
        &'a self,
        message_id: &'a str,
    ) -> BoxFuture<'a, Result<String, CollaboratorError>> {
        Box::pin(async move {
            Err(CollaboratorError::RawEmailObjectStore(format!(
                "no object store configured for message {message_id}"
            )))
        })
    }

    fn delete_raw_body<'a>(
        &'a self,
        _message_id: &'a str,
    ) -> BoxFuture<'a, Result<(), CollaboratorError>> {
        Box::pin(async move { Ok(()) })
    }
}
