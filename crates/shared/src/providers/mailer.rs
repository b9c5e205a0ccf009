//! Logging [`Mailer`]. `RESPONSE_MODE=log` (the default, §4.5 step 12) never
//! dispatches mail at all; this implementation backs `RESPONSE_MODE=send`
//! in deployments that have no outbound mail transport wired up yet, and
//! doubles as the harness mailer for integration tests that only assert on
//! what *would* have been sent.

use tracing::info;

use crate::collaborators::{CollaboratorError, Mailer};

use super::BoxFuture;

pub struct LoggingMailer;

impl Mailer for LoggingMailer {
    fn send<'a>(
        &'a self,
        to: &'a str,
        subject: &'a str,
        body: &'a str,
    ) -> BoxFuture<'a, Result<(), CollaboratorError>> {
        Box::pin(async move {
            info!(to, subject, body_len = body.len(), "mailer.send");
            Ok(())
        })
    }
}
