//! Concrete collaborator implementations (§6/§9) that back the trait
//! objects in [`crate::collaborators`] for a runnable deployment. Each
//! submodule owns exactly one family; `api-server`'s `main.rs` wires these
//! into a [`crate::collaborators::Collaborators`] bag at startup.

pub mod google_calendar;
pub mod llm_client;
pub mod mailer;
pub mod mock_calendar;
pub mod raw_email;
pub mod redis_kv;
pub mod secrets;

pub(crate) use crate::collaborators::BoxFuture;
