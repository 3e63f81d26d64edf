//! ForceLink: headless CRM client.
//!
//! Talks to the CRM REST backend, normalizes its mixed-schema records,
//! aggregates them into dashboard analytics, raises task reminders and hosts
//! a throttled assistant. Front ends render what this crate produces.

pub mod analytics;
pub mod api;
pub mod assistant;
pub mod dashboard;
pub mod error;
pub mod notes;
pub mod notification;
pub mod record;
pub mod reminders;
pub mod search;
pub mod state;
pub mod types;

pub use error::CrmError;
pub use record::{Record, RecordId, RecordKind};
