//! # Muster Scheduler
//! Named recurring triggers for the three daily jobs (check-in prompt,
//! reminder sweep, summary). Firing instants are derived from HH:MM local
//! times plus an IANA time zone in the database `config` table, recomputed
//! whenever an admin changes configuration.

pub mod engine;
pub mod jobs;
pub mod recurrence;

pub use engine::Scheduler;
pub use jobs::Job;
pub use recurrence::{next_weekday_fire, parse_hhmm};
