//! # Muster Check-in
//! The check-in correlation engine: the status catalog, the calendar policy,
//! the in-memory correlation store, the orchestrator that routes reactions
//! and follow-up replies, and the resolver that produces one authoritative
//! status per (user, date).

pub mod calendar;
pub mod catalog;
pub mod correlation;
pub mod orchestrator;
pub mod resolver;

pub use catalog::{STATUS_CATALOG, StatusEntry};
pub use correlation::{CorrelationStore, PendingFollowUp};
pub use orchestrator::CheckinOrchestrator;
pub use resolver::{EffectiveStatus, resolve, resolve_all};
