//! The status catalog — the fixed registry of check-in reactions.
//!
//! Iteration order of [`STATUS_CATALOG`] is rendered verbatim into the daily
//! prompt, so the registry is an ordered slice, not a map.

/// One reaction a user can check in with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEntry {
    pub emoji: &'static str,
    /// Display text, also the status code stored in `responses`.
    pub text: &'static str,
    /// Follow-up DM sent when this status needs elaboration.
    pub prompt: Option<&'static str>,
    /// Search hint shown in the instructions, for users hunting the emoji.
    pub hint: &'static str,
}

/// Every status a user can react with, in instruction order.
pub const STATUS_CATALOG: &[StatusEntry] = &[
    StatusEntry {
        emoji: "✅",
        text: "In at Normal Time",
        prompt: None,
        hint: "checkmark",
    },
    StatusEntry {
        emoji: "⏱️",
        text: "In Late",
        prompt: Some("What time do you expect to be in?"),
        hint: "stopwatch",
    },
    StatusEntry {
        emoji: "🏠",
        text: "Working from Home",
        prompt: None,
        hint: "house",
    },
    StatusEntry {
        emoji: "🗓️",
        text: "Appointment",
        prompt: Some("What time do you expect to be in?"),
        hint: "calendar",
    },
    StatusEntry {
        emoji: "🤒",
        text: "Out Sick",
        prompt: None,
        hint: "thermometer",
    },
    StatusEntry {
        emoji: "🌴",
        text: "Liberty",
        prompt: None,
        hint: "palm tree",
    },
    StatusEntry {
        emoji: "❓",
        text: "Other",
        prompt: Some("Please provide your status for the day."),
        hint: "question mark",
    },
];

/// Exact-match lookup. `None` is not an error, just "not a check-in emoji" —
/// the orchestrator tells the sender and moves on.
pub fn lookup(emoji: &str) -> Option<&'static StatusEntry> {
    STATUS_CATALOG.iter().find(|entry| entry.emoji == emoji)
}

/// The per-emoji instruction lines for the daily prompt, in catalog order.
pub fn instructions() -> String {
    STATUS_CATALOG
        .iter()
        .map(|entry| format!("{} (search '{}') - {}", entry.emoji, entry.hint, entry.text))
        .collect::<Vec<_>>()
        .join("\n")
}
