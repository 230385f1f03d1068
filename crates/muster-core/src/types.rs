//! Domain and wire types shared across MusterBot crates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier of an outbound chat message, as reported by the transport on
/// send. Signal uses the sent timestamp (milliseconds) for this, and inbound
/// reactions/quotes reference it, so it doubles as the correlation token.
pub type MessageId = i64;

/// Where a message goes: the muster group or a single user's DM thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    Group(String),
    Direct(String),
}

impl Destination {
    /// The raw identifier, without the group/direct distinction.
    pub fn id(&self) -> &str {
        match self {
            Destination::Group(id) | Destination::Direct(id) => id,
        }
    }
}

/// A member of the muster group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: String,
    pub name: String,
}

/// One user's recorded attendance status for one date.
/// Unique per (user_id, date); later writes replace earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub user_id: String,
    pub user_name: String,
    pub date: NaiveDate,
    pub status: String,
    pub detail: Option<String>,
}

/// Kind of scheduled absence. TDY (temporary duty) outranks leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbsenceKind {
    Leave,
    TemporaryDuty,
}

/// A date-range absence record. Inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsenceRecord {
    pub user_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub kind: AbsenceKind,
    pub description: Option<String>,
}

impl AbsenceRecord {
    /// Whether this record covers the given date.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// A recorded holiday. A holiday date is never a workday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub description: String,
}

/// An inbound emoji reaction on some message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub sender: String,
    pub sender_name: String,
    /// The message being reacted to.
    pub target_message_id: MessageId,
    pub emoji: String,
    /// True when the reaction was removed rather than added.
    pub is_removal: bool,
}

/// An inbound text message, possibly quoting an earlier message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextEvent {
    pub sender: String,
    pub sender_name: String,
    pub destination: Destination,
    /// Sender-assigned send timestamp of the message itself.
    pub timestamp: MessageId,
    /// Id of the quoted message, when the text is a reply.
    pub quote_token: Option<MessageId>,
    pub body: String,
}

/// Everything the transport delivers to the event loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InboundEvent {
    Reaction(ReactionEvent),
    Text(TextEvent),
}
