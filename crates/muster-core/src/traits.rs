//! The chat transport boundary.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Destination, GroupMember, MessageId};

/// Outbound side of the chat transport.
///
/// `send` must return the identifier the network assigns to the outbound
/// message; reaction routing and follow-up correlation both key on it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name, for logs.
    fn name(&self) -> &str;

    /// Send a text message and return its outbound identifier.
    async fn send(&self, destination: &Destination, text: &str) -> Result<MessageId>;

    /// List the members of a group.
    async fn group_members(&self, group_id: &str) -> Result<Vec<GroupMember>>;
}
