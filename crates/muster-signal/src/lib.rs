//! # Muster Signal
//! Signal transport over the signal-cli daemon's JSON-RPC HTTP endpoint —
//! sending (which yields the outbound timestamp used for correlation),
//! group membership, and a receive-polling loop that feeds the event loop.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_stream::wrappers::UnboundedReceiverStream;

use muster_core::config::SignalConfig;
use muster_core::error::{MusterError, Result};
use muster_core::traits::Transport;
use muster_core::types::{
    Destination, GroupMember, InboundEvent, MessageId, ReactionEvent, TextEvent,
};

/// Signal transport backed by a signal-cli JSON-RPC daemon.
pub struct SignalTransport {
    config: SignalConfig,
    account: String,
    client: reqwest::Client,
    request_id: AtomicU64,
}

impl SignalTransport {
    pub fn new(config: SignalConfig, account: String) -> Self {
        Self {
            config,
            account,
            client: reqwest::Client::new(),
            request_id: AtomicU64::new(1),
        }
    }

    /// One JSON-RPC call with the configured per-request timeout.
    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.request_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.config.rpc_url)
            .json(&body)
            .timeout(std::time::Duration::from_secs(self.config.request_timeout))
            .send()
            .await
            .map_err(|e| MusterError::Transport(format!("{method} failed: {e}")))?;

        let rpc: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| MusterError::Transport(format!("Invalid {method} response: {e}")))?;

        if let Some(err) = rpc.error {
            return Err(MusterError::Transport(format!(
                "{method} error {}: {}",
                err.code, err.message
            )));
        }
        Ok(rpc.result.unwrap_or(serde_json::Value::Null))
    }

    /// Poll the daemon for queued envelopes.
    pub async fn receive(&self) -> Result<Vec<InboundEvent>> {
        let result = self
            .call("receive", json!({ "account": self.account }))
            .await?;
        let envelopes: Vec<ReceivedItem> = serde_json::from_value(result)
            .map_err(|e| MusterError::Transport(format!("Invalid receive payload: {e}")))?;
        Ok(envelopes
            .into_iter()
            .filter_map(|item| item.envelope.into_event(&self.account))
            .collect())
    }

    /// Spawn the polling loop. Errors back off rather than kill the loop.
    pub fn start_polling(self: Arc<Self>) -> SignalEventStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let poll_interval = self.config.poll_interval;

        tokio::spawn(async move {
            tracing::info!("Signal polling loop started");
            loop {
                match self.receive().await {
                    Ok(events) => {
                        for event in events {
                            if tx.send(event).is_err() {
                                tracing::info!("Signal polling stopped (receiver dropped)");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Signal receive error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                }
                tokio::time::sleep(std::time::Duration::from_secs(poll_interval)).await;
            }
        });

        UnboundedReceiverStream::new(rx)
    }
}

/// Stream of inbound events from the polling loop.
pub type SignalEventStream = UnboundedReceiverStream<InboundEvent>;

#[async_trait]
impl Transport for SignalTransport {
    fn name(&self) -> &str {
        "signal"
    }

    async fn send(&self, destination: &Destination, text: &str) -> Result<MessageId> {
        let params = match destination {
            Destination::Group(group_id) => json!({
                "account": self.account,
                "groupId": group_id,
                "message": text,
            }),
            Destination::Direct(user_id) => json!({
                "account": self.account,
                "recipient": [user_id],
                "message": text,
            }),
        };
        let result = self.call("send", params).await?;
        result
            .get("timestamp")
            .and_then(|t| t.as_i64())
            .ok_or_else(|| MusterError::Transport("send result missing timestamp".into()))
    }

    async fn group_members(&self, group_id: &str) -> Result<Vec<GroupMember>> {
        let result = self
            .call("listGroups", json!({ "account": self.account }))
            .await?;
        let groups: Vec<SignalGroup> = serde_json::from_value(result)
            .map_err(|e| MusterError::Transport(format!("Invalid listGroups payload: {e}")))?;
        let group = groups
            .into_iter()
            .find(|g| g.id == group_id)
            .ok_or_else(|| MusterError::Transport(format!("Group {group_id} not found")))?;

        // Contact names, best effort. The number stands in when unknown.
        let names = self.contact_names().await.unwrap_or_default();
        Ok(group
            .members
            .into_iter()
            .map(|m| {
                let name = names
                    .iter()
                    .find(|(number, _)| *number == m.number)
                    .map(|(_, name)| name.clone())
                    .unwrap_or_else(|| m.number.clone());
                GroupMember { id: m.number, name }
            })
            .collect())
    }
}

impl SignalTransport {
    async fn contact_names(&self) -> Result<Vec<(String, String)>> {
        let result = self
            .call("listContacts", json!({ "account": self.account }))
            .await?;
        let contacts: Vec<SignalContact> = serde_json::from_value(result)
            .map_err(|e| MusterError::Transport(format!("Invalid listContacts payload: {e}")))?;
        Ok(contacts
            .into_iter()
            .filter_map(|c| {
                let name = c.display_name()?;
                Some((c.number, name))
            })
            .collect())
    }
}

// --- signal-cli JSON-RPC wire types ---

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ReceivedItem {
    envelope: Envelope,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(alias = "sourceNumber")]
    source: String,
    #[serde(default)]
    source_name: Option<String>,
    #[serde(default)]
    data_message: Option<DataMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataMessage {
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    group_info: Option<GroupInfo>,
    #[serde(default)]
    reaction: Option<Reaction>,
    #[serde(default)]
    quote: Option<Quote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupInfo {
    group_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reaction {
    emoji: String,
    target_sent_timestamp: i64,
    #[serde(default)]
    is_remove: bool,
}

#[derive(Debug, Deserialize)]
struct Quote {
    id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignalGroup {
    id: String,
    #[serde(default)]
    members: Vec<SignalGroupMember>,
}

#[derive(Debug, Deserialize)]
struct SignalGroupMember {
    number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignalContact {
    number: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    profile_name: Option<String>,
}

impl SignalContact {
    fn display_name(&self) -> Option<String> {
        self.name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| self.profile_name.clone().filter(|n| !n.is_empty()))
    }
}

impl Envelope {
    /// Normalize one envelope into an event, or `None` for anything the bot
    /// does not care about (receipts, typing indicators, own sync messages).
    fn into_event(self, own_account: &str) -> Option<InboundEvent> {
        if self.source == own_account {
            return None;
        }
        let sender_name = self.source_name.clone().unwrap_or_else(|| self.source.clone());
        let data = self.data_message?;

        if let Some(reaction) = data.reaction {
            return Some(InboundEvent::Reaction(ReactionEvent {
                sender: self.source,
                sender_name,
                target_message_id: reaction.target_sent_timestamp,
                emoji: reaction.emoji,
                is_removal: reaction.is_remove,
            }));
        }

        let body = data.message?;
        let destination = match data.group_info {
            Some(info) => Destination::Group(info.group_id),
            None => Destination::Direct(self.source.clone()),
        };
        Some(InboundEvent::Text(TextEvent {
            sender: self.source,
            sender_name,
            destination,
            timestamp: data.timestamp,
            quote_token: data.quote.map(|q| q.id),
            body,
        }))
    }
}
