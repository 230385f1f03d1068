//! Check-in orchestrator — posts the daily prompt, routes reactions and
//! follow-up replies, sends reminders, and builds the daily summary.
//!
//! Per (user, date) the flow is NoResponse → AwaitingDetail → Finalized,
//! where AwaitingDetail only exists for statuses whose catalog entry carries
//! a follow-up prompt. A fresh reaction reopens a finalized flow: response
//! writes are upserts keyed on (user, date), so the last reaction wins.

use chrono::NaiveDate;
use std::sync::Arc;

use muster_core::error::Result;
use muster_core::traits::Transport;
use muster_core::types::{Destination, ReactionEvent, Response, TextEvent};
use muster_store::MusterStore;

use crate::calendar;
use crate::catalog;
use crate::correlation::CorrelationStore;
use crate::resolver;

/// The orchestrator. One per process; collaborators are injected.
pub struct CheckinOrchestrator {
    transport: Arc<dyn Transport>,
    store: Arc<MusterStore>,
    correlations: CorrelationStore,
    group_id: String,
    /// The bot's own account; excluded from reminders.
    bot_id: String,
}

impl CheckinOrchestrator {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<MusterStore>,
        group_id: String,
        bot_id: String,
    ) -> Self {
        Self {
            transport,
            store,
            correlations: CorrelationStore::new(),
            group_id,
            bot_id,
        }
    }

    /// Post the daily check-in prompt to the group and register its outbound
    /// id as an outstanding prompt for `today`. No-op outside workdays.
    pub async fn post_daily_prompt(&self, today: NaiveDate) -> Result<()> {
        if !calendar::is_workday(&self.store, today)? {
            tracing::debug!("Skipping daily prompt: {today} is not a workday");
            return Ok(());
        }

        let message = format!(
            "*Good morning! Please check in for {today} by reacting to this message.* ☀️\n\n{}",
            catalog::instructions()
        );
        let prompt_id = self
            .transport
            .send(&Destination::Group(self.group_id.clone()), &message)
            .await?;
        self.correlations.register_prompt(prompt_id, today);
        tracing::info!("Posted daily prompt for {today} (message {prompt_id})");
        Ok(())
    }

    /// Route an inbound reaction. Reactions to messages that are not
    /// check-in prompts are ignored; unknown emojis get an explanation DM
    /// and mutate nothing.
    pub async fn route_reaction(&self, reaction: &ReactionEvent) -> Result<()> {
        let Some(date) = self
            .correlations
            .resolve_prompt_date(reaction.target_message_id)
        else {
            return Ok(()); // Not a reaction to a check-in prompt.
        };

        let Some(entry) = catalog::lookup(&reaction.emoji) else {
            self.transport
                .send(
                    &Destination::Direct(reaction.sender.clone()),
                    &format!(
                        "I don't understand the '{}' emoji. Please react with one of the \
                         emojis from the daily check-in message.",
                        reaction.emoji
                    ),
                )
                .await?;
            return Ok(());
        };

        if let Some(prompt) = entry.prompt {
            // Detail needed: DM the question and wait for a quoted reply.
            let token = self
                .transport
                .send(&Destination::Direct(reaction.sender.clone()), prompt)
                .await?;
            if let Some(replaced) =
                self.correlations
                    .open_follow_up(&reaction.sender, token, entry.text, date)
            {
                tracing::debug!(
                    "Replaced pending follow-up for {} (stale token {})",
                    reaction.sender,
                    replaced.token
                );
            }
        } else {
            self.finalize_response(&reaction.sender, &reaction.sender_name, date, entry.text, None)
                .await?;
        }
        Ok(())
    }

    /// Route an inbound DM as a possible follow-up reply. Returns true when
    /// the message was consumed as a follow-up. Replies that do not quote
    /// the expected detail prompt are not consumed.
    pub async fn route_follow_up_reply(&self, event: &TextEvent) -> Result<bool> {
        let Some(token) = event.quote_token else {
            return Ok(false);
        };
        let Some(pending) = self
            .correlations
            .take_follow_up_quoting(&event.sender, token)
        else {
            return Ok(false);
        };

        self.finalize_response(
            &event.sender,
            &event.sender_name,
            pending.date,
            &pending.status,
            Some(event.body.clone()),
        )
        .await?;
        Ok(true)
    }

    /// Remind every group member who has no response for `today`, is not
    /// covered by an absence record, and is not the bot. One failed DM does
    /// not abort the remaining sweep. No-op outside workdays.
    pub async fn send_reminders(&self, today: NaiveDate) -> Result<()> {
        if !calendar::is_workday(&self.store, today)? {
            tracing::debug!("Skipping reminders: {today} is not a workday");
            return Ok(());
        }

        let members = self.transport.group_members(&self.group_id).await?;
        let responded: Vec<String> = self
            .store
            .responses_for_date(today)?
            .into_iter()
            .map(|r| r.user_id)
            .collect();

        let mut sent = 0usize;
        for member in &members {
            if member.id == self.bot_id || responded.contains(&member.id) {
                continue;
            }
            if self.store.absence_covering(&member.id, today)?.is_some() {
                continue;
            }
            match self
                .transport
                .send(
                    &Destination::Direct(member.id.clone()),
                    "Just a friendly reminder to please check in for today. ☀️",
                )
                .await
            {
                Ok(_) => sent += 1,
                Err(e) => tracing::warn!("Reminder to {} failed: {e}", member.id),
            }
        }
        tracing::info!("Sent {sent} reminder(s) for {today}");
        Ok(())
    }

    /// Resolve every member and post the summary to the group. No-op outside
    /// workdays.
    pub async fn build_and_post_summary(&self, today: NaiveDate) -> Result<()> {
        if !calendar::is_workday(&self.store, today)? {
            tracing::debug!("Skipping summary: {today} is not a workday");
            return Ok(());
        }

        let members = self.transport.group_members(&self.group_id).await?;
        let resolved = resolver::resolve_all(&self.store, &members, today)?;

        let mut summary = format!("*Daily Status Summary for {today}*\n");
        for (member, status) in &resolved {
            if member.id == self.bot_id {
                continue;
            }
            let detail = status
                .detail
                .as_deref()
                .map(|d| format!(" ({d})"))
                .unwrap_or_default();
            summary.push_str(&format!("\n• {}: *{}*{}", member.name, status.status, detail));
        }

        self.transport
            .send(&Destination::Group(self.group_id.clone()), &summary)
            .await?;
        tracing::info!("Posted daily summary for {today}");
        Ok(())
    }

    /// Upsert the response row and acknowledge the user. A store failure is
    /// logged and turned into a generic apology; it never propagates into
    /// the event loop.
    async fn finalize_response(
        &self,
        user_id: &str,
        user_name: &str,
        date: NaiveDate,
        status: &str,
        detail: Option<String>,
    ) -> Result<()> {
        let response = Response {
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            date,
            status: status.to_string(),
            detail: detail.clone(),
        };

        let ack = match self.store.upsert_response(&response) {
            Ok(()) => match detail {
                Some(d) => format!(
                    "Got it! Your status has been updated to '{status}' with the details: '{d}'."
                ),
                None => format!("Thanks for checking in! I've marked you as '{status}' for {date}."),
            },
            Err(e) => {
                tracing::error!("Failed to record response for {user_id}: {e}");
                "Sorry, I could not record your status. Please try again.".to_string()
            }
        };

        self.transport
            .send(&Destination::Direct(user_id.to_string()), &ack)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use muster_core::error::MusterError;
    use muster_core::types::{GroupMember, MessageId};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI64, Ordering};

    const GROUP: &str = "group.muster==";
    const BOT: &str = "+15550000";

    /// Records every send and hands out sequential message ids.
    struct MockTransport {
        sent: Mutex<Vec<(Destination, String)>>,
        members: Vec<GroupMember>,
        next_id: AtomicI64,
        fail_direct: Mutex<Vec<String>>,
    }

    impl MockTransport {
        fn new(members: Vec<GroupMember>) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                members,
                next_id: AtomicI64::new(1000),
                fail_direct: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<(Destination, String)> {
            self.sent.lock().unwrap().clone()
        }

        fn fail_sends_to(&self, user: &str) {
            self.fail_direct.lock().unwrap().push(user.to_string());
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        fn name(&self) -> &str {
            "mock"
        }

        async fn send(&self, destination: &Destination, text: &str) -> Result<MessageId> {
            if let Destination::Direct(user) = destination
                && self.fail_direct.lock().unwrap().contains(user)
            {
                return Err(MusterError::Transport(format!("send to {user} refused")));
            }
            self.sent
                .lock()
                .unwrap()
                .push((destination.clone(), text.to_string()));
            Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
        }

        async fn group_members(&self, _group_id: &str) -> Result<Vec<GroupMember>> {
            Ok(self.members.clone())
        }
    }

    fn member(id: &str, name: &str) -> GroupMember {
        GroupMember { id: id.into(), name: name.into() }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn monday() -> NaiveDate {
        d(2024, 10, 28)
    }

    fn build(members: Vec<GroupMember>) -> (Arc<MockTransport>, Arc<MusterStore>, CheckinOrchestrator) {
        let transport = Arc::new(MockTransport::new(members));
        let store = Arc::new(MusterStore::open_in_memory().unwrap());
        let orch = CheckinOrchestrator::new(
            transport.clone(),
            store.clone(),
            GROUP.into(),
            BOT.into(),
        );
        (transport, store, orch)
    }

    fn reaction(sender: &str, target: MessageId, emoji: &str) -> ReactionEvent {
        ReactionEvent {
            sender: sender.into(),
            sender_name: format!("User {sender}"),
            target_message_id: target,
            emoji: emoji.into(),
            is_removal: false,
        }
    }

    fn reply(sender: &str, quote: Option<MessageId>, body: &str) -> TextEvent {
        TextEvent {
            sender: sender.into(),
            sender_name: format!("User {sender}"),
            destination: Destination::Direct(BOT.into()),
            timestamp: 42,
            quote_token: quote,
            body: body.into(),
        }
    }

    #[tokio::test]
    async fn test_prompt_posted_on_workday_and_registered() {
        let (transport, _store, orch) = build(vec![]);
        orch.post_daily_prompt(monday()).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Destination::Group(GROUP.into()));
        assert!(sent[0].1.contains("check in for 2024-10-28"));
        assert!(sent[0].1.contains("✅ (search 'checkmark')"));
        // First mock id is 1000.
        assert_eq!(orch.correlations.resolve_prompt_date(1000), Some(monday()));
    }

    #[tokio::test]
    async fn test_prompt_skipped_on_weekend_and_holiday() {
        let (transport, store, orch) = build(vec![]);
        orch.post_daily_prompt(d(2024, 10, 27)).await.unwrap(); // Sunday
        store.add_holiday(d(2024, 10, 28), "Training holiday").unwrap();
        orch.post_daily_prompt(d(2024, 10, 28)).await.unwrap();
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_no_detail_reaction_finalizes_immediately() {
        let (transport, store, orch) = build(vec![]);
        orch.post_daily_prompt(monday()).await.unwrap();

        orch.route_reaction(&reaction("+15550001", 1000, "✅")).await.unwrap();

        let saved = store.response_for("+15550001", monday()).unwrap().unwrap();
        assert_eq!(saved.status, "In at Normal Time");
        assert_eq!(saved.detail, None);
        assert!(orch.correlations.pending_for("+15550001").is_none());

        let sent = transport.sent();
        let ack = &sent.last().unwrap().1;
        assert!(ack.contains("marked you as 'In at Normal Time'"));
    }

    #[tokio::test]
    async fn test_reaction_to_unknown_message_is_ignored() {
        let (transport, store, orch) = build(vec![]);
        orch.route_reaction(&reaction("+15550001", 4242, "✅")).await.unwrap();
        assert!(transport.sent().is_empty());
        assert!(store.response_for("+15550001", monday()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_emoji_explains_and_mutates_nothing() {
        let (transport, store, orch) = build(vec![]);
        orch.post_daily_prompt(monday()).await.unwrap();

        orch.route_reaction(&reaction("+15550001", 1000, "👍")).await.unwrap();

        let sent = transport.sent();
        let dm = sent.last().unwrap();
        assert_eq!(dm.0, Destination::Direct("+15550001".into()));
        assert!(dm.1.contains("don't understand the '👍' emoji"));
        assert!(store.response_for("+15550001", monday()).unwrap().is_none());
        assert!(orch.correlations.pending_for("+15550001").is_none());
    }

    #[tokio::test]
    async fn test_detail_reaction_opens_follow_up_then_reply_finalizes() {
        let (transport, store, orch) = build(vec![]);
        orch.post_daily_prompt(monday()).await.unwrap();

        orch.route_reaction(&reaction("+15550002", 1000, "🗓️")).await.unwrap();

        // The DM prompt (id 1001) opened exactly one pending follow-up.
        let pending = orch.correlations.pending_for("+15550002").unwrap();
        assert_eq!(pending.token, 1001);
        assert_eq!(pending.status, "Appointment");
        assert!(store.response_for("+15550002", monday()).unwrap().is_none());

        let consumed = orch
            .route_follow_up_reply(&reply("+15550002", Some(1001), "9am dentist"))
            .await
            .unwrap();
        assert!(consumed);

        let saved = store.response_for("+15550002", monday()).unwrap().unwrap();
        assert_eq!(saved.status, "Appointment");
        assert_eq!(saved.detail.as_deref(), Some("9am dentist"));
        assert!(orch.correlations.pending_for("+15550002").is_none());
        assert!(transport.sent().last().unwrap().1.contains("9am dentist"));
    }

    #[tokio::test]
    async fn test_second_reaction_stales_first_follow_up_token() {
        let (_transport, store, orch) = build(vec![]);
        orch.post_daily_prompt(monday()).await.unwrap();

        orch.route_reaction(&reaction("+15550002", 1000, "⏱️")).await.unwrap();
        orch.route_reaction(&reaction("+15550002", 1000, "🗓️")).await.unwrap();

        // Exactly one pending follow-up remains, keyed to the second DM.
        let pending = orch.correlations.pending_for("+15550002").unwrap();
        assert_eq!(pending.token, 1002);
        assert_eq!(pending.status, "Appointment");

        // The stale token can no longer finalize anything.
        let stale = orch
            .route_follow_up_reply(&reply("+15550002", Some(1001), "about 10"))
            .await
            .unwrap();
        assert!(!stale);
        assert!(store.response_for("+15550002", monday()).unwrap().is_none());

        let fresh = orch
            .route_follow_up_reply(&reply("+15550002", Some(1002), "9am dentist"))
            .await
            .unwrap();
        assert!(fresh);
        assert_eq!(
            store.response_for("+15550002", monday()).unwrap().unwrap().status,
            "Appointment"
        );
    }

    #[tokio::test]
    async fn test_unquoted_dm_is_not_consumed() {
        let (_transport, store, orch) = build(vec![]);
        orch.post_daily_prompt(monday()).await.unwrap();
        orch.route_reaction(&reaction("+15550002", 1000, "❓")).await.unwrap();

        let consumed = orch
            .route_follow_up_reply(&reply("+15550002", None, "unrelated message"))
            .await
            .unwrap();
        assert!(!consumed);
        // The follow-up is still pending.
        assert!(orch.correlations.pending_for("+15550002").is_some());
        assert!(store.response_for("+15550002", monday()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_re_reaction_replaces_finalized_status() {
        let (_transport, store, orch) = build(vec![]);
        orch.post_daily_prompt(monday()).await.unwrap();

        orch.route_reaction(&reaction("+15550001", 1000, "✅")).await.unwrap();
        orch.route_reaction(&reaction("+15550001", 1000, "🏠")).await.unwrap();

        let saved = store.response_for("+15550001", monday()).unwrap().unwrap();
        assert_eq!(saved.status, "Working from Home");
        assert_eq!(store.responses_for_date(monday()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_yields_apology_not_error() {
        let (transport, store, orch) = build(vec![]);
        orch.post_daily_prompt(monday()).await.unwrap();
        store.break_table("responses").unwrap();

        // The write fails, the event loop must not see an error, and the
        // user gets the generic apology instead of a confirmation.
        orch.route_reaction(&reaction("+15550001", 1000, "✅")).await.unwrap();

        let dm = transport.sent().last().unwrap().clone();
        assert_eq!(dm.0, Destination::Direct("+15550001".into()));
        assert!(dm.1.contains("could not record your status"));
    }

    #[tokio::test]
    async fn test_reminders_skip_responders_absentees_and_bot() {
        let members = vec![
            member(BOT, "MusterBot"),
            member("+15550001", "Alpha"),
            member("+15550002", "Bravo"),
            member("+15550003", "Charlie"),
        ];
        let (transport, store, orch) = build(members);
        orch.post_daily_prompt(monday()).await.unwrap();
        orch.route_reaction(&reaction("+15550001", 1000, "✅")).await.unwrap();
        store
            .add_leave("+15550003", "Charlie", d(2024, 10, 27), d(2024, 10, 29))
            .unwrap();

        orch.send_reminders(monday()).await.unwrap();

        let reminders: Vec<_> = transport
            .sent()
            .into_iter()
            .filter(|(_, text)| text.contains("friendly reminder"))
            .collect();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].0, Destination::Direct("+15550002".into()));
    }

    #[tokio::test]
    async fn test_reminder_failure_does_not_abort_sweep() {
        let members = vec![
            member("+15550001", "Alpha"),
            member("+15550002", "Bravo"),
        ];
        let (transport, _store, orch) = build(members);
        transport.fail_sends_to("+15550001");

        orch.send_reminders(monday()).await.unwrap();

        let reminders: Vec<_> = transport
            .sent()
            .into_iter()
            .filter(|(_, text)| text.contains("friendly reminder"))
            .collect();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].0, Destination::Direct("+15550002".into()));
    }

    #[tokio::test]
    async fn test_summary_scenario_monday_2024_10_28() {
        // Alice reacts ✅, Bob reacts 🗓️ and replies "9am dentist",
        // C is on leave 10-27..10-29 and never reacts.
        let members = vec![
            member("+15550001", "Alice"),
            member("+15550002", "Bob"),
            member("+15550003", "Carol"),
        ];
        let (transport, store, orch) = build(members);
        store
            .add_leave("+15550003", "Carol", d(2024, 10, 27), d(2024, 10, 29))
            .unwrap();

        orch.post_daily_prompt(monday()).await.unwrap();
        orch.route_reaction(&reaction("+15550001", 1000, "✅")).await.unwrap();
        orch.route_reaction(&reaction("+15550002", 1000, "🗓️")).await.unwrap();
        let pending = orch.correlations.pending_for("+15550002").unwrap();
        orch.route_follow_up_reply(&reply("+15550002", Some(pending.token), "9am dentist"))
            .await
            .unwrap();

        orch.build_and_post_summary(monday()).await.unwrap();

        let summary = transport
            .sent()
            .into_iter()
            .rev()
            .find(|(dest, _)| *dest == Destination::Group(GROUP.into()))
            .unwrap()
            .1;
        assert!(summary.contains("Daily Status Summary for 2024-10-28"));
        assert!(summary.contains("• Alice: *In at Normal Time*"));
        assert!(summary.contains("• Bob: *Appointment* (9am dentist)"));
        assert!(summary.contains("• Carol: *On Leave*"));
        assert!(!summary.contains("Not Checked In"));
    }

    #[tokio::test]
    async fn test_summary_skipped_on_non_workday() {
        let (transport, _store, orch) = build(vec![member("+15550001", "Alice")]);
        orch.build_and_post_summary(d(2024, 10, 26)).await.unwrap(); // Saturday
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_late_reaction_to_stale_prompt_counts_for_its_date() {
        let (_transport, store, orch) = build(vec![]);
        let friday = d(2024, 10, 25);
        orch.post_daily_prompt(friday).await.unwrap();
        orch.post_daily_prompt(monday()).await.unwrap();

        // Reacting to Friday's prompt on Monday records a Friday response.
        orch.route_reaction(&reaction("+15550001", 1000, "🤒")).await.unwrap();
        let saved = store.response_for("+15550001", friday).unwrap().unwrap();
        assert_eq!(saved.status, "Out Sick");
        assert!(store.response_for("+15550001", monday()).unwrap().is_none());
    }
}
