//! # Muster Commands
//! The slash-command layer: a static token table mapped onto one dispatch
//! interface. Commands arrive as DMs; admin commands are additionally gated
//! on the `admins` table. The check-in core does not depend on this crate.

use std::sync::Arc;

use muster_checkin::CheckinOrchestrator;
use muster_core::error::Result;
use muster_core::traits::Transport;
use muster_core::types::{Destination, TextEvent};
use muster_scheduler::Scheduler;
use muster_store::MusterStore;

mod args;

use args::{AbsenceArgs, HolidayArgs};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Help,
    Status,
    Config,
    Holiday,
    Leave,
    Tdy,
    AddAdmin,
    PostCheckin,
    PostReminder,
    PostSummary,
}

struct CommandSpec {
    token: &'static str,
    command: Command,
    admin_only: bool,
}

/// The command table. Tokens are matched against the first word of a DM.
const COMMANDS: &[CommandSpec] = &[
    CommandSpec { token: "/help", command: Command::Help, admin_only: false },
    CommandSpec { token: "/status", command: Command::Status, admin_only: false },
    CommandSpec { token: "/config", command: Command::Config, admin_only: true },
    CommandSpec { token: "/holiday", command: Command::Holiday, admin_only: true },
    CommandSpec { token: "/leave", command: Command::Leave, admin_only: true },
    CommandSpec { token: "/tdy", command: Command::Tdy, admin_only: true },
    CommandSpec { token: "/add_admin", command: Command::AddAdmin, admin_only: true },
    CommandSpec { token: "/post_checkin", command: Command::PostCheckin, admin_only: true },
    CommandSpec { token: "/post_reminder", command: Command::PostReminder, admin_only: true },
    CommandSpec { token: "/post_summary", command: Command::PostSummary, admin_only: true },
];

fn match_command(body: &str) -> Option<(&'static CommandSpec, &str)> {
    let trimmed = body.trim_start();
    let token = trimmed.split_whitespace().next()?;
    let spec = COMMANDS.iter().find(|c| c.token == token)?;
    let rest = trimmed[token.len()..].trim();
    Some((spec, rest))
}

/// Routes admin/user commands. Everything it needs is injected.
pub struct CommandRouter {
    store: Arc<MusterStore>,
    orchestrator: Arc<CheckinOrchestrator>,
    scheduler: Arc<Scheduler>,
    transport: Arc<dyn Transport>,
}

impl CommandRouter {
    pub fn new(
        store: Arc<MusterStore>,
        orchestrator: Arc<CheckinOrchestrator>,
        scheduler: Arc<Scheduler>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self { store, orchestrator, scheduler, transport }
    }

    /// Handle a DM as a command. Returns true when the message was a
    /// recognized (and permitted) command, whether or not it succeeded.
    pub async fn dispatch(&self, event: &TextEvent) -> Result<bool> {
        // Commands only live in DMs; group chatter is never a command.
        if !matches!(event.destination, Destination::Direct(_)) {
            return Ok(false);
        }
        let Some((spec, rest)) = match_command(&event.body) else {
            return Ok(false);
        };
        if spec.admin_only && !self.store.is_admin(&event.sender)? {
            // As with the unrecognized case: no feedback for non-admins.
            return Ok(false);
        }

        let outcome = match spec.command {
            Command::Help => self.help(&event.sender).await,
            Command::Status => self.status(&event.sender, rest).await,
            Command::Config => self.config(&event.sender, rest).await,
            Command::Holiday => self.holiday(&event.sender, rest).await,
            Command::Leave => self.absence(&event.sender, rest, false).await,
            Command::Tdy => self.absence(&event.sender, rest, true).await,
            Command::AddAdmin => self.add_admin(&event.sender, rest).await,
            Command::PostCheckin => {
                self.orchestrator.post_daily_prompt(self.scheduler.today()).await
            }
            Command::PostReminder => {
                self.orchestrator.send_reminders(self.scheduler.today()).await
            }
            Command::PostSummary => {
                self.orchestrator
                    .build_and_post_summary(self.scheduler.today())
                    .await
            }
        };

        if let Err(e) = outcome {
            tracing::error!("Command {} failed: {e}", spec.token);
            self.reply(&event.sender, "Sorry, something went wrong handling that command.")
                .await?;
        }
        Ok(true)
    }

    async fn reply(&self, user: &str, text: &str) -> Result<()> {
        self.transport
            .send(&Destination::Direct(user.to_string()), text)
            .await?;
        Ok(())
    }

    async fn help(&self, sender: &str) -> Result<()> {
        let mut text = String::from("*MusterBot Commands*\n\n");
        text.push_str("*/help* - Show this help message\n");
        text.push_str(
            "*/status [date]* - Check your status for a given date \
             (e.g., /status 2024-10-27). Defaults to today.\n",
        );
        if self.store.is_admin(sender)? {
            text.push_str("\n*Admin Commands*\n");
            text.push_str("*/config [key] [value]* - View or set a configuration value (e.g., /config checkin_time 08:30)\n");
            text.push_str("*/holiday [add/remove] [YYYY-MM-DD] [description]* - Add or remove a holiday.\n");
            text.push_str("*/leave [add/remove] [user] [start_date] [end_date]* - Add or remove leave for a user.\n");
            text.push_str("*/tdy [add/remove] [user] [start_date] [end_date] [description]* - Add or remove TDY for a user.\n");
            text.push_str("*/add_admin [user]* - Add a new admin.\n");
            text.push_str("*/post_checkin* - Manually post the daily check-in message.\n");
            text.push_str("*/post_reminder* - Manually send reminders.\n");
            text.push_str("*/post_summary* - Manually post the daily summary.\n");
        }
        self.reply(sender, &text).await
    }

    async fn status(&self, sender: &str, rest: &str) -> Result<()> {
        let date = if rest.is_empty() {
            self.scheduler.today()
        } else {
            match args::parse_date(rest) {
                Ok(d) => d,
                Err(msg) => return self.reply(sender, &msg).await,
            }
        };
        let effective = muster_checkin::resolve(&self.store, sender, date)?;
        let detail = effective
            .detail
            .as_deref()
            .map(|d| format!(" ({d})"))
            .unwrap_or_default();
        self.reply(
            sender,
            &format!("Your status for {date}: *{}*{detail}", effective.status),
        )
        .await
    }

    async fn config(&self, sender: &str, rest: &str) -> Result<()> {
        let parts: Vec<&str> = rest.split_whitespace().collect();
        match parts.as_slice() {
            [] => {
                let mut text = String::from("*Current Configuration*\n");
                for (key, value) in self.store.config_all()? {
                    text.push_str(&format!("\n• {key}: {value}"));
                }
                self.reply(sender, &text).await
            }
            [key, value] => {
                self.store.config_set(key, value)?;
                self.reply(sender, &format!("Configuration updated: {key} = {value}"))
                    .await?;
                // Schedule times or timezone may have changed; re-arm.
                self.scheduler.recompute()?;
                Ok(())
            }
            _ => self.reply(sender, "Usage: /config [key] [value]").await,
        }
    }

    async fn holiday(&self, sender: &str, rest: &str) -> Result<()> {
        match args::parse_holiday(rest) {
            Ok(HolidayArgs::Add { date, description }) => {
                self.store.add_holiday(date, &description)?;
                self.reply(
                    sender,
                    &format!("Holiday '{description}' on {date} has been added. 🥳"),
                )
                .await
            }
            Ok(HolidayArgs::Remove { date }) => {
                self.store.remove_holiday(date)?;
                self.reply(sender, &format!("Holiday on {date} has been removed."))
                    .await
            }
            Err(msg) => self.reply(sender, &msg).await,
        }
    }

    async fn absence(&self, sender: &str, rest: &str, tdy: bool) -> Result<()> {
        let kind = if tdy { "TDY" } else { "Leave" };
        match args::parse_absence(rest, kind) {
            Ok(AbsenceArgs::Add { user, start, end, description }) => {
                if tdy {
                    self.store.add_tdy(&user, start, end, description.as_deref())?;
                } else {
                    self.store.add_leave(&user, &user, start, end)?;
                }
                self.reply(
                    sender,
                    &format!("{kind} has been added for {user} from {start} to {end}. 🌴"),
                )
                .await
            }
            Ok(AbsenceArgs::Remove { user, start }) => {
                let removed = if tdy {
                    self.store.remove_tdy(&user, start)?
                } else {
                    self.store.remove_leave(&user, start)?
                };
                let text = if removed > 0 {
                    format!("{kind} starting on {start} for {user} has been removed.")
                } else {
                    format!("No {kind} entry starting on {start} found for {user}.")
                };
                self.reply(sender, &text).await
            }
            Err(msg) => self.reply(sender, &msg).await,
        }
    }

    async fn add_admin(&self, sender: &str, rest: &str) -> Result<()> {
        let parts: Vec<&str> = rest.split_whitespace().collect();
        let [user] = parts.as_slice() else {
            return self.reply(sender, "Usage: /add_admin [user]").await;
        };
        self.store.add_admin(user)?;
        self.reply(sender, &format!("{user} has been added as an admin. 🛡️"))
            .await
    }
}
