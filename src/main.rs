//! # MusterBot — Daily Attendance Check-in Bot
//!
//! Posts a daily check-in prompt to a Signal group, collects emoji-reaction
//! statuses (with free-text follow-ups where a status needs one), reminds
//! non-responders, and posts a daily summary reconciled against leave, TDY,
//! and holidays.
//!
//! Usage:
//!   musterbot                            # Run with ~/.musterbot/config.toml
//!   musterbot --config ./muster.toml     # Custom config file
//!   musterbot --db ./muster.db           # Override database path

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use muster_checkin::CheckinOrchestrator;
use muster_commands::CommandRouter;
use muster_core::config::MusterConfig;
use muster_core::traits::Transport;
use muster_core::types::{Destination, InboundEvent};
use muster_scheduler::{Job, Scheduler};
use muster_signal::SignalTransport;
use muster_store::MusterStore;

#[derive(Parser)]
#[command(
    name = "musterbot",
    version,
    about = "☀️ MusterBot — daily attendance check-in over Signal"
)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, default_value = "~/.musterbot/config.toml")]
    config: String,

    /// Database path (overrides the config file)
    #[arg(long)]
    db: Option<String>,

    /// Post one message (checkin, reminder, or summary) and exit
    #[arg(long, value_name = "JOB")]
    post: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "musterbot=debug,muster_checkin=debug,muster_scheduler=debug,muster_signal=debug,muster_commands=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    // Load config
    let config_path = expand_path(&cli.config);
    let config = MusterConfig::load_from(std::path::Path::new(&config_path))
        .with_context(|| format!("failed to load config from {config_path}"))?;

    // Open database
    let db_path = expand_path(cli.db.as_deref().unwrap_or(&config.database_path));
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = Arc::new(MusterStore::open(std::path::Path::new(&db_path))?);
    tracing::info!("💾 Database ready at {db_path}");

    // Transport
    let signal = Arc::new(SignalTransport::new(
        config.signal.clone(),
        config.account.clone(),
    ));
    let transport: Arc<dyn Transport> = signal.clone();

    // Core components
    let orchestrator = Arc::new(CheckinOrchestrator::new(
        transport.clone(),
        store.clone(),
        config.group_id.clone(),
        config.account.clone(),
    ));
    let (job_tx, mut job_rx) = tokio::sync::mpsc::unbounded_channel::<Job>();
    let scheduler = Arc::new(Scheduler::new(store.clone(), job_tx));

    // --post: run one operation for today and exit.
    if let Some(job) = &cli.post {
        let today = scheduler.today();
        match job.as_str() {
            "checkin" => orchestrator.post_daily_prompt(today).await?,
            "reminder" => orchestrator.send_reminders(today).await?,
            "summary" => orchestrator.build_and_post_summary(today).await?,
            other => anyhow::bail!("unknown job '{other}' (expected checkin, reminder, or summary)"),
        }
        return Ok(());
    }

    scheduler
        .recompute()
        .context("failed to arm the daily schedule")?;
    for (job, at) in scheduler.next_firings() {
        tracing::info!("⏰ {} next fires at {at}", job.name());
    }

    let commands = CommandRouter::new(
        store.clone(),
        orchestrator.clone(),
        scheduler.clone(),
        transport.clone(),
    );

    tracing::info!("☀️ MusterBot running as {} — Ctrl+C to stop", config.account);

    let mut events = signal.start_polling();
    loop {
        tokio::select! {
            Some(job) = job_rx.recv() => {
                let today = scheduler.today();
                let result = match job {
                    Job::Checkin => orchestrator.post_daily_prompt(today).await,
                    Job::Reminder => orchestrator.send_reminders(today).await,
                    Job::Summary => orchestrator.build_and_post_summary(today).await,
                };
                if let Err(e) = result {
                    tracing::error!("Scheduled {} job failed: {e}", job.name());
                }
            }
            Some(event) = events.next() => {
                if let Err(e) = handle_event(&orchestrator, &commands, &store, event).await {
                    tracing::error!("Event handling failed: {e}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                scheduler.shutdown();
                break;
            }
        }
    }

    Ok(())
}

/// Route one inbound event. Reactions go to the check-in correlator;
/// DM texts are tried as commands first, then as follow-up replies.
async fn handle_event(
    orchestrator: &CheckinOrchestrator,
    commands: &CommandRouter,
    store: &MusterStore,
    event: InboundEvent,
) -> Result<()> {
    match event {
        InboundEvent::Reaction(reaction) => {
            if reaction.is_removal {
                // A removed reaction never rescinds a recorded status.
                tracing::debug!("Ignoring reaction removal from {}", reaction.sender);
                return Ok(());
            }
            orchestrator.route_reaction(&reaction).await?;
        }
        InboundEvent::Text(text) => {
            store.log_message(
                &text.sender,
                &text.sender_name,
                text.destination.id(),
                text.timestamp,
                &text.body,
            )?;
            if matches!(text.destination, Destination::Direct(_)) {
                if commands.dispatch(&text).await? {
                    return Ok(());
                }
                if !orchestrator.route_follow_up_reply(&text).await? {
                    tracing::debug!("Unmatched DM from {}", text.sender);
                }
            }
        }
    }
    Ok(())
}
