//! Scheduler engine — arms one tokio task per job and swaps them atomically
//! on recomputation.
//!
//! Firings are delivered as `Job` values on an mpsc channel; the event loop
//! in the binary maps them onto orchestrator operations, which keeps all
//! core handling on one stream.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use muster_core::error::Result;
use muster_store::MusterStore;

use crate::jobs::Job;
use crate::recurrence::{next_weekday_fire, parse_hhmm};

struct ArmedTrigger {
    next_fire: DateTime<Utc>,
    handle: JoinHandle<()>,
}

/// The scheduler. Triggers are recreated, never mutated: each recompute
/// cancels a job's old task before arming the new one, under one lock, so a
/// stale trigger can never fire the previous schedule.
pub struct Scheduler {
    store: Arc<MusterStore>,
    tx: UnboundedSender<Job>,
    armed: Mutex<HashMap<Job, ArmedTrigger>>,
}

impl Scheduler {
    pub fn new(store: Arc<MusterStore>, tx: UnboundedSender<Job>) -> Self {
        Self {
            store,
            tx,
            armed: Mutex::new(HashMap::new()),
        }
    }

    /// The configured IANA time zone, defaulting to UTC when unset or
    /// unrecognized (with a logged warning).
    pub fn timezone(&self) -> Tz {
        let name = self
            .store
            .config_get("timezone")
            .ok()
            .flatten()
            .unwrap_or_else(|| "UTC".to_string());
        match name.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                tracing::warn!("Unknown timezone in config: {name}. Defaulting to UTC.");
                chrono_tz::UTC
            }
        }
    }

    /// Today's date in the configured time zone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone()).date_naive()
    }

    /// Recompute and re-arm every job from the current config table.
    /// Idempotent: unchanged config yields the same next-firing instants.
    /// Failing to read the config at all is the caller's problem — at
    /// startup that aborts the process rather than running unscheduled.
    pub fn recompute(&self) -> Result<()> {
        self.recompute_at(Utc::now())
    }

    fn recompute_at(&self, now: DateTime<Utc>) -> Result<()> {
        let tz = self.timezone();
        let mut armed = self.armed.lock().unwrap_or_else(|e| e.into_inner());

        for job in Job::ALL {
            let configured = self
                .store
                .config_get(job.config_key())?
                .unwrap_or_else(|| job.default_time().to_string());
            let local_time = match parse_hhmm(&configured) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(
                        "Bad {} '{}' ({e}); using default {}",
                        job.config_key(),
                        configured,
                        job.default_time()
                    );
                    parse_hhmm(job.default_time()).unwrap_or(chrono::NaiveTime::MIN)
                }
            };

            let next_fire = next_weekday_fire(now, local_time, tz);

            // Cancel-then-arm: the old trigger must be gone before the new
            // one exists.
            if let Some(old) = armed.remove(&job) {
                old.handle.abort();
            }
            let handle = spawn_trigger(job, next_fire, local_time, tz, self.tx.clone());
            armed.insert(job, ArmedTrigger { next_fire, handle });

            tracing::info!(
                "Scheduled {} at {} {} (next fire {} UTC)",
                job.name(),
                configured,
                tz,
                next_fire.format("%Y-%m-%d %H:%M")
            );
        }
        Ok(())
    }

    /// The armed next-firing instants, by job.
    pub fn next_firings(&self) -> HashMap<Job, DateTime<Utc>> {
        let armed = self.armed.lock().unwrap_or_else(|e| e.into_inner());
        armed.iter().map(|(job, t)| (*job, t.next_fire)).collect()
    }

    /// Cancel every armed trigger.
    pub fn shutdown(&self) {
        let mut armed = self.armed.lock().unwrap_or_else(|e| e.into_inner());
        for (_, trigger) in armed.drain() {
            trigger.handle.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One trigger task: sleep until the firing instant, emit the job, then
/// re-arm for the next weekday occurrence.
fn spawn_trigger(
    job: Job,
    first_fire: DateTime<Utc>,
    local_time: chrono::NaiveTime,
    tz: Tz,
    tx: UnboundedSender<Job>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut next_fire = first_fire;
        loop {
            let now = Utc::now();
            if next_fire > now
                && let Ok(wait) = (next_fire - now).to_std()
            {
                tokio::time::sleep(wait).await;
            }
            if tx.send(job).is_err() {
                tracing::debug!("Trigger {} stopped (receiver dropped)", job.name());
                return;
            }
            next_fire = next_weekday_fire(Utc::now(), local_time, tz);
        }
    })
}
