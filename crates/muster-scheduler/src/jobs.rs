//! The three scheduled jobs. Job identity is the name; recomputation
//! replaces a job's trigger wholesale rather than mutating it.

/// A named scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    /// Post the daily check-in prompt.
    Checkin,
    /// DM non-responders.
    Reminder,
    /// Post the daily summary.
    Summary,
}

impl Job {
    pub const ALL: [Job; 3] = [Job::Checkin, Job::Reminder, Job::Summary];

    /// The `config` table key holding this job's HH:MM local time.
    pub fn config_key(self) -> &'static str {
        match self {
            Job::Checkin => "checkin_time",
            Job::Reminder => "reminder_time",
            Job::Summary => "summary_time",
        }
    }

    /// Fallback local time when the key is missing or unparseable.
    pub fn default_time(self) -> &'static str {
        match self {
            Job::Checkin => "08:00",
            Job::Reminder => "10:00",
            Job::Summary => "11:00",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Job::Checkin => "checkin",
            Job::Reminder => "reminder",
            Job::Summary => "summary",
        }
    }
}
