//! Calendar policy: which dates are workdays.

use chrono::{Datelike, NaiveDate, Weekday};

use muster_core::error::Result;
use muster_store::MusterStore;

/// Saturday or Sunday.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// A workday is a weekday with no holiday recorded. The daily prompt, the
/// reminder sweep, and the summary each gate on this independently, since
/// any of them can be invoked manually as well as from the scheduler.
pub fn is_workday(store: &MusterStore, date: NaiveDate) -> Result<bool> {
    if is_weekend(date) {
        return Ok(false);
    }
    Ok(!store.is_holiday(date)?)
}
