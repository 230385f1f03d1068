//! Status resolver — the single authoritative status for a (user, date).
//!
//! Precedence, highest first: TDY absence, leave absence, explicit response,
//! "Not Checked In". Administrative absence records override self-reported
//! check-ins. The store is re-read on every call; there is no cache to
//! invalidate.

use chrono::NaiveDate;

use muster_core::error::Result;
use muster_core::types::{AbsenceKind, GroupMember};
use muster_store::MusterStore;

pub const STATUS_TDY: &str = "TDY";
pub const STATUS_ON_LEAVE: &str = "On Leave";
pub const STATUS_NOT_CHECKED_IN: &str = "Not Checked In";

/// The resolved status for one (user, date).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveStatus {
    pub status: String,
    pub detail: Option<String>,
}

/// Resolve one user's effective status for a date.
pub fn resolve(store: &MusterStore, user_id: &str, date: NaiveDate) -> Result<EffectiveStatus> {
    if let Some(absence) = store.absence_covering(user_id, date)? {
        return Ok(match absence.kind {
            AbsenceKind::TemporaryDuty => EffectiveStatus {
                status: STATUS_TDY.into(),
                detail: absence.description,
            },
            AbsenceKind::Leave => EffectiveStatus {
                status: STATUS_ON_LEAVE.into(),
                detail: None,
            },
        });
    }

    if let Some(response) = store.response_for(user_id, date)? {
        return Ok(EffectiveStatus {
            status: response.status,
            detail: response.detail,
        });
    }

    Ok(EffectiveStatus {
        status: STATUS_NOT_CHECKED_IN.into(),
        detail: None,
    })
}

/// Resolve every group member for a date, in membership order. This is the
/// input to the daily summary.
pub fn resolve_all(
    store: &MusterStore,
    members: &[GroupMember],
    date: NaiveDate,
) -> Result<Vec<(GroupMember, EffectiveStatus)>> {
    let mut resolved = Vec::with_capacity(members.len());
    for member in members {
        let status = resolve(store, &member.id, date)?;
        resolved.push((member.clone(), status));
    }
    Ok(resolved)
}
