use serde::{Deserialize, Serialize};

use crate::model::party::PartyId;

/// A time-boxed period during which a party's claim protection is disabled.
///
/// Timestamps are unix seconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaidWindow {
    pub party: PartyId,
    pub opened_at: u64,
    pub expires_at: u64,
    pub active: bool,
}

impl RaidWindow {
    pub fn open(party: PartyId, now: u64, duration_secs: u64) -> Self {
        Self {
            party,
            opened_at: now,
            expires_at: now.saturating_add(duration_secs),
            active: true,
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    /// Seconds left before the window expires, zero once it has.
    pub fn remaining_secs(&self, now: u64) -> u64 {
        self.expires_at.saturating_sub(now)
    }
}
