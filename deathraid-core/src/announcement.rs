use deathraid_database::PartyId;

/// Notifications produced by the state machine for the host to deliver.
///
/// Rendering them into chat is the host's concern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Announcement {
    /// Server-wide: the party's protection is down until `expires_at`.
    RaidOpened {
        party: PartyId,
        expires_at: u64,
        duration_secs: u64,
    },
    /// Server-wide: the party's protection is back.
    RaidEnded { party: PartyId },
    /// Party-only: progress towards the threshold.
    PartyDeaths {
        party: PartyId,
        count: u64,
        remaining: u64,
    },
}

impl Announcement {
    pub fn is_broadcast(&self) -> bool {
        !matches!(self, Self::PartyDeaths { .. })
    }
}
