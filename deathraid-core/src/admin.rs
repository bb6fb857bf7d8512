//! Queries and actions exposed to the external command layer.
//!
//! Configuration getters and setters live on [`crate::Settings`], reached through
//! [`DeathRaidCoordinator::settings`].

use tracing::info;

use deathraid_database::impls::raid_config::load_configuration;
use deathraid_database::model::raid_config::RaidConfig;
use deathraid_database::PartyId;
use deathraid_utils::formatting::deaths_until_raid;

use crate::coordinator::DeathRaidCoordinator;
use crate::error::RaidError;
use crate::gateway::ProtectionGateway;

/// Snapshot of a party's standing, as shown by a status command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartyStatus {
    pub party: PartyId,
    pub deaths: u64,
    pub threshold: u32,
    /// Deaths still needed before a window opens.
    pub remaining_deaths: u64,
    pub raid: Option<RaidStatus>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RaidStatus {
    pub opened_at: u64,
    pub expires_at: u64,
    pub remaining_secs: u64,
}

impl<G: ProtectionGateway> DeathRaidCoordinator<G> {
    pub fn death_count(&self, party: &PartyId) -> u64 {
        self.ledger().count(party)
    }

    /// Open-window details for `party`, or `None` when it is not raidable.
    pub fn raid_status(&self, party: &PartyId, now: u64) -> Option<RaidStatus> {
        self.registry().active(party).map(|window| RaidStatus {
            opened_at: window.opened_at,
            expires_at: window.expires_at,
            remaining_secs: window.remaining_secs(now),
        })
    }

    pub fn party_status(&self, party: &PartyId, now: u64) -> PartyStatus {
        let deaths = self.death_count(party);
        let threshold = self.settings().death_threshold();

        PartyStatus {
            party: party.clone(),
            deaths,
            threshold,
            remaining_deaths: deaths_until_raid(deaths, threshold),
            raid: self.raid_status(party, now),
        }
    }

    /// Re-read configuration from persistence, replacing runtime changes not yet saved.
    pub async fn reload_config(&self) -> Result<RaidConfig, RaidError> {
        let config = load_configuration(self.database())
            .await
            .map_err(RaidError::persistence)?;
        self.settings().replace(config);

        let applied = self.settings().snapshot();
        info!(
            death_threshold = applied.death_threshold,
            raid_duration_minutes = applied.raid_duration_minutes,
            "configuration reloaded"
        );
        Ok(applied)
    }
}
