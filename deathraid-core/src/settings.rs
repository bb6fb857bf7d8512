use std::sync::{PoisonError, RwLock};

use deathraid_database::model::raid_config::RaidConfig;

/// Runtime view of [`RaidConfig`]. Every setter clamps to the field's floor and returns the
/// value actually applied.
#[derive(Debug, Default)]
pub struct Settings {
    config: RwLock<RaidConfig>,
}

impl Settings {
    pub fn new(config: RaidConfig) -> Self {
        Self {
            config: RwLock::new(config.clamped()),
        }
    }

    pub fn snapshot(&self) -> RaidConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, config: RaidConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config.clamped();
    }

    fn update<R>(&self, f: impl FnOnce(&mut RaidConfig) -> R) -> R {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut config)
    }

    pub fn death_threshold(&self) -> u32 {
        self.snapshot().death_threshold
    }

    pub fn set_death_threshold(&self, threshold: u32) -> u32 {
        self.update(|config| {
            config.death_threshold = threshold.max(1);
            config.death_threshold
        })
    }

    pub fn raid_duration_minutes(&self) -> u32 {
        self.snapshot().raid_duration_minutes
    }

    /// Only affects windows opened afterwards.
    pub fn set_raid_duration_minutes(&self, minutes: u32) -> u32 {
        self.update(|config| {
            config.raid_duration_minutes = minutes.max(1);
            config.raid_duration_minutes
        })
    }

    pub fn broadcast_alerts_enabled(&self) -> bool {
        self.snapshot().broadcast_alerts_enabled
    }

    pub fn set_broadcast_alerts_enabled(&self, enabled: bool) -> bool {
        self.update(|config| {
            config.broadcast_alerts_enabled = enabled;
            enabled
        })
    }

    pub fn party_announcement_enabled(&self) -> bool {
        self.snapshot().party_announcement_enabled
    }

    pub fn set_party_announcement_enabled(&self, enabled: bool) -> bool {
        self.update(|config| {
            config.party_announcement_enabled = enabled;
            enabled
        })
    }

    pub fn announcement_interval_deaths(&self) -> u32 {
        self.snapshot().announcement_interval_deaths
    }

    pub fn set_announcement_interval_deaths(&self, interval: u32) -> u32 {
        self.update(|config| {
            config.announcement_interval_deaths = interval.max(1);
            config.announcement_interval_deaths
        })
    }

    pub fn save_interval_minutes(&self) -> u32 {
        self.snapshot().save_interval_minutes
    }

    /// Picked up by the flush task on its next cycle.
    pub fn set_save_interval_minutes(&self, minutes: u32) -> u32 {
        self.update(|config| {
            config.save_interval_minutes = minutes.max(1);
            config.save_interval_minutes
        })
    }
}
