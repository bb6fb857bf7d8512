use serde::{Deserialize, Serialize};

pub const DEFAULT_DEATH_THRESHOLD: u32 = 20;
pub const DEFAULT_RAID_DURATION_MINUTES: u32 = 30;
pub const DEFAULT_ANNOUNCEMENT_INTERVAL_DEATHS: u32 = 5;
pub const DEFAULT_SAVE_INTERVAL_MINUTES: u32 = 5;

/// Tunables for death tracking and raid windows.
///
/// Numeric fields have a floor of 1; [`RaidConfig::clamped`] enforces it for values read
/// from storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaidConfig {
    pub death_threshold: u32,
    pub raid_duration_minutes: u32,
    pub broadcast_alerts_enabled: bool,
    pub party_announcement_enabled: bool,
    pub announcement_interval_deaths: u32,
    pub save_interval_minutes: u32,
}

impl Default for RaidConfig {
    fn default() -> Self {
        Self {
            death_threshold: DEFAULT_DEATH_THRESHOLD,
            raid_duration_minutes: DEFAULT_RAID_DURATION_MINUTES,
            broadcast_alerts_enabled: true,
            party_announcement_enabled: true,
            announcement_interval_deaths: DEFAULT_ANNOUNCEMENT_INTERVAL_DEATHS,
            save_interval_minutes: DEFAULT_SAVE_INTERVAL_MINUTES,
        }
    }
}

impl RaidConfig {
    pub fn clamped(self) -> Self {
        Self {
            death_threshold: self.death_threshold.max(1),
            raid_duration_minutes: self.raid_duration_minutes.max(1),
            announcement_interval_deaths: self.announcement_interval_deaths.max(1),
            save_interval_minutes: self.save_interval_minutes.max(1),
            ..self
        }
    }

    pub fn raid_duration_secs(&self) -> u64 {
        u64::from(self.raid_duration_minutes) * 60
    }

    pub fn save_interval_secs(&self) -> u64 {
        u64::from(self.save_interval_minutes) * 60
    }
}
