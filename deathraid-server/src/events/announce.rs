use tracing::info;

use deathraid_core::Announcement;
use deathraid_utils::formatting::format_compact_duration;
use deathraid_utils::time::now_unix_secs;

/// Hand announcements to the host's chat layer. Without one attached they are logged.
pub fn publish(announcements: &[Announcement]) {
    for announcement in announcements {
        match announcement {
            Announcement::RaidOpened {
                party,
                expires_at,
                duration_secs,
            } => info!(
                target: "deathraid::broadcast",
                party = %party,
                duration = %format_compact_duration(*duration_secs),
                remaining = %format_compact_duration(expires_at.saturating_sub(now_unix_secs())),
                "party is now raidable"
            ),
            Announcement::RaidEnded { party } => info!(
                target: "deathraid::broadcast",
                party = %party,
                "raid window ended; protection restored"
            ),
            Announcement::PartyDeaths {
                party,
                count,
                remaining,
            } => info!(
                target: "deathraid::party",
                party = %party,
                count,
                remaining,
                "party death milestone"
            ),
        }
    }
}
