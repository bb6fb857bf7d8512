use anyhow::Context as _;

use crate::database::{Backend, Database};
use crate::model::raid_config::RaidConfig;
use crate::store::CONFIG_FILE;

#[derive(sqlx::FromRow)]
struct RaidConfigRow {
    death_threshold: i32,
    raid_duration_minutes: i32,
    broadcast_alerts_enabled: bool,
    party_announcement_enabled: bool,
    announcement_interval_deaths: i32,
    save_interval_minutes: i32,
}

/// Load the stored configuration, falling back to defaults when none was saved yet.
pub async fn load_configuration(db: &Database) -> anyhow::Result<RaidConfig> {
    let config = match db.backend() {
        Backend::Postgres(pool) => {
            let row = sqlx::query_as::<_, RaidConfigRow>(
                "SELECT death_threshold, raid_duration_minutes, broadcast_alerts_enabled, \
                 party_announcement_enabled, announcement_interval_deaths, save_interval_minutes \
                 FROM raid_config WHERE id = 1",
            )
            .fetch_optional(pool)
            .await?;

            match row {
                Some(row) => RaidConfig {
                    // Negative values clamp to the floor below.
                    death_threshold: u32::try_from(row.death_threshold).unwrap_or(0),
                    raid_duration_minutes: u32::try_from(row.raid_duration_minutes).unwrap_or(0),
                    broadcast_alerts_enabled: row.broadcast_alerts_enabled,
                    party_announcement_enabled: row.party_announcement_enabled,
                    announcement_interval_deaths: u32::try_from(row.announcement_interval_deaths)
                        .unwrap_or(0),
                    save_interval_minutes: u32::try_from(row.save_interval_minutes).unwrap_or(0),
                },
                None => RaidConfig::default(),
            }
        }
        Backend::Json(store) => store.read(CONFIG_FILE).await?.unwrap_or_default(),
        Backend::Memory(store) => store.with(|snapshot| snapshot.config.clone())?.unwrap_or_default(),
    };

    Ok(config.clamped())
}

pub async fn save_configuration(db: &Database, config: &RaidConfig) -> anyhow::Result<()> {
    match db.backend() {
        Backend::Postgres(pool) => {
            let death_threshold =
                i32::try_from(config.death_threshold).context("death_threshold out of i32 range")?;
            let raid_duration_minutes = i32::try_from(config.raid_duration_minutes)
                .context("raid_duration_minutes out of i32 range")?;
            let announcement_interval_deaths = i32::try_from(config.announcement_interval_deaths)
                .context("announcement_interval_deaths out of i32 range")?;
            let save_interval_minutes = i32::try_from(config.save_interval_minutes)
                .context("save_interval_minutes out of i32 range")?;

            sqlx::query(
                "INSERT INTO raid_config (id, death_threshold, raid_duration_minutes, \
                 broadcast_alerts_enabled, party_announcement_enabled, \
                 announcement_interval_deaths, save_interval_minutes) \
                 VALUES (1, $1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (id) DO UPDATE SET \
                 death_threshold = EXCLUDED.death_threshold, \
                 raid_duration_minutes = EXCLUDED.raid_duration_minutes, \
                 broadcast_alerts_enabled = EXCLUDED.broadcast_alerts_enabled, \
                 party_announcement_enabled = EXCLUDED.party_announcement_enabled, \
                 announcement_interval_deaths = EXCLUDED.announcement_interval_deaths, \
                 save_interval_minutes = EXCLUDED.save_interval_minutes",
            )
            .bind(death_threshold)
            .bind(raid_duration_minutes)
            .bind(config.broadcast_alerts_enabled)
            .bind(config.party_announcement_enabled)
            .bind(announcement_interval_deaths)
            .bind(save_interval_minutes)
            .execute(pool)
            .await?;

            Ok(())
        }
        Backend::Json(store) => store.write(CONFIG_FILE, config).await,
        Backend::Memory(store) => store.with(|snapshot| {
            snapshot.config = Some(config.clone());
        }),
    }
}
