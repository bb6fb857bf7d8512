use anyhow::Context as _;

use crate::database::{Backend, Database};
use crate::model::raid_window::RaidWindow;
use crate::store::RAIDS_FILE;

#[derive(sqlx::FromRow)]
struct RaidWindowRow {
    party_id: String,
    opened_at: i64,
    expires_at: i64,
    active: bool,
}

pub async fn load_raid_windows(db: &Database) -> anyhow::Result<Vec<RaidWindow>> {
    match db.backend() {
        Backend::Postgres(pool) => {
            let rows: Vec<RaidWindowRow> = sqlx::query_as(
                "SELECT party_id, opened_at, expires_at, active FROM raid_windows ORDER BY party_id",
            )
            .fetch_all(pool)
            .await?;

            let mut windows = Vec::with_capacity(rows.len());
            for row in rows {
                let opened_at = u64::try_from(row.opened_at).context("opened_at out of u64 range")?;
                let expires_at =
                    u64::try_from(row.expires_at).context("expires_at out of u64 range")?;
                windows.push(RaidWindow {
                    party: row.party_id.into(),
                    opened_at,
                    expires_at,
                    active: row.active,
                });
            }

            Ok(windows)
        }
        Backend::Json(store) => Ok(store.read(RAIDS_FILE).await?.unwrap_or_default()),
        Backend::Memory(store) => store.with(|snapshot| snapshot.raid_windows.clone()),
    }
}

/// Replace the persisted raid windows with `windows`.
pub async fn save_raid_windows(db: &Database, windows: &[RaidWindow]) -> anyhow::Result<()> {
    match db.backend() {
        Backend::Postgres(pool) => {
            let mut tx = pool.begin().await?;

            sqlx::query("DELETE FROM raid_windows")
                .execute(&mut *tx)
                .await?;

            for window in windows {
                let opened_at = i64::try_from(window.opened_at).context("opened_at out of i64 range")?;
                let expires_at =
                    i64::try_from(window.expires_at).context("expires_at out of i64 range")?;

                sqlx::query(
                    "INSERT INTO raid_windows (party_id, opened_at, expires_at, active) \
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(window.party.as_str())
                .bind(opened_at)
                .bind(expires_at)
                .bind(window.active)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(())
        }
        Backend::Json(store) => store.write(RAIDS_FILE, &windows).await,
        Backend::Memory(store) => store.with(|snapshot| {
            snapshot.raid_windows = windows.to_vec();
        }),
    }
}
