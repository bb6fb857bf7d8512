use anyhow::Context as _;

use crate::database::{Backend, Database};
use crate::model::death_record::DeathRecord;
use crate::store::DEATHS_FILE;

#[derive(sqlx::FromRow)]
struct DeathRecordRow {
    party_id: String,
    death_count: i64,
    last_death_at: i64,
}

pub async fn load_death_records(db: &Database) -> anyhow::Result<Vec<DeathRecord>> {
    match db.backend() {
        Backend::Postgres(pool) => {
            let rows: Vec<DeathRecordRow> = sqlx::query_as(
                "SELECT party_id, death_count, last_death_at FROM death_records ORDER BY party_id",
            )
            .fetch_all(pool)
            .await?;

            let mut records = Vec::with_capacity(rows.len());
            for row in rows {
                let count = u64::try_from(row.death_count).context("death_count out of u64 range")?;
                let last_death_at =
                    u64::try_from(row.last_death_at).context("last_death_at out of u64 range")?;
                records.push(DeathRecord {
                    party: row.party_id.into(),
                    count,
                    last_death_at,
                });
            }

            Ok(records)
        }
        Backend::Json(store) => Ok(store.read(DEATHS_FILE).await?.unwrap_or_default()),
        Backend::Memory(store) => store.with(|snapshot| snapshot.death_records.clone()),
    }
}

/// Replace the persisted death records with `records`.
pub async fn save_death_records(db: &Database, records: &[DeathRecord]) -> anyhow::Result<()> {
    match db.backend() {
        Backend::Postgres(pool) => {
            let mut tx = pool.begin().await?;

            sqlx::query("DELETE FROM death_records")
                .execute(&mut *tx)
                .await?;

            for record in records {
                let count = i64::try_from(record.count).context("count out of i64 range")?;
                let last_death_at =
                    i64::try_from(record.last_death_at).context("last_death_at out of i64 range")?;

                sqlx::query(
                    "INSERT INTO death_records (party_id, death_count, last_death_at) \
                     VALUES ($1, $2, $3)",
                )
                .bind(record.party.as_str())
                .bind(count)
                .bind(last_death_at)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(())
        }
        Backend::Json(store) => store.write(DEATHS_FILE, &records).await,
        Backend::Memory(store) => store.with(|snapshot| {
            snapshot.death_records = records.to_vec();
        }),
    }
}
