use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use deathraid_database::Database;
use deathraid_database::PartyId;
use deathraid_database::impls::death_records::{load_death_records, save_death_records};
use deathraid_database::model::death_record::DeathRecord;

use crate::error::RaidError;

/// Accumulated deaths per party.
///
/// The map lock is only held for the duration of a single map operation, never across an
/// await, so persistence never stalls death recording.
#[derive(Debug, Default)]
pub struct PartyDeathLedger {
    records: Mutex<HashMap<PartyId, DeathRecord>>,
}

impl PartyDeathLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one death for `party` and return its new count.
    pub fn record_death(&self, party: &PartyId, now: u64) -> u64 {
        let mut records = self.lock();
        let record = records
            .entry(party.clone())
            .or_insert_with(|| DeathRecord {
                party: party.clone(),
                count: 0,
                last_death_at: now,
            });

        record.count = record.count.saturating_add(1);
        record.last_death_at = now;
        record.count
    }

    pub fn count(&self, party: &PartyId) -> u64 {
        self.lock().get(party).map_or(0, |record| record.count)
    }

    pub fn record(&self, party: &PartyId) -> Option<DeathRecord> {
        self.lock().get(party).cloned()
    }

    /// Zero the party's count and return what it was.
    pub fn reset(&self, party: &PartyId) -> u64 {
        match self.lock().get_mut(party) {
            Some(record) => std::mem::take(&mut record.count),
            None => 0,
        }
    }

    /// Records ordered by party, taken under a single short lock.
    pub fn snapshot(&self) -> Vec<DeathRecord> {
        let mut records: Vec<DeathRecord> = self.lock().values().cloned().collect();
        records.sort_by(|a, b| a.party.cmp(&b.party));
        records
    }

    pub async fn load_all(&self, db: &Database) -> Result<usize, RaidError> {
        let loaded = load_death_records(db)
            .await
            .map_err(RaidError::persistence)?;

        let mut records = self.lock();
        records.clear();
        for record in loaded {
            records.insert(record.party.clone(), record);
        }

        debug!(records = records.len(), "death ledger loaded");
        Ok(records.len())
    }

    /// Persist a snapshot. Deaths recorded while the write is in flight land in the next save.
    pub async fn save_all(&self, db: &Database) -> Result<usize, RaidError> {
        let snapshot = self.snapshot();
        save_death_records(db, &snapshot)
            .await
            .map_err(RaidError::persistence)?;
        Ok(snapshot.len())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PartyId, DeathRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
