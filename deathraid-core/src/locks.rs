use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use deathraid_database::PartyId;

type LockMap = HashMap<PartyId, Arc<AsyncMutex<()>>>;

/// One async mutex per party, serializing check-then-act sequences without blocking other
/// parties. An entry lives only while someone holds or waits on it.
#[derive(Debug, Default)]
pub(crate) struct PartyLocks {
    locks: Mutex<LockMap>,
}

impl PartyLocks {
    pub(crate) async fn lock(&self, party: &PartyId) -> PartyGuard<'_> {
        let lock = {
            let mut locks = self.map();
            Arc::clone(locks.entry(party.clone()).or_default())
        };

        PartyGuard {
            guard: Some(lock.lock_owned().await),
            party: party.clone(),
            locks: self,
        }
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map().len()
    }
}

pub(crate) struct PartyGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    party: PartyId,
    locks: &'a PartyLocks,
}

impl Drop for PartyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        // Clones are only handed out under the map lock, so a count of one means nobody else
        // holds or waits on this party.
        let mut locks = self.locks.map();
        if let Some(lock) = locks.get(&self.party) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(&self.party);
            }
        }
    }
}
