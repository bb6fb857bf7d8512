use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use deathraid_database::PartyId;

/// In-process claims state for servers without an external claims service.
#[derive(Clone, Debug, Default)]
pub struct LocalClaimsHook {
    disabled: Arc<Mutex<HashSet<PartyId>>>,
}

impl LocalClaimsHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_disabled(&self, party: &PartyId, disabled: bool) {
        let mut parties = self.lock();
        if disabled {
            parties.insert(party.clone());
        } else {
            parties.remove(party);
        }
    }

    pub fn is_disabled(&self, party: &PartyId) -> bool {
        self.lock().contains(party)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PartyId>> {
        self.disabled.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
