use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use deathraid_database::Database;
use deathraid_database::PartyId;
use deathraid_database::impls::raid_windows::{load_raid_windows, save_raid_windows};
use deathraid_database::model::raid_window::RaidWindow;

use crate::error::RaidError;

#[derive(Debug, Default)]
struct RegistryState {
    windows: HashMap<PartyId, RaidWindow>,
    /// Open windows whose protection has not been confirmed disabled yet.
    unconfirmed: HashSet<PartyId>,
}

/// The set of currently open raid windows, at most one per party.
#[derive(Debug, Default)]
pub struct RaidWindowRegistry {
    state: Mutex<RegistryState>,
}

/// Expired windows captured at the time of the call.
///
/// Re-running `list_expired` yields a fresh view, so an interrupted sweep can simply start over.
#[derive(Debug)]
pub struct ExpiredWindows {
    inner: std::vec::IntoIter<RaidWindow>,
}

impl Iterator for ExpiredWindows {
    type Item = RaidWindow;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl RaidWindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a window lasting `duration_secs` from `now`.
    pub fn open(
        &self,
        party: &PartyId,
        now: u64,
        duration_secs: u64,
    ) -> Result<RaidWindow, RaidError> {
        let mut state = self.lock();
        if state.windows.contains_key(party) {
            return Err(RaidError::AlreadyActive {
                party: party.clone(),
            });
        }

        let window = RaidWindow::open(party.clone(), now, duration_secs);
        state.windows.insert(party.clone(), window.clone());
        state.unconfirmed.insert(party.clone());
        Ok(window)
    }

    pub fn is_active(&self, party: &PartyId) -> bool {
        self.lock().windows.contains_key(party)
    }

    pub fn active(&self, party: &PartyId) -> Option<RaidWindow> {
        self.lock().windows.get(party).cloned()
    }

    /// All open windows ordered by party.
    pub fn active_windows(&self) -> Vec<RaidWindow> {
        let mut windows: Vec<RaidWindow> = self.lock().windows.values().cloned().collect();
        windows.sort_by(|a, b| a.party.cmp(&b.party));
        windows
    }

    /// Open windows with `expires_at <= now`.
    pub fn list_expired(&self, now: u64) -> ExpiredWindows {
        let mut expired: Vec<RaidWindow> = self
            .lock()
            .windows
            .values()
            .filter(|window| window.is_expired(now))
            .cloned()
            .collect();
        expired.sort_by(|a, b| a.expires_at.cmp(&b.expires_at).then(a.party.cmp(&b.party)));

        ExpiredWindows {
            inner: expired.into_iter(),
        }
    }

    /// Remove the party's window. Closing an already-closed window returns `None`.
    pub fn close(&self, party: &PartyId) -> Option<RaidWindow> {
        let mut state = self.lock();
        state.unconfirmed.remove(party);
        state.windows.remove(party).map(|mut window| {
            window.active = false;
            window
        })
    }

    pub fn confirm_disabled(&self, party: &PartyId) {
        self.lock().unconfirmed.remove(party);
    }

    /// Parties with an unexpired window whose protection is not confirmed disabled.
    pub fn unconfirmed(&self, now: u64) -> Vec<PartyId> {
        let state = self.lock();
        let mut parties: Vec<PartyId> = state
            .unconfirmed
            .iter()
            .filter(|party| {
                state
                    .windows
                    .get(*party)
                    .is_some_and(|window| !window.is_expired(now))
            })
            .cloned()
            .collect();
        parties.sort();
        parties
    }

    /// Replace the registry with the persisted windows.
    ///
    /// Windows already past `expires_at` stay open so the next sweep restores their protection.
    /// Loaded windows start unconfirmed because the claims system may have been restored while
    /// the process was down.
    pub async fn load_all(&self, db: &Database) -> Result<usize, RaidError> {
        let loaded = load_raid_windows(db).await.map_err(RaidError::persistence)?;

        let mut state = self.lock();
        state.windows.clear();
        state.unconfirmed.clear();
        for window in loaded.into_iter().filter(|window| window.active) {
            state.unconfirmed.insert(window.party.clone());
            state.windows.insert(window.party.clone(), window);
        }

        debug!(windows = state.windows.len(), "raid windows loaded");
        Ok(state.windows.len())
    }

    pub async fn save_all(&self, db: &Database) -> Result<usize, RaidError> {
        let snapshot = self.active_windows();
        save_raid_windows(db, &snapshot)
            .await
            .map_err(RaidError::persistence)?;
        Ok(snapshot.len())
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
