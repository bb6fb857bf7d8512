use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use deathraid_database::PartyId;

use crate::error::RaidError;
use crate::gateway::ProtectionGateway;

#[derive(Debug, Default)]
struct GatewayState {
    disabled: HashSet<PartyId>,
    disable_calls: Vec<PartyId>,
    restore_calls: Vec<PartyId>,
    failing: bool,
}

/// Claims stand-in that records every call and can be switched to fail.
#[derive(Debug, Default)]
pub(crate) struct RecordingGateway {
    state: Mutex<GatewayState>,
}

impl RecordingGateway {
    pub(crate) fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    pub(crate) fn disable_calls(&self, party: &PartyId) -> usize {
        self.lock().disable_calls.iter().filter(|p| *p == party).count()
    }

    pub(crate) fn restore_calls(&self, party: &PartyId) -> usize {
        self.lock().restore_calls.iter().filter(|p| *p == party).count()
    }

    pub(crate) fn is_disabled(&self, party: &PartyId) -> bool {
        self.lock().disabled.contains(party)
    }

    /// Simulate the claims system coming back with protection on, as after a host restart.
    pub(crate) fn forget(&self, party: &PartyId) {
        self.lock().disabled.remove(party);
    }

    fn lock(&self) -> MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProtectionGateway for RecordingGateway {
    async fn initialize(&self) -> bool {
        !self.lock().failing
    }

    async fn disable(&self, party: &PartyId) -> Result<(), RaidError> {
        let mut state = self.lock();
        state.disable_calls.push(party.clone());
        if state.failing {
            return Err(RaidError::gateway(anyhow::anyhow!("claims offline")));
        }
        state.disabled.insert(party.clone());
        Ok(())
    }

    async fn restore(&self, party: &PartyId) -> Result<(), RaidError> {
        let mut state = self.lock();
        state.restore_calls.push(party.clone());
        if state.failing {
            return Err(RaidError::gateway(anyhow::anyhow!("claims offline")));
        }
        state.disabled.remove(party);
        Ok(())
    }

    async fn is_protected(&self, party: &PartyId) -> Result<bool, RaidError> {
        let state = self.lock();
        if state.failing {
            return Err(RaidError::gateway(anyhow::anyhow!("claims offline")));
        }
        Ok(!state.disabled.contains(party))
    }
}
