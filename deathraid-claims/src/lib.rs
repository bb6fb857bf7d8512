//! Adapters from the raid state machine to the claims (territory protection) system.

mod http_hook;
mod local_hook;

use deathraid_core::{ProtectionGateway, RaidError};
use deathraid_database::PartyId;

pub use http_hook::HttpClaimsHook;
pub use local_hook::LocalClaimsHook;

/// Claims backend chosen at startup.
#[derive(Clone, Debug)]
pub enum ClaimsHook {
    Http(HttpClaimsHook),
    Local(LocalClaimsHook),
}

impl ClaimsHook {
    /// HTTP hook when `CLAIMS_URL` is set, otherwise the in-process hook.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(match HttpClaimsHook::from_env_optional()? {
            Some(hook) => Self::Http(hook),
            None => Self::Local(LocalClaimsHook::new()),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Local(_) => "local",
        }
    }
}

impl ProtectionGateway for ClaimsHook {
    async fn initialize(&self) -> bool {
        match self {
            Self::Http(hook) => hook.health().await,
            Self::Local(_) => true,
        }
    }

    async fn disable(&self, party: &PartyId) -> Result<(), RaidError> {
        let result = match self {
            Self::Http(hook) => hook.set_disabled(party, true).await,
            Self::Local(hook) => {
                hook.set_disabled(party, true);
                Ok(())
            }
        };

        result.map_err(RaidError::gateway)
    }

    async fn restore(&self, party: &PartyId) -> Result<(), RaidError> {
        let result = match self {
            Self::Http(hook) => hook.set_disabled(party, false).await,
            Self::Local(hook) => {
                hook.set_disabled(party, false);
                Ok(())
            }
        };

        result.map_err(RaidError::gateway)
    }

    async fn is_protected(&self, party: &PartyId) -> Result<bool, RaidError> {
        match self {
            Self::Http(hook) => hook
                .is_disabled(party)
                .await
                .map(|disabled| !disabled)
                .map_err(RaidError::gateway),
            Self::Local(hook) => Ok(!hook.is_disabled(party)),
        }
    }
}
