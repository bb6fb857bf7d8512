use thiserror::Error;

use deathraid_database::PartyId;

/// Failures surfaced by the raid state machine. None of them are fatal to the host.
#[derive(Debug, Error)]
pub enum RaidError {
    /// A window is already open for the party; callers treat this as a no-op.
    #[error("raid window already active for party `{party}`")]
    AlreadyActive { party: PartyId },

    /// The claims system could not be reached or rejected the call; retried on the next tick.
    #[error("claims gateway unavailable: {0:#}")]
    GatewayUnavailable(anyhow::Error),

    /// Loading or saving a snapshot failed; in-memory state stays authoritative.
    #[error("persistence failure: {0:#}")]
    Persistence(anyhow::Error),

    /// The last load failed, so saving would replace stored state with a partial view.
    #[error("persisted raid data was not loaded; refusing to overwrite it")]
    NotLoaded,
}

impl RaidError {
    pub fn gateway(source: impl Into<anyhow::Error>) -> Self {
        Self::GatewayUnavailable(source.into())
    }

    pub fn persistence(source: impl Into<anyhow::Error>) -> Self {
        Self::Persistence(source.into())
    }
}
