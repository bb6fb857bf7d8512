use std::future::Future;

use deathraid_database::PartyId;

use crate::error::RaidError;

/// Narrow capability over the third-party claims system.
///
/// Implementations must be idempotent: disabling an already-disabled party or restoring an
/// already-protected one succeeds.
pub trait ProtectionGateway: Send + Sync {
    /// Availability check run once at startup. `false` is logged, never fatal.
    fn initialize(&self) -> impl Future<Output = bool> + Send;

    fn disable(&self, party: &PartyId) -> impl Future<Output = Result<(), RaidError>> + Send;

    fn restore(&self, party: &PartyId) -> impl Future<Output = Result<(), RaidError>> + Send;

    /// Whether the party's claims are currently protected.
    fn is_protected(&self, party: &PartyId)
    -> impl Future<Output = Result<bool, RaidError>> + Send;
}
