use serde::{Deserialize, Serialize};

use crate::model::party::PartyId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathRecord {
    pub party: PartyId,
    pub count: u64,
    pub last_death_at: u64,
}
