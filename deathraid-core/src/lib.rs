//! Death accumulation and raid-window state machine.
//!
//! Deaths are counted per party; once a party reaches the configured threshold its claim
//! protection is disabled for a fixed window, and a periodic sweep restores it on expiry.

pub mod admin;
pub mod announcement;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod ledger;
mod locks;
pub mod registry;
pub mod scheduler;
pub mod settings;

#[cfg(test)]
mod testing;

pub use announcement::Announcement;
pub use coordinator::{DeathOutcome, DeathRaidCoordinator, LoadSummary, ResetOutcome, SweepReport};
pub use error::RaidError;
pub use gateway::ProtectionGateway;
pub use scheduler::Scheduler;
pub use settings::Settings;
