pub mod database;
pub mod impls;
pub mod model;
pub mod store;

pub use database::{Database, MIGRATOR};
pub use model::party::PartyId;
