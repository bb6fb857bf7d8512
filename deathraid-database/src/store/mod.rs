mod json_store;
mod memory_store;

pub use json_store::JsonStore;
pub use memory_store::MemoryStore;

pub(crate) const DEATHS_FILE: &str = "deaths.json";
pub(crate) const RAIDS_FILE: &str = "raids.json";
pub(crate) const CONFIG_FILE: &str = "config.json";
