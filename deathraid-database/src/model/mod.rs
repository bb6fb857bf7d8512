pub mod death_record;
pub mod party;
pub mod raid_config;
pub mod raid_window;
