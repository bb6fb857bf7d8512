pub mod death_records;
pub mod raid_config;
pub mod raid_windows;
