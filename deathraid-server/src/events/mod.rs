pub mod announce;
pub mod death;
