/// Shared formatting helpers (durations, party labels).
pub mod formatting;
/// Shared time helpers.
pub mod time;
