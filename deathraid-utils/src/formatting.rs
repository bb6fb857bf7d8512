/// Format seconds into a compact human-readable duration (e.g. 59s, 1m, 1h, 1d, 1h 30m).
pub fn format_compact_duration(total_seconds: u64) -> String {
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;

    if days > 0 {
        return if hours > 0 {
            format!("{}d {}h", days, hours)
        } else {
            format!("{}d", days)
        };
    }

    if hours > 0 {
        return match (minutes, seconds) {
            (0, 0) => format!("{}h", hours),
            (0, s) => format!("{}h {}s", hours, s),
            (m, 0) => format!("{}h {}m", hours, m),
            (m, s) => format!("{}h {}m {}s", hours, m, s),
        };
    }

    if minutes > 0 {
        return if seconds > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}m", minutes)
        };
    }

    format!("{}s", seconds)
}

/// Deaths still needed before a party reaches the raid threshold.
pub fn deaths_until_raid(count: u64, threshold: u32) -> u64 {
    u64::from(threshold).saturating_sub(count)
}

/// Normalize a raw party token from the host: trimmed, empty tokens rejected.
pub fn normalize_party_token(raw: &str) -> Option<String> {
    let token = raw.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_owned())
    }
}
