//! # Utilities Module
//!
//! ## Purpose
//! Small display helpers shared by the CLI and logging paths.

/// Truncate text to a maximum character length with an ellipsis.
pub fn truncate(text: &str, max_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }
    let cut: String = chars[..max_chars.saturating_sub(3)].iter().collect();
    format!("{}...", cut.trim_end())
}

/// Format a duration as a human-readable string.
pub fn format_duration(duration: std::time::Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 20), "short");
        assert_eq!(truncate("this is a very long text", 10), "this is...");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(std::time::Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(std::time::Duration::from_secs(3700)), "1h 1m 40s");
    }
}
