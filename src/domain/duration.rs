//! Duration parsing and formatting.

/// Parse a duration string like "90", "90s", "5m", "1h30m" into seconds.
///
/// A bare number is read as seconds. Returns `None` for zero or malformed
/// input.
#[must_use]
pub fn parse_duration(s: &str) -> Option<u64> {
    let s = s.trim().to_lowercase();

    if let Ok(seconds) = s.parse::<u64>() {
        return (seconds > 0).then_some(seconds);
    }

    let mut total_seconds: u64 = 0;
    let mut current_num = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            current_num.push(c);
        } else {
            if current_num.is_empty() {
                return None;
            }
            let num: u64 = current_num.parse().ok()?;
            current_num.clear();

            let unit = match c {
                'h' => 3600,
                'm' => 60,
                's' => 1,
                _ => return None,
            };
            total_seconds = total_seconds.checked_add(num.checked_mul(unit)?)?;
        }
    }

    // Trailing number without unit is seconds
    if !current_num.is_empty() {
        let num: u64 = current_num.parse().ok()?;
        total_seconds = total_seconds.checked_add(num)?;
    }

    (total_seconds > 0).then_some(total_seconds)
}

/// Format seconds as MM:SS (or H:MM:SS past an hour).
#[must_use]
pub fn format_clock(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Format seconds as a short human string ("45s", "5m", "1h 2m 3s").
#[must_use]
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}

/// Render a progress bar.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn render_progress_bar(progress: f64, width: usize) -> String {
    let filled = ((progress.clamp(0.0, 1.0)) * width as f64) as usize;
    let empty = width.saturating_sub(filled);

    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}
