//! Output formatting utilities for CLI commands
//!
//! Provides consistent formatting for:
//! - Tables with column alignment
//! - File sizes (human-readable)
//! - Counts with thousands separators
//! - Timestamps (relative and absolute)

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Longest cell text shown in sample tables before truncation.
const MAX_CELL_CHARS: usize = 40;

/// Format a file size in human-readable form
///
/// Examples:
/// - 500 -> "500 B"
/// - 1024 -> "1.0 KB"
/// - 1536000 -> "1.5 MB"
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.1} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a count with thousands separators: 1234567 -> "1,234,567"
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Convert engine timestamps (float seconds since the epoch) to `SystemTime`.
/// Anything negative, non-finite or out of range maps to the epoch.
pub fn system_time_from_secs(secs: f64) -> SystemTime {
    Duration::try_from_secs_f64(secs)
        .ok()
        .and_then(|offset| UNIX_EPOCH.checked_add(offset))
        .unwrap_or(UNIX_EPOCH)
}

/// Format a system time as a human-readable relative time
///
/// Examples:
/// - "2 seconds ago"
/// - "5 minutes ago"
/// - "3 hours ago"
/// - "2024-12-15 14:30" (if older than a week)
pub fn format_time(time: SystemTime) -> String {
    match SystemTime::now().duration_since(time) {
        Ok(duration) => format_duration_ago(duration),
        Err(_) => "just now".to_string(),
    }
}

/// Format a duration as "X time ago"
fn format_duration_ago(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{} second{} ago", secs, if secs == 1 { "" } else { "s" })
    } else if secs < 3600 {
        let mins = secs / 60;
        format!("{} minute{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if secs < 86400 {
        let hours = secs / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if secs < 604800 {
        let days = secs / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_absolute_time(duration)
    }
}

fn format_absolute_time(duration_ago: Duration) -> String {
    use chrono::Local;

    let now = Local::now();
    let time = now - chrono::Duration::seconds(duration_ago.as_secs() as i64);
    time.format("%Y-%m-%d %H:%M").to_string()
}

/// Shorten long cell text for terminal tables.
pub fn truncate_cell(text: &str) -> String {
    if text.chars().count() <= MAX_CELL_CHARS {
        return text.replace('\n', " ");
    }
    let kept: String = text.chars().take(MAX_CELL_CHARS - 3).collect();
    format!("{}...", kept.replace('\n', " "))
}

/// Print a table with headers and rows
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }

    println!("{}", table);
}
