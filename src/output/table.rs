use chrono::{DateTime, Utc};
use unicode_width::UnicodeWidthStr;

use crate::aggregate::{format_offset, WindowStat};
use crate::db::models::*;
use crate::ingest::IngestSummary;
use crate::search::ChatMessageView;

/// Format a duration in milliseconds to a human-readable string.
pub fn format_duration(ms: i64) -> String {
    let total = (ms / 1000).max(0);
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{h}h{m:02}m")
    } else if m > 0 {
        format!("{m}m{s:02}s")
    } else {
        format!("{s}s")
    }
}

/// Truncate a string to fit within max_width (respecting unicode width).
fn truncate(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let cw = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + cw + 3 > max_width {
            result.push_str("...");
            break;
        }
        result.push(ch);
        width += cw;
    }
    result
}

/// Left-pad to a display width; `{:<N}` counts chars, not columns.
fn pad(s: &str, width: usize) -> String {
    let w = UnicodeWidthStr::width(s);
    format!("{s}{}", " ".repeat(width.saturating_sub(w)))
}

fn date_of(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".into())
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Print the result of `vodchat parse`.
pub fn print_ingest_summary(summary: &IngestSummary, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    println!(
        "{prefix}Processed {} file{}: {} inserted, {} updated, {} skipped ({} malformed, {} ignored)",
        summary.files_processed,
        plural(summary.files_processed),
        summary.inserted,
        summary.updated,
        summary.skipped,
        summary.malformed,
        summary.ignored,
    );
    if !summary.errors.is_empty() {
        println!("\n{} file{} failed:", summary.errors.len(), plural(summary.errors.len()));
        for e in &summary.errors {
            println!("  {}: {}", e.path.display(), e.message);
        }
    }
}

/// Format search matches as a table.
pub fn print_search_results(results: &[ChatMessageView], lead_seconds: i64, debug: bool) {
    if results.is_empty() {
        println!("No matches.");
        return;
    }

    println!("{} match{}:\n", results.len(), if results.len() == 1 { "" } else { "es" });

    println!("  {:<12} {} {:<10} LINK", "DATE", pad("TITLE", 42), "OFFSET");
    println!("  {}", "-".repeat(76));

    for r in results {
        let title = r.title.as_deref().unwrap_or(&r.video_id);
        let offset = r
            .offset_seconds()
            .map(|s| format_offset(s * 1000))
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:<12} {} {:<10} {}",
            date_of(r.aired_at.or(Some(r.timestamp))),
            pad(&truncate(title, 40), 42),
            offset,
            r.watch_url(lead_seconds),
        );
        if debug {
            let author = r.author.as_deref().unwrap_or_default();
            let message = r.message.as_deref().unwrap_or_default().replace('\n', " ");
            println!("  └─ {author}: {}", truncate(&message, 70));
        }
    }
}

/// Format the video list as a table.
pub fn print_video_list(videos: &[VideoSummary]) {
    if videos.is_empty() {
        println!("No videos found.");
        return;
    }

    println!("{} video{}:\n", videos.len(), plural(videos.len()));

    println!(
        "  {} {:<12} {:<8} {:>8}",
        pad("TITLE", 42),
        "DATE",
        "DURATION",
        "MESSAGES"
    );
    println!("  {}", "-".repeat(76));

    for v in videos {
        println!(
            "  {} {:<12} {:<8} {:>8}",
            pad(&truncate(&v.title, 40), 42),
            date_of(v.aired_at),
            v.duration_ms.map(format_duration).unwrap_or_else(|| "-".into()),
            v.message_count,
        );
        println!("  id: {}  channel: {}\n", v.video_id, v.channel_name);
    }
}

/// Print per-window activity for one video, with a proportional bar.
pub fn print_windows(video: Option<&VideoMetadata>, video_id: &str, windows: &[WindowStat]) {
    match video {
        Some(v) => println!("{} ({}, {})", v.title, video_id, date_of(v.aired_at())),
        None => println!("{video_id} (no metadata)"),
    }

    if windows.is_empty() {
        println!("  No chat messages.\n");
        return;
    }

    let peak = windows.iter().map(|w| w.unique_authors).max().unwrap_or(0).max(1);
    println!(
        "  {:<20} {:>8} {:>9}  {:<14} ",
        "WINDOW", "CHATTERS", "MESSAGES", "TOP EMOJI"
    );
    for w in windows {
        let bar = "█".repeat(w.unique_authors * 30 / peak);
        println!(
            "  {:<20} {:>8} {:>9}  {} {bar}",
            w.start_label(),
            w.unique_authors,
            w.message_count,
            pad(&truncate(w.top_emoji.as_deref().unwrap_or(""), 14), 14),
        );
    }
    println!();
}

/// Print the days without an aired video.
pub fn print_missing_days(gaps: &MissingDays) {
    println!(
        "{} day{} without a video between {} and {}:",
        gaps.days.len(),
        plural(gaps.days.len()),
        gaps.since,
        gaps.until,
    );
    for day in &gaps.days {
        println!("  {day}");
    }
}

/// Print database stats.
pub fn print_stats(stats: &DbStats) {
    println!("Database Statistics:");
    println!("  Videos:       {}", stats.video_count);
    println!("  Messages:     {}", stats.message_count);
    println!("  Channels:     {}", stats.channel_count);
    println!("  Authors:      {}", stats.author_count);
    println!("  Earliest:     {}", stats.earliest.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into()));
    println!("  Latest:       {}", stats.latest.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into()));
    println!("  DB Size:      {}", format_bytes(stats.db_size_bytes));
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_073_741_824 {
        format!("{:.1} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_read_naturally() {
        assert_eq!(format_duration(3_723_000), "1h02m");
        assert_eq!(format_duration(61_000), "1m01s");
        assert_eq!(format_duration(999), "0s");
    }

    #[test]
    fn truncation_respects_display_width() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
        // Wide characters take two columns each.
        assert_eq!(truncate("配信配信配信", 8), "配信...");
        assert_eq!(UnicodeWidthStr::width(pad("配信", 6).as_str()), 6);
    }
}
