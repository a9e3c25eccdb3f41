//! Markdown report for `vodchat search -o FILE`.

use chrono::{DateTime, Utc};

use crate::search::ChatMessageView;

/// Search parameters echoed in the report's footer table.
#[derive(Debug, Clone)]
pub struct ReportParams<'a> {
    pub patterns: &'a [String],
    pub window_seconds: i64,
    pub min_matches: usize,
    pub lead_seconds: i64,
    pub messages_searched: i64,
    pub latest_message: Option<DateTime<Utc>>,
    pub generated_at: DateTime<Utc>,
}

/// Escape characters that would break a table cell or start emphasis.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '|' | '*' | '_' | '~' | '`' | '[' | ']' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' | '\r' => out.push(' '),
            _ => out.push(ch),
        }
    }
    out
}

fn hms(seconds: i64) -> String {
    let s = seconds.max(0);
    format!("{:02}:{:02}:{:02}", s / 3600, (s / 60) % 60, s % 60)
}

/// Render matches as a Date / Title / Timestamp table, with Author and
/// Message columns in debug mode, followed by a parameters table.
pub fn render_search_report(
    results: &[ChatMessageView],
    params: &ReportParams<'_>,
    debug: bool,
) -> String {
    let mut headers = vec!["Date", "Title", "Timestamp"];
    if debug {
        headers.extend(["Author", "Message"]);
    }

    let mut lines = Vec::new();
    lines.push(format!("| {} |", headers.join(" | ")));
    lines.push(format!("|{}", "------|".repeat(headers.len())));

    for r in results {
        let title = escape(r.title.as_deref().unwrap_or(&r.video_id));
        let start = r
            .offset_seconds()
            .map(|s| (s - params.lead_seconds).max(0))
            .unwrap_or(0);
        let mut row = vec![
            r.aired_at.unwrap_or(r.timestamp).format("%Y-%m-%d").to_string(),
            format!("[{title}]({})", r.video_url()),
            format!("[{}]({})", hms(start), r.watch_url(params.lead_seconds)),
        ];
        if debug {
            row.push(escape(r.author.as_deref().unwrap_or_default()));
            row.push(escape(r.message.as_deref().unwrap_or_default()));
        }
        lines.push(format!("| {} |", row.join(" | ")));
    }

    let patterns: Vec<String> = params.patterns.iter().map(|p| escape(p)).collect();
    lines.push(String::new());
    lines.push("| Parameter | Value |".into());
    lines.push("|-----------|-------|".into());
    lines.push(format!("| Search Patterns | `{}` |", patterns.join(", ")));
    lines.push(format!("| Window Size | {} seconds |", params.window_seconds));
    lines.push(format!("| Minimum Matches | {} |", params.min_matches));
    lines.push(format!("| Results Found | {} |", results.len()));
    lines.push(format!("| Messages Searched | {} |", params.messages_searched));
    lines.push(format!(
        "| Generated At | {} |",
        params.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(latest) = params.latest_message {
        lines.push(format!(
            "| Latest Live Chat | {} |",
            latest.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn view() -> ChatMessageView {
        ChatMessageView {
            message_id: "m1".into(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 1, 5).unwrap(),
            video_id: "dQw4w9WgXcQ".into(),
            title: Some("Late | night *stream*".into()),
            aired_at: Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
            video_offset_time_msec: Some(3_725_000),
            video_offset_time_text: Some("1:02:05".into()),
            author: Some("viewer_1".into()),
            message: Some("gg | wp".into()),
        }
    }

    fn params<'a>(patterns: &'a [String]) -> ReportParams<'a> {
        ReportParams {
            patterns,
            window_seconds: 60,
            min_matches: 5,
            lead_seconds: 10,
            messages_searched: 1234,
            latest_message: None,
            generated_at: Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn rows_link_to_the_moment() {
        let patterns = vec!["gg".to_string()];
        let report = render_search_report(&[view()], &params(&patterns), false);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "| Date | Title | Timestamp |");
        assert_eq!(
            lines[2],
            "| 2026-01-01 | [Late \\| night \\*stream\\*](https://www.youtube.com/watch?v=dQw4w9WgXcQ) \
             | [01:01:55](https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=3715s) |"
        );
        assert!(report.contains("| Messages Searched | 1234 |"));
        assert!(!report.contains("Latest Live Chat"));
    }

    #[test]
    fn debug_adds_author_and_message() {
        let patterns = vec!["g_g".to_string()];
        let report = render_search_report(&[view()], &params(&patterns), true);
        assert!(report.starts_with("| Date | Title | Timestamp | Author | Message |"));
        assert!(report.contains("| viewer\\_1 | gg \\| wp |"));
        assert!(report.contains("`g\\_g`"));
    }
}
