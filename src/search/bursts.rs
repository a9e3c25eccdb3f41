//! Burst grouping of search matches.
//!
//! A single match is often noise; a phrase repeated by many viewers within a
//! short span marks a moment worth linking to. A burst starts at a match `t`
//! when at least `min_matches` matches of the same video fall in
//! `[t, t + window)`. Starts closer than `window` to the previous kept start
//! of the same video are folded into it.

use chrono::TimeDelta;

use super::ChatMessageView;

pub fn bursts(
    matches: &[ChatMessageView],
    window: TimeDelta,
    min_matches: usize,
) -> Vec<ChatMessageView> {
    let min_matches = min_matches.max(1);

    // Stable partition by video keeps each group in timestamp order.
    let mut video_ids: Vec<&str> = matches.iter().map(|m| m.video_id.as_str()).collect();
    video_ids.sort_unstable();
    video_ids.dedup();

    let mut kept: Vec<ChatMessageView> = Vec::new();
    for video_id in video_ids {
        let group: Vec<&ChatMessageView> =
            matches.iter().filter(|m| m.video_id == video_id).collect();

        let mut last_start = None;
        let mut end = 0;
        for (i, start) in group.iter().enumerate() {
            let limit = start.timestamp + window;
            end = end.max(i);
            while end < group.len() && group[end].timestamp < limit {
                end += 1;
            }
            if end - i < min_matches {
                continue;
            }
            if let Some(prev) = last_start {
                if start.timestamp - prev < window {
                    continue;
                }
            }
            last_start = Some(start.timestamp);
            kept.push((*start).clone());
        }
    }

    kept.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.message_id.cmp(&b.message_id))
    });
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(video_id: &str, id: &str, secs: i64) -> ChatMessageView {
        let base: DateTime<Utc> = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        ChatMessageView {
            message_id: id.into(),
            timestamp: base + TimeDelta::seconds(secs),
            video_id: video_id.into(),
            title: None,
            aired_at: None,
            video_offset_time_msec: Some(secs * 1000),
            video_offset_time_text: None,
            author: None,
            message: None,
        }
    }

    #[test]
    fn sparse_matches_are_dropped() {
        let matches = vec![at("V1", "a", 0), at("V1", "b", 100), at("V1", "c", 200)];
        assert!(bursts(&matches, TimeDelta::seconds(60), 2).is_empty());
    }

    #[test]
    fn dense_run_keeps_only_its_first_match() {
        let matches = vec![
            at("V1", "a", 0),
            at("V1", "b", 10),
            at("V1", "c", 20),
            at("V1", "d", 30),
        ];
        let kept = bursts(&matches, TimeDelta::seconds(60), 3);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].message_id, "a");
    }

    #[test]
    fn separate_runs_and_videos_each_count() {
        let matches = vec![
            at("V1", "a", 0),
            at("V2", "x", 5),
            at("V1", "b", 10),
            at("V2", "y", 15),
            at("V1", "c", 120),
            at("V1", "d", 130),
        ];
        let kept = bursts(&matches, TimeDelta::seconds(60), 2);
        let ids: Vec<&str> = kept.iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(ids, ["a", "x", "c"]);
    }

    #[test]
    fn min_matches_of_one_keeps_spaced_starts() {
        let matches = vec![at("V1", "a", 0), at("V1", "b", 30), at("V1", "c", 61)];
        let kept = bursts(&matches, TimeDelta::seconds(60), 1);
        let ids: Vec<&str> = kept.iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
    }
}
