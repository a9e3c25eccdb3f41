//! Chat-log line normalization.
//!
//! Two line layouts occur in yt-dlp `.live_chat.json` files:
//!
//! * replay lines, `{"replayChatItemAction": {"actions": [...],
//!   "videoOffsetTimeMsec": "..."}, "videoOffsetTimeMsec": "..."}`, written
//!   when chat is downloaded from a finished stream;
//! * bare action lines, `{"addChatItemAction": {...}}`, written by captures
//!   taken while the stream was still live. These carry no stream offset.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::envelope::{Envelope, EnvelopeKind};
use super::{json_i64, json_str, Normalized};
use crate::db::models::{is_storable, ChatMessage};

/// File-level context shared by every line of a chat log.
#[derive(Debug, Clone, Copy)]
pub struct ChatContext<'a> {
    pub video_id: &'a str,
    pub filename: &'a str,
}

/// Normalize one raw line. A line may hold several actions and so yield
/// several outcomes; it always yields at least one.
pub fn normalize_line(line: &str, ctx: ChatContext<'_>) -> Vec<Normalized<ChatMessage>> {
    match serde_json::from_str::<Value>(line) {
        Ok(value) => normalize_value(&value, ctx),
        Err(e) => vec![Normalized::malformed(format!("invalid JSON: {e}"))],
    }
}

/// Normalize one already-parsed line.
pub fn normalize_value(line: &Value, ctx: ChatContext<'_>) -> Vec<Normalized<ChatMessage>> {
    if let Some(replay) = line.get("replayChatItemAction") {
        let offset = json_i64(line.get("videoOffsetTimeMsec"))
            .or_else(|| json_i64(replay.get("videoOffsetTimeMsec")));

        let actions = replay
            .get("actions")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if actions.is_empty() {
            return vec![Normalized::Ignored(EnvelopeKind::Unknown)];
        }

        return actions
            .iter()
            .map(|action| normalize_action(action, offset, ctx))
            .collect();
    }

    if Envelope::is_action(line) {
        return vec![normalize_action(line, None, ctx)];
    }

    vec![Normalized::Ignored(EnvelopeKind::Unknown)]
}

/// Dispatch one action on its envelope kind.
pub fn normalize_action(
    action: &Value,
    offset_msec: Option<i64>,
    ctx: ChatContext<'_>,
) -> Normalized<ChatMessage> {
    let envelope = Envelope::detect(action);
    let extracted = match envelope {
        Envelope::TextMessage(r) => extract_text_message(r),
        Envelope::PaidMessage(r) => extract_paid_message(r),
        Envelope::PaidSticker(r) => extract_paid_sticker(r),
        Envelope::Membership(r) => extract_membership(r),
        Envelope::Deletion | Envelope::Unknown => return Normalized::Ignored(envelope.kind()),
    };

    match extracted {
        Ok(fields) => Normalized::Record(ChatMessage {
            message_id: fields.message_id,
            timestamp: fields.timestamp,
            video_id: ctx.video_id.to_string(),
            author: fields.author,
            author_channel_id: fields.author_channel_id,
            message: fields.message,
            is_moderator: fields.is_moderator,
            is_channel_owner: fields.is_channel_owner,
            video_offset_time_msec: offset_msec,
            video_offset_time_text: fields.offset_text,
            filename: ctx.filename.to_string(),
        }),
        Err(reason) => Normalized::Malformed(format!("{}: {reason}", envelope.kind().as_str())),
    }
}

/// Fields every message-bearing renderer shares.
struct Extracted {
    message_id: String,
    timestamp: DateTime<Utc>,
    author: String,
    author_channel_id: String,
    message: String,
    is_moderator: bool,
    is_channel_owner: bool,
    offset_text: Option<String>,
}

fn extract_text_message(renderer: &Value) -> Result<Extracted, String> {
    extract(renderer, assemble_text(renderer.get("message")))
}

fn extract_paid_message(renderer: &Value) -> Result<Extracted, String> {
    // Super Chats may be amount-only; the body is then empty.
    extract(renderer, assemble_text(renderer.get("message")))
}

fn extract_paid_sticker(renderer: &Value) -> Result<Extracted, String> {
    extract(renderer, String::new())
}

fn extract_membership(renderer: &Value) -> Result<Extracted, String> {
    // Milestone messages carry a user body; plain joins only a header.
    let body = renderer
        .get("message")
        .or_else(|| renderer.get("headerSubtext"));
    extract(renderer, assemble_text(body))
}

fn extract(renderer: &Value, message: String) -> Result<Extracted, String> {
    let message_id = json_str(renderer.get("id"));
    if message_id.is_empty() {
        return Err("missing message id".to_string());
    }

    let usec = json_i64(renderer.get("timestampUsec"))
        .ok_or_else(|| format!("message {message_id} has no readable timestampUsec"))?;
    let timestamp = DateTime::from_timestamp_micros(usec)
        .filter(is_storable)
        .ok_or_else(|| format!("message {message_id} timestampUsec {usec} out of range"))?;

    let (is_moderator, is_channel_owner) = badge_flags(renderer.get("authorBadges"));

    Ok(Extracted {
        message_id,
        timestamp,
        author: json_str(renderer.get("authorName").and_then(|n| n.get("simpleText"))),
        author_channel_id: json_str(renderer.get("authorExternalChannelId")),
        message,
        is_moderator,
        is_channel_owner,
        offset_text: renderer
            .get("timestampText")
            .and_then(|t| t.get("simpleText"))
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Concatenate the runs of a message body in order. Absent bodies give "".
pub fn assemble_text(body: Option<&Value>) -> String {
    let Some(body) = body else {
        return String::new();
    };

    if let Some(text) = body.get("simpleText").and_then(Value::as_str) {
        return text.to_string();
    }

    let mut out = String::new();
    for run in body.get("runs").and_then(Value::as_array).into_iter().flatten() {
        if let Some(text) = run.get("text").and_then(Value::as_str) {
            out.push_str(text);
        } else if let Some(emoji) = run.get("emoji") {
            out.push_str(&emoji_placeholder(emoji));
        }
    }
    out
}

/// Standard emoji render as themselves; channel emoji as their shortcut
/// (`:_wave:`), which is what viewers typed.
fn emoji_placeholder(emoji: &Value) -> String {
    let is_custom = emoji
        .get("isCustomEmoji")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let emoji_id = emoji.get("emojiId").and_then(Value::as_str);
    let shortcut = emoji
        .get("shortcuts")
        .and_then(Value::as_array)
        .and_then(|s| s.first())
        .and_then(Value::as_str);

    if !is_custom {
        if let Some(id) = emoji_id.filter(|id| !id.is_empty()) {
            return id.to_string();
        }
    }
    shortcut.or(emoji_id).unwrap_or_default().to_string()
}

fn badge_flags(badges: Option<&Value>) -> (bool, bool) {
    let mut moderator = false;
    let mut owner = false;
    for badge in badges.and_then(Value::as_array).into_iter().flatten() {
        let icon = badge
            .get("liveChatAuthorBadgeRenderer")
            .and_then(|r| r.get("icon"))
            .and_then(|i| i.get("iconType"))
            .and_then(Value::as_str);
        match icon {
            Some("MODERATOR") => moderator = true,
            Some("OWNER") => owner = true,
            _ => {}
        }
    }
    (moderator, owner)
}
