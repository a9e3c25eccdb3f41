//! Classification of live-chat actions into envelope kinds.
//!
//! yt-dlp stores each chat action the way the YouTube player received it: an
//! action key (`addChatItemAction`, `removeChatItemAction`, ...) wrapping a
//! renderer key that names the UI element (`liveChatTextMessageRenderer`,
//! `liveChatPaidMessageRenderer`, ...). Detection is by presence of those keys.

use serde::Serialize;
use serde_json::Value;

/// Known envelope kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    TextMessage,
    PaidMessage,
    PaidSticker,
    Membership,
    Deletion,
    Unknown,
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeKind::TextMessage => "text_message",
            EnvelopeKind::PaidMessage => "paid_message",
            EnvelopeKind::PaidSticker => "paid_sticker",
            EnvelopeKind::Membership => "membership",
            EnvelopeKind::Deletion => "deletion",
            EnvelopeKind::Unknown => "unknown",
        }
    }
}

const ADD_CHAT_ITEM: &str = "addChatItemAction";

const DELETION_ACTIONS: &[&str] = &[
    "removeChatItemAction",
    "removeChatItemByAuthorAction",
    "markChatItemAsDeletedAction",
    "markChatItemsByAuthorAsDeletedAction",
];

/// One action, classified, borrowing its renderer object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Envelope<'a> {
    TextMessage(&'a Value),
    PaidMessage(&'a Value),
    PaidSticker(&'a Value),
    Membership(&'a Value),
    Deletion,
    Unknown,
}

impl<'a> Envelope<'a> {
    /// Classify a single action object.
    pub fn detect(action: &'a Value) -> Self {
        if let Some(item) = action.get(ADD_CHAT_ITEM).and_then(|a| a.get("item")) {
            if let Some(r) = item.get("liveChatTextMessageRenderer") {
                return Envelope::TextMessage(r);
            }
            if let Some(r) = item.get("liveChatPaidMessageRenderer") {
                return Envelope::PaidMessage(r);
            }
            if let Some(r) = item.get("liveChatPaidStickerRenderer") {
                return Envelope::PaidSticker(r);
            }
            if let Some(r) = item.get("liveChatMembershipItemRenderer") {
                return Envelope::Membership(r);
            }
            return Envelope::Unknown;
        }

        if DELETION_ACTIONS.iter().any(|key| action.get(key).is_some()) {
            return Envelope::Deletion;
        }

        Envelope::Unknown
    }

    /// True when the object looks like a bare action rather than a wrapped
    /// replay line.
    pub fn is_action(value: &Value) -> bool {
        value.get(ADD_CHAT_ITEM).is_some()
            || DELETION_ACTIONS.iter().any(|key| value.get(key).is_some())
    }

    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::TextMessage(_) => EnvelopeKind::TextMessage,
            Envelope::PaidMessage(_) => EnvelopeKind::PaidMessage,
            Envelope::PaidSticker(_) => EnvelopeKind::PaidSticker,
            Envelope::Membership(_) => EnvelopeKind::Membership,
            Envelope::Deletion => EnvelopeKind::Deletion,
            Envelope::Unknown => EnvelopeKind::Unknown,
        }
    }
}
