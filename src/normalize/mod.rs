//! Record normalization: raw yt-dlp JSON in, canonical rows out.
//!
//! Normalizers never fail on a single bad record. Each record produces a
//! [`Normalized`] outcome that the ingestor tallies.

pub mod chat;
pub mod envelope;
pub mod metadata;

use serde_json::Value;

use crate::error::{Error, Result};
pub use envelope::{Envelope, EnvelopeKind};

/// Outcome of normalizing one raw record.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized<T> {
    /// A canonical record was extracted.
    Record(T),
    /// The record is of a shape that carries no chat message (deletion
    /// markers, tickers, banners, ...). Not an error.
    Ignored(EnvelopeKind),
    /// The record should have carried a message but a required field is
    /// missing or unreadable.
    Malformed(String),
}

impl<T> Normalized<T> {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Normalized::Malformed(reason.into())
    }

    #[cfg(test)]
    pub fn record(&self) -> Option<&T> {
        match self {
            Normalized::Record(r) => Some(r),
            _ => None,
        }
    }

    /// `Ok(Some)` for a record, `Ok(None)` for an ignorable shape, and
    /// `Err(MalformedRecord)` otherwise.
    pub fn into_result(self) -> Result<Option<T>> {
        match self {
            Normalized::Record(r) => Ok(Some(r)),
            Normalized::Ignored(_) => Ok(None),
            Normalized::Malformed(reason) => Err(Error::malformed(reason)),
        }
    }
}

/// Integer from a JSON number or a numeric string (yt-dlp emits both).
pub(crate) fn json_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// String field, empty when absent or not a string.
pub(crate) fn json_str(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}
