//! Provider message → [`EmailRecord`] conversion.
//!
//! Normalization never fails: a message that cannot be read yields a
//! placeholder record explaining why, so every fetched message reaches the
//! classifier exactly once.

pub mod clean;
pub mod html;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use log::warn;
use thiserror::Error;

use crate::domain::email::{EmailRecord, UNKNOWN_ID};
use crate::mail::raw::{MessagePart, RawMessage};

pub use clean::{MAX_BODY_CHARS, NO_CONTENT, TRUNCATION_MARKER, clean_body};

pub const PARSE_ERROR_SUBJECT: &str = "Error: Could not parse message";

/// Gmail body data is base64url; padding is present on some parts only.
const BODY_B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("message has no id")]
    MissingId,
    #[error("message has no payload")]
    MissingPayload,
    #[error("could not decode {mime} body: {reason}")]
    Decode { mime: String, reason: String },
}

/// Build the record for one message, falling back to a placeholder on error.
pub fn normalize_message(raw: &RawMessage) -> EmailRecord {
    match try_normalize(raw) {
        Ok(record) => record,
        Err(e) => {
            let id = message_id(raw);
            warn!("error parsing message {id}: {e}");
            EmailRecord {
                message_id: id,
                subject: PARSE_ERROR_SUBJECT.to_string(),
                sender: "unknown".to_string(),
                body: format!("Error parsing message: {e}"),
                has_attachments: false,
            }
        }
    }
}

fn message_id(raw: &RawMessage) -> String {
    raw.id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(UNKNOWN_ID)
        .to_string()
}

pub fn try_normalize(raw: &RawMessage) -> Result<EmailRecord, NormalizeError> {
    let id = raw
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(NormalizeError::MissingId)?;
    let payload = raw.payload.as_ref().ok_or(NormalizeError::MissingPayload)?;

    let parts = top_level_parts(payload);
    let body = match find_body(&parts)? {
        Some(text) => clean_body(&text),
        None => NO_CONTENT.to_string(),
    };

    Ok(EmailRecord {
        message_id: id.to_string(),
        subject: header_value(payload, "subject"),
        sender: header_value(payload, "from"),
        body,
        has_attachments: has_attachments(&parts),
    })
}

/// First header with the given name, compared case-insensitively.
pub fn header_value(payload: &MessagePart, name: &str) -> String {
    payload
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
        .unwrap_or_default()
}

/// A single-part message is its own only part.
fn top_level_parts(payload: &MessagePart) -> Vec<&MessagePart> {
    if payload.parts.is_empty() {
        vec![payload]
    } else {
        payload.parts.iter().collect()
    }
}

fn has_attachments(parts: &[&MessagePart]) -> bool {
    parts
        .iter()
        .any(|p| p.filename.as_deref().is_some_and(|f| !f.is_empty()))
}

/// text/plain wins over text/html; within a type, top-level parts are
/// searched before one level of nested parts.
fn find_body(parts: &[&MessagePart]) -> Result<Option<String>, NormalizeError> {
    for mime in ["text/plain", "text/html"] {
        let top = parts.iter().copied();
        let nested = parts.iter().flat_map(|p| p.parts.iter());
        let Some(part) = top
            .chain(nested)
            .find(|p| p.is_mime(mime) && p.data().is_some())
        else {
            continue;
        };

        let text = decode_part(part, mime)?;
        return Ok(Some(if mime == "text/html" {
            html::html_to_text(&text)
        } else {
            text
        }));
    }
    Ok(None)
}

fn decode_part(part: &MessagePart, mime: &str) -> Result<String, NormalizeError> {
    let data = part.data().unwrap_or_default();
    let bytes = BODY_B64
        .decode(data.trim())
        .map_err(|e| NormalizeError::Decode {
            mime: mime.to_string(),
            reason: e.to_string(),
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
