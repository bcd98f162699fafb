//! Decoding of `application/x-www-form-urlencoded` request bodies.

use tracing::debug;

use crate::error::DecodeError;
use crate::types::{SlackAction, SlackCommand};

/// Decodes a slash-command body into a [`SlackCommand`].
///
/// Only a body that is not UTF-8 fails as a whole. Segments without `=` are
/// skipped, values may contain further `=` and unknown keys are ignored.
pub fn decode_command(body: &[u8]) -> Result<SlackCommand, DecodeError> {
    let body = std::str::from_utf8(body).map_err(|_| DecodeError::NotUtf8)?;

    let mut command = SlackCommand::default();
    for (key, value) in pairs(body) {
        if !command.set_field(&key, value) {
            debug!(key = %key, "ignoring unrecognized form field");
        }
    }

    Ok(command)
}

/// Decodes an interactive action body.
///
/// Accepts raw JSON, or the platform's form shape where the JSON sits
/// url-encoded in a `payload` field.
pub fn decode_action(body: &[u8]) -> Result<SlackAction, DecodeError> {
    let text = std::str::from_utf8(body).map_err(|_| DecodeError::NotUtf8)?;
    let trimmed = text.trim_start();

    if trimmed.starts_with('{') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    let payload = pairs(text)
        .find(|(key, _)| key == "payload")
        .map(|(_, value)| value)
        .ok_or(DecodeError::MissingPayload)?;

    Ok(serde_json::from_str(&payload)?)
}

/// Percent-decoded `(key, value)` pairs of a form body, in order.
fn pairs(body: &str) -> impl Iterator<Item = (String, String)> + '_ {
    body.split('&')
        .filter(|segment| !segment.is_empty())
        .filter_map(decode_pair)
}

fn decode_pair(segment: &str) -> Option<(String, String)> {
    if !segment.contains('=') {
        debug!(segment, "skipping form segment without `=`");
        return None;
    }

    // A single segment holds exactly one pair; serde_urlencoded splits it on
    // the first `=` and handles `+` and `%XX` escapes.
    match serde_urlencoded::from_str::<Vec<(String, String)>>(segment) {
        Ok(decoded) => decoded.into_iter().next(),
        Err(err) => {
            debug!(segment, error = %err, "skipping undecodable form segment");
            None
        }
    }
}
