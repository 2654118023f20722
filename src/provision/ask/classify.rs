//! Backend response classification
//!
//! Success and failure share one transport channel: a successful call
//! returns a JSON body (or nothing at all), a failed call returns a fixed
//! multi-line text block whose `Message:` line carries a JSON payload.
//! This module decides which one a body is and extracts the structured
//! error when it is one.

use serde::Deserialize;

use crate::error::{AskErrorCode, Error, Result, SdkError};

/// JSON payload embedded in the `Message:` line of an error body
#[derive(Debug, Deserialize)]
struct MessagePayload {
    code: String,
    message: String,
}

/// Classify a raw response body.
///
/// Returns `Ok(None)` for a success body (well-formed JSON, or empty as
/// delete responses are), `Ok(Some(_))` for a recognizable error body, and
/// a shape error for anything else. An error body looks like:
///
/// ```text
/// ERROR: SDK.ServerError
/// ErrorCode:
/// Recommend:
/// RequestId:
/// Message: {"code":"ClusterNameAlreadyExist","message":"...","requestId":"...","status":400}
/// ```
///
/// The `Message:` line is located by prefix rather than by position, so a
/// body with reordered or missing filler lines still classifies as long as
/// the head line and the payload are intact.
pub fn classify(body: &str) -> Result<Option<SdkError>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    if serde_json::from_str::<serde_json::Value>(body).is_ok() {
        return Ok(None);
    }

    let mut lines = body.lines();
    let name = lines
        .next()
        .unwrap_or_default()
        .strip_prefix("ERROR: ")
        .ok_or_else(|| shape_error(body, "head line does not start with 'ERROR: '"))?;

    let payload_text = lines
        .find_map(|line| line.strip_prefix("Message: "))
        .ok_or_else(|| shape_error(body, "no 'Message:' line"))?;

    let payload: MessagePayload = serde_json::from_str(payload_text)
        .map_err(|_| shape_error(body, "'Message:' payload is not the expected JSON"))?;

    Ok(Some(SdkError {
        name: name.trim().to_string(),
        code: AskErrorCode::from_code(&payload.code),
        message: payload.message,
    }))
}

fn shape_error(body: &str, reason: &str) -> Error {
    let preview: String = body.chars().take(120).collect();
    Error::ResponseShape(format!("{reason}; body starts with {preview:?}"))
}
