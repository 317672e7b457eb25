use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Reads a JSON body, keeping the raw value around for backend error payloads.
///
/// Non-success statuses surface as [`Error::Http`]; bodies that are not the
/// expected shape surface as [`Error::Validation`].
pub async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> Result<(T, Value)> {
    let response = response.error_for_status()?;
    let body = response.text().await?;
    debug!("{} response: {}", what, body);

    let raw: Value = serde_json::from_str(&body)
        .map_err(|e| Error::validation(format!("{what} returned malformed JSON: {e}")))?;
    let parsed = serde_json::from_value::<T>(raw.clone())
        .map_err(|e| Error::validation(format!("unexpected {what} response: {e}")))?;

    Ok((parsed, raw))
}

/// Treats a `status` field other than `"ok"` as a backend-reported failure.
pub fn ensure_status_ok(status: Option<&str>, raw: &Value) -> Result<()> {
    match status {
        Some(s) if !s.eq_ignore_ascii_case("ok") => Err(Error::Backend(raw.clone())),
        _ => Ok(()),
    }
}
