//! Response envelope shared by every backend endpoint.
//!
//! The backend wraps every JSON response as `{ code, message, data }` with
//! string codes; `"200"` is success and the `401xx` family (40101 token
//! expired, 40102 token invalid, ...) signals an unauthorized call.

use serde::{Deserialize, Deserializer};

/// Header identifying which role a request acts as.
pub const SESSION_ROLE_HEADER: &str = "X-Session-Role";

pub const SUCCESS_CODE: &str = "200";

/// Standard response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(default, deserialize_with = "code_as_string")]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Whether this envelope signals an unauthorized call. Prefix match on
    /// purpose: the backend subdivides 401 into `401xx` sub-codes.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.code.starts_with("401")
    }

    /// Human-facing message, falling back to the code when the backend sent
    /// none.
    #[must_use]
    pub fn display_message(&self) -> String {
        if self.message.trim().is_empty() {
            format!("request failed (code {})", self.code)
        } else {
            self.message.clone()
        }
    }
}

/// Parse an envelope from a response body, if the body is one.
#[must_use]
pub fn parse_envelope(body: &str) -> Option<Envelope> {
    serde_json::from_str::<Envelope>(body).ok()
}

/// Heuristic for "the proxy served us a web page instead of JSON".
#[must_use]
pub fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start();
    let lowered = head
        .get(..15.min(head.len()))
        .unwrap_or_default()
        .to_ascii_lowercase();
    lowered.starts_with("<!doctype") || lowered.starts_with("<html")
}

/// Some backend builds emit numeric codes; normalize both to strings.
fn code_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

#[cfg(test)]
#[path = "wire_test.rs"]
mod tests;
