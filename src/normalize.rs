//! Best-effort reading of vendor responses whose shape varies by endpoint
//! version and region.

use serde_json::{json, Value};

/// Keys that have carried the hosted session URL, in priority order.
pub const START_URL_KEYS: [&str; 5] = ["start_process_url", "start_url", "url", "link", "startUrl"];

/// Empty body → `{}`, JSON → the value, anything else → `{"raw": text}`.
pub fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "raw": text }))
}

/// First present, non-empty string among [`START_URL_KEYS`].
pub fn start_url(body: &Value) -> Option<String> {
    START_URL_KEYS.iter().find_map(|key| {
        body.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    })
}
