//! Generic pass-through to the AML screening vendor.
//!
//! The caller chooses the path and method; the proxy pins the base URL and
//! attaches the API key so the browser never sees it.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use serde::Serialize;
use serde_json::Value;

use crate::config::AmlConfig;
use crate::error::{ProxyError, Result};
use crate::redirect::{self, OutboundRequest, MAX_REDIRECTS};
use crate::types::ForwardRequest;

#[derive(Debug, Serialize)]
pub struct ForwardResult {
    pub url: String,
    pub status: u16,
    pub ok: bool,
    pub data: Value,
}

pub struct AmlForwarder {
    config: AmlConfig,
    client: Client,
}

/// Rejects paths that are relative or try to climb out of the base URL,
/// including percent-encoded dot segments such as `%2e%2e`.
pub fn safe_path(path: &str) -> Result<&str> {
    if !path.starts_with('/') {
        return Err(ProxyError::Validation("path must start with '/'".to_string()));
    }
    let dot_segment = path.split(['/', '?', '#']).any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    });
    if path.contains("..") || dot_segment {
        return Err(ProxyError::Validation("invalid path".to_string()));
    }
    Ok(path)
}

/// The resolved URL must stay under the configured base path.
fn within_base(base: &Url, target: &Url) -> bool {
    let root = base.path().trim_end_matches('/');
    let path = target.path();
    target.origin() == base.origin()
        && (path == root || path.starts_with(&format!("{root}/")))
}

pub fn parse_method(method: Option<&str>) -> Result<Method> {
    match method.map(|m| m.trim().to_ascii_uppercase()).as_deref() {
        None | Some("POST") => Ok(Method::POST),
        Some("GET") => Ok(Method::GET),
        Some("PUT") => Ok(Method::PUT),
        Some("PATCH") => Ok(Method::PATCH),
        Some(other) => Err(ProxyError::Validation(format!(
            "method must be one of GET, POST, PUT, PATCH, got {other}"
        ))),
    }
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl AmlForwarder {
    pub fn new(config: AmlConfig, client: Client) -> Self {
        Self { config, client }
    }

    pub async fn forward(&self, request: ForwardRequest) -> Result<ForwardResult> {
        let (Some(base), Some(key)) = (&self.config.base_url, &self.config.api_key) else {
            return Err(ProxyError::Configuration(
                "Missing REALAML env vars: set REALAML_BASE_URL and REALAML_API_KEY".to_string(),
            ));
        };

        let path = safe_path(&request.path)?;
        let method = parse_method(request.method.as_deref())?;

        let base_url = Url::parse(base)
            .map_err(|e| ProxyError::Configuration(format!("invalid REALAML_BASE_URL: {e}")))?;
        let mut url = Url::parse(&format!("{base}{path}"))
            .map_err(|e| ProxyError::Validation(format!("invalid upstream URL: {e}")))?;
        if !within_base(&base_url, &url) {
            return Err(ProxyError::Validation("invalid path".to_string()));
        }
        if let Some(search) = request.search.as_ref().filter(|s| !s.is_empty()) {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in search {
                pairs.append_pair(k, &query_value(v));
            }
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Api-Key {key}")).map_err(|_| {
                ProxyError::Configuration("REALAML_API_KEY is not a valid header value".to_string())
            })?,
        );

        let body = if method == Method::GET {
            None
        } else {
            let payload = request.payload.unwrap_or_else(|| Value::Object(Default::default()));
            Some(serde_json::to_vec(&payload).map_err(|e| {
                ProxyError::Internal(format!("failed to serialize payload: {e}"))
            })?)
        };

        let outbound = OutboundRequest {
            method: method.clone(),
            url: url.clone(),
            headers,
            body,
        };
        let fetched = redirect::fetch(&self.client, &outbound, MAX_REDIRECTS).await?;

        let is_json = fetched
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("application/json"));
        let data = if is_json {
            serde_json::from_str(&fetched.text).unwrap_or(Value::String(fetched.text))
        } else {
            Value::String(fetched.text)
        };

        tracing::info!(
            method = %method,
            path = path,
            status = fetched.status.as_u16(),
            "Forwarded AML request"
        );

        Ok(ForwardResult {
            url: url.to_string(),
            status: fetched.status.as_u16(),
            ok: fetched.status.is_success(),
            data,
        })
    }
}
