//! Error types and the JSON envelope every failed call is answered with.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProxyError>;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Configuration(String),

    #[error("Network error calling vendor: {message}")]
    Network { message: String, url: String },

    #[error("Vendor rejected the request")]
    Upstream { status: u16, url: String, data: Value },

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Internal(String),
}

/// `{ok: false, error, status, hint?, data?, url?}`
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Configuration(_) | Self::Network { .. } | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Configuration(_) => Some(
                "Set the missing environment variables on the proxy and restart it.".to_string(),
            ),
            Self::Upstream { status, .. } => Some(upstream_hint(*status).to_string()),
            _ => None,
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        let (data, url) = match self {
            Self::Upstream { url, data, .. } => (Some(data.clone()), Some(url.clone())),
            Self::Network { url, .. } => (None, Some(url.clone())),
            _ => (None, None),
        };
        ErrorEnvelope {
            ok: false,
            error: self.to_string(),
            status: self.status().as_u16(),
            hint: self.hint(),
            data,
            url,
        }
    }
}

/// Advisory text for vendor status codes seen in practice.
pub fn upstream_hint(status: u16) -> &'static str {
    match status {
        401 => "Unauthorized. Check the API key/secret and the configured signing scheme.",
        403 => "Forbidden. Check IP allow-list, tenant API permissions, host/path, or auth format.",
        422 => "Validation error. Check redirect domains, phone/email/date formats, or required fields.",
        _ => "See 'data' for the vendor's response.",
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        if let Self::Unauthorized = self {
            return StatusCode::UNAUTHORIZED.into_response();
        }

        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Proxy call failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Proxy call rejected");
        }

        (status, Json(self.envelope())).into_response()
    }
}
