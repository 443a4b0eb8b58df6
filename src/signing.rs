use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::{SigningScheme, VendorCredential, WebhookAuthMode, WebhookConfig};
use crate::error::{ProxyError, Result};

type HmacSha256 = Hmac<Sha256>;

pub const API_KEY_HEADER: &str = "aply-api-key";
pub const SECRET_HEADER: &str = "aply-secret";
pub const DATE_HEADER: &str = "aply-date";
pub const SIGNATURE_HEADER: &str = "aply-signature";

/// `base64(HMAC_SHA256(secret, date || body))`
pub fn hmac_signature(secret: &str, date: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ProxyError::Internal(format!("HMAC key rejected: {e}")))?;
    mac.update(date.as_bytes());
    mac.update(body);
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

pub fn basic_token(user: &str, pass: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"))
}

/// Authentication headers for one outbound vendor call.
pub fn auth_headers(
    credential: &VendorCredential,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    match credential.scheme {
        SigningScheme::ApiKeyHeader => {
            insert(&mut headers, API_KEY_HEADER, &credential.api_key)?;
            insert(&mut headers, SECRET_HEADER, &credential.api_secret)?;
        }
        SigningScheme::Basic => {
            let token = basic_token(&credential.api_key, &credential.api_secret);
            insert(&mut headers, AUTHORIZATION.as_str(), &format!("Basic {token}"))?;
        }
        SigningScheme::Hmac => {
            let date = now.to_rfc3339_opts(SecondsFormat::Millis, true);
            let signature = hmac_signature(&credential.api_secret, &date, body)?;
            insert(&mut headers, API_KEY_HEADER, &credential.api_key)?;
            insert(&mut headers, DATE_HEADER, &date)?;
            insert(&mut headers, SIGNATURE_HEADER, &signature)?;
        }
    }
    Ok(headers)
}

fn insert(headers: &mut HeaderMap, name: &str, value: &str) -> Result<()> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| ProxyError::Internal(format!("invalid header name {name}: {e}")))?;
    // Never echo the value: it is a credential.
    let value = HeaderValue::from_str(value).map_err(|_| {
        ProxyError::Configuration(format!("credential for {name} is not a valid header value"))
    })?;
    headers.insert(name, value);
    Ok(())
}

/// The exact `Authorization` value inbound webhooks must carry, or `None`
/// when no secret is configured.
pub fn expected_webhook_authorization(config: &WebhookConfig) -> Option<String> {
    let secret = config.secret.as_deref()?;
    Some(match config.mode {
        WebhookAuthMode::Bearer => format!("Bearer {secret}"),
        WebhookAuthMode::Basic => {
            let (user, pass) = secret.split_once(':').unwrap_or((secret, ""));
            format!("Basic {}", basic_token(user, pass))
        }
    })
}

/// Constant-time comparison of an `Authorization` header value.
pub fn authorization_matches(expected: &str, actual: &str) -> bool {
    expected.as_bytes().ct_eq(actual.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn credential(scheme: SigningScheme) -> VendorCredential {
        VendorCredential {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            base_url: "https://vendor".to_string(),
            scheme,
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn api_key_scheme_sends_key_and_secret_verbatim() {
        let headers = auth_headers(&credential(SigningScheme::ApiKeyHeader), b"{}", fixed_now())
            .unwrap();
        assert_eq!(headers.get(API_KEY_HEADER).unwrap(), "key");
        assert_eq!(headers.get(SECRET_HEADER).unwrap(), "secret");
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn basic_scheme_encodes_key_and_secret() {
        let headers =
            auth_headers(&credential(SigningScheme::Basic), b"{}", fixed_now()).unwrap();
        // base64("key:secret")
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Basic a2V5OnNlY3JldA==");
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn hmac_scheme_signs_date_and_body() {
        let body = br#"{"firstname":"Test"}"#;
        let headers = auth_headers(&credential(SigningScheme::Hmac), body, fixed_now()).unwrap();

        let date = headers.get(DATE_HEADER).unwrap().to_str().unwrap();
        assert_eq!(date, "2024-05-01T12:00:00.000Z");
        assert_eq!(headers.get(API_KEY_HEADER).unwrap(), "key");

        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(date.as_bytes());
        mac.update(body);
        let expected =
            base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());
        assert_eq!(headers.get(SIGNATURE_HEADER).unwrap().to_str().unwrap(), expected);
    }

    #[test]
    fn hmac_signature_is_bound_to_body() {
        let a = hmac_signature("secret", "2024-05-01T12:00:00.000Z", b"original").unwrap();
        let b = hmac_signature("secret", "2024-05-01T12:00:00.000Z", b"tampered").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn credential_with_newline_is_rejected_without_leaking() {
        let mut cred = credential(SigningScheme::ApiKeyHeader);
        cred.api_secret = "bad\nsecret".to_string();
        let err = auth_headers(&cred, b"", fixed_now()).unwrap_err();
        assert!(matches!(err, ProxyError::Configuration(_)));
        assert!(!err.to_string().contains("bad"));
    }

    #[test]
    fn webhook_bearer_expectation() {
        let config = WebhookConfig {
            secret: Some("hook".to_string()),
            mode: WebhookAuthMode::Bearer,
        };
        assert_eq!(
            expected_webhook_authorization(&config).as_deref(),
            Some("Bearer hook")
        );
    }

    #[test]
    fn webhook_basic_expectation() {
        let config = WebhookConfig {
            secret: Some("user:pass".to_string()),
            mode: WebhookAuthMode::Basic,
        };
        assert_eq!(
            expected_webhook_authorization(&config).as_deref(),
            Some("Basic dXNlcjpwYXNz")
        );
    }

    #[test]
    fn webhook_without_secret_is_open() {
        let config = WebhookConfig {
            secret: None,
            mode: WebhookAuthMode::Bearer,
        };
        assert!(expected_webhook_authorization(&config).is_none());
    }

    #[test]
    fn authorization_comparison() {
        assert!(authorization_matches("Bearer hook", "Bearer hook"));
        assert!(!authorization_matches("Bearer hook", "Bearer hoo"));
        assert!(!authorization_matches("Bearer hook", "Bearer hooK"));
        assert!(!authorization_matches("Bearer hook", ""));
        assert!(!authorization_matches("Bearer hook", "Bearer hook "));
    }
}
