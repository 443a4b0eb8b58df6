use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::env::ReadEnv;
use crate::error::ProxyError;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_APLYID_BASE_URL: &str = "https://integration.aplyid.com";
const DEFAULT_START_PATH: &str = "/api/v4/identity-verifications";
const DEFAULT_PEP_PATH: &str = "/api/v4/pep_checks";
const DEFAULT_TIMEOUT_SECS: u64 = 20;

const TRUTHY: [&str; 4] = ["true", "1", "yes", "on"];
const FALSY: [&str; 4] = ["false", "0", "no", "off"];

/// `true`, `1`, `yes` or `on`, case-insensitive.
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    TRUTHY.contains(&value.as_str())
}

/// `Some(true)` for a truthy value, `Some(false)` for `false`, `0`, `no` or
/// `off`, and `None` for anything else, including the empty string.
pub fn parse_flag(value: &str) -> Option<bool> {
    let value = value.trim().to_ascii_lowercase();
    if TRUTHY.contains(&value.as_str()) {
        Some(true)
    } else if FALSY.contains(&value.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// How outbound vendor calls are authenticated. One per process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SigningScheme {
    /// `Aply-API-Key` + `Aply-Secret` headers.
    ApiKeyHeader,
    /// `Authorization: Basic base64(key:secret)`.
    Basic,
    /// `Aply-API-Key`, `Aply-Date` and a body-bound `Aply-Signature`.
    #[default]
    Hmac,
}

impl SigningScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningScheme::ApiKeyHeader => "api-key-header",
            SigningScheme::Basic => "basic",
            SigningScheme::Hmac => "hmac",
        }
    }
}

impl FromStr for SigningScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api-key-header" | "api-key" | "headers" => Ok(SigningScheme::ApiKeyHeader),
            "basic" => Ok(SigningScheme::Basic),
            "hmac" | "hmac-header" | "signature" => Ok(SigningScheme::Hmac),
            other => Err(format!("unknown signing scheme: {other}")),
        }
    }
}

/// Which `Authorization` form inbound webhooks must carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WebhookAuthMode {
    #[default]
    Bearer,
    /// Secret holds `user:pass`.
    Basic,
}

impl WebhookAuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookAuthMode::Bearer => "bearer",
            WebhookAuthMode::Basic => "basic",
        }
    }
}

/// Resolved credentials for the identity-verification vendor.
#[derive(Clone)]
pub struct VendorCredential {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
    pub scheme: SigningScheme,
}

impl fmt::Debug for VendorCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VendorCredential")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("scheme", &self.scheme)
            .finish()
    }
}

#[derive(Clone)]
pub struct AplyidConfig {
    pub base_url: String,
    pub start_path: String,
    pub pep_path: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub scheme: SigningScheme,
    pub timeout: Duration,
    pub redirect_success_url: String,
    pub redirect_cancel_url: String,
}

impl fmt::Debug for AplyidConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AplyidConfig")
            .field("base_url", &self.base_url)
            .field("start_path", &self.start_path)
            .field("pep_path", &self.pep_path)
            .field("api_key_set", &self.api_key.is_some())
            .field("api_secret_set", &self.api_secret.is_some())
            .field("scheme", &self.scheme)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AplyidConfig {
    /// Fails before any network attempt when the key or secret is absent.
    pub fn credential(&self) -> Result<VendorCredential, ProxyError> {
        match (&self.api_key, &self.api_secret) {
            (Some(key), Some(secret)) => Ok(VendorCredential {
                api_key: key.clone(),
                api_secret: secret.clone(),
                base_url: self.base_url.clone(),
                scheme: self.scheme,
            }),
            _ => Err(ProxyError::Configuration(
                "Missing APLYiD API credentials: set APLYID_API_KEY and APLYID_API_SECRET"
                    .to_string(),
            )),
        }
    }

    pub fn start_url(&self) -> String {
        format!("{}{}", self.base_url, self.start_path)
    }

    pub fn pep_url(&self) -> String {
        format!("{}{}", self.base_url, self.pep_path)
    }
}

#[derive(Clone)]
pub struct AmlConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl fmt::Debug for AmlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmlConfig")
            .field("base_url", &self.base_url)
            .field("api_key_set", &self.api_key.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub struct WebhookConfig {
    pub secret: Option<String>,
    pub mode: WebhookAuthMode,
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("secret_set", &self.secret.is_some())
            .field("mode", &self.mode)
            .finish()
    }
}

/// Configuration for the proxy.
///
/// Resolved from environment variables:
/// - `VOI_PROXY_PORT`: HTTP listening port (default: 8080)
/// - `PUBLIC_BASE_URL`: origin the portal is served from, used for redirect defaults
/// - `APLYID_BASE_URL`, `APLYID_START_PATH`, `APLYID_PEP_PATH`: vendor endpoints
/// - `APLYID_API_KEY`, `APLYID_API_SECRET`: vendor credentials (no default)
/// - `APLYID_SIGNING_SCHEME`: `hmac` (default), `basic` or `api-key-header`
/// - `APLYID_TIMEOUT_SECS`: per-hop outbound timeout (default: 20)
/// - `APLYID_FAKE_START`: demo mode default
/// - `APLYID_REDIRECT_SUCCESS`, `APLYID_REDIRECT_CANCEL`: hosted-flow return URLs
/// - `APLYID_WEBHOOK_SECRET`, `APLYID_WEBHOOK_AUTH`: inbound webhook authorization
/// - `REALAML_BASE_URL`, `REALAML_API_KEY`: generic AML forwarder target
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub fake_by_default: bool,
    pub aplyid: AplyidConfig,
    pub aml: AmlConfig,
    pub webhook: WebhookConfig,
}

impl Config {
    pub fn from_env<E: ReadEnv>(env: &E) -> Self {
        let public_base = non_empty(env, "PUBLIC_BASE_URL")
            .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string());
        let public_base = public_base.trim_end_matches('/').to_string();
        let thanks = format!("{public_base}/voi/thanks");

        let scheme = match non_empty(env, "APLYID_SIGNING_SCHEME") {
            Some(raw) => raw.parse().unwrap_or_else(|e: String| {
                tracing::warn!(error = %e, "Falling back to default signing scheme");
                SigningScheme::default()
            }),
            None => SigningScheme::default(),
        };

        let webhook_mode = match non_empty(env, "APLYID_WEBHOOK_AUTH")
            .map(|m| m.to_ascii_lowercase())
            .as_deref()
        {
            Some("basic") => WebhookAuthMode::Basic,
            _ => WebhookAuthMode::Bearer,
        };

        Self {
            port: env
                .var("VOI_PROXY_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            fake_by_default: env
                .var("APLYID_FAKE_START")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
            aplyid: AplyidConfig {
                base_url: non_empty(env, "APLYID_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_APLYID_BASE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                start_path: non_empty(env, "APLYID_START_PATH")
                    .unwrap_or_else(|| DEFAULT_START_PATH.to_string()),
                pep_path: non_empty(env, "APLYID_PEP_PATH")
                    .unwrap_or_else(|| DEFAULT_PEP_PATH.to_string()),
                api_key: non_empty(env, "APLYID_API_KEY"),
                api_secret: non_empty(env, "APLYID_API_SECRET"),
                scheme,
                timeout: Duration::from_secs(
                    env.var("APLYID_TIMEOUT_SECS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(DEFAULT_TIMEOUT_SECS),
                ),
                redirect_success_url: non_empty(env, "APLYID_REDIRECT_SUCCESS")
                    .unwrap_or_else(|| thanks.clone()),
                redirect_cancel_url: non_empty(env, "APLYID_REDIRECT_CANCEL")
                    .unwrap_or(thanks),
            },
            aml: AmlConfig {
                base_url: non_empty(env, "REALAML_BASE_URL")
                    .map(|b| b.trim_end_matches('/').to_string()),
                api_key: non_empty(env, "REALAML_API_KEY"),
            },
            webhook: WebhookConfig {
                secret: non_empty(env, "APLYID_WEBHOOK_SECRET"),
                mode: webhook_mode,
            },
        }
    }
}

fn non_empty<E: ReadEnv>(env: &E, key: &str) -> Option<String> {
    env.var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::InMemoryEnv;

    #[test]
    fn defaults_when_no_env_vars() {
        let env = InMemoryEnv::new();
        let config = Config::from_env(&env);

        assert_eq!(config.port, 8080);
        assert!(!config.fake_by_default);
        assert_eq!(config.aplyid.base_url, "https://integration.aplyid.com");
        assert_eq!(
            config.aplyid.start_url(),
            "https://integration.aplyid.com/api/v4/identity-verifications"
        );
        assert_eq!(
            config.aplyid.pep_url(),
            "https://integration.aplyid.com/api/v4/pep_checks"
        );
        assert_eq!(config.aplyid.scheme, SigningScheme::Hmac);
        assert_eq!(config.aplyid.timeout, Duration::from_secs(20));
        assert_eq!(
            config.aplyid.redirect_success_url,
            "http://localhost:8080/voi/thanks"
        );
        assert!(config.aml.base_url.is_none());
        assert!(config.webhook.secret.is_none());
        assert_eq!(config.webhook.mode, WebhookAuthMode::Bearer);
    }

    #[test]
    fn reads_all_env_vars() {
        let env = InMemoryEnv::new();
        env.set("VOI_PROXY_PORT", "9090");
        env.set("PUBLIC_BASE_URL", "https://portal.example/");
        env.set("APLYID_BASE_URL", "https://api.aplyid.com/");
        env.set("APLYID_START_PATH", "/api/v4/verifications");
        env.set("APLYID_API_KEY", "key");
        env.set("APLYID_API_SECRET", "secret");
        env.set("APLYID_SIGNING_SCHEME", "basic");
        env.set("APLYID_TIMEOUT_SECS", "5");
        env.set("APLYID_FAKE_START", "Yes");
        env.set("APLYID_REDIRECT_CANCEL", "https://portal.example/voi");
        env.set("APLYID_WEBHOOK_SECRET", "hook");
        env.set("APLYID_WEBHOOK_AUTH", "basic");
        env.set("REALAML_BASE_URL", "https://api-staging.realaml.com/api/v1");
        env.set("REALAML_API_KEY", "aml-key");

        let config = Config::from_env(&env);

        assert_eq!(config.port, 9090);
        assert!(config.fake_by_default);
        assert_eq!(config.aplyid.start_url(), "https://api.aplyid.com/api/v4/verifications");
        assert_eq!(config.aplyid.scheme, SigningScheme::Basic);
        assert_eq!(config.aplyid.timeout, Duration::from_secs(5));
        assert_eq!(
            config.aplyid.redirect_success_url,
            "https://portal.example/voi/thanks"
        );
        assert_eq!(config.aplyid.redirect_cancel_url, "https://portal.example/voi");
        assert_eq!(config.webhook.secret.as_deref(), Some("hook"));
        assert_eq!(config.webhook.mode, WebhookAuthMode::Basic);
        assert_eq!(config.aml.api_key.as_deref(), Some("aml-key"));
    }

    #[test]
    fn invalid_numbers_and_scheme_fall_back_to_defaults() {
        let env = InMemoryEnv::new();
        env.set("VOI_PROXY_PORT", "not-a-number");
        env.set("APLYID_TIMEOUT_SECS", "soon");
        env.set("APLYID_SIGNING_SCHEME", "carrier-pigeon");

        let config = Config::from_env(&env);

        assert_eq!(config.port, 8080);
        assert_eq!(config.aplyid.timeout, Duration::from_secs(20));
        assert_eq!(config.aplyid.scheme, SigningScheme::Hmac);
    }

    #[test]
    fn missing_secret_is_a_configuration_error() {
        let env = InMemoryEnv::new();
        env.set("APLYID_API_KEY", "key");
        env.set("APLYID_API_SECRET", "   ");

        let err = Config::from_env(&env).aplyid.credential().unwrap_err();

        assert!(matches!(err, ProxyError::Configuration(_)));
        assert!(err.to_string().contains("APLYID_API_SECRET"));
    }

    #[test]
    fn credential_debug_never_shows_secrets() {
        let env = InMemoryEnv::new();
        env.set("APLYID_API_KEY", "key-123");
        env.set("APLYID_API_SECRET", "secret-456");

        let config = Config::from_env(&env);
        let rendered = format!("{:?} {:?}", config, config.aplyid.credential().unwrap());

        assert!(!rendered.contains("key-123"));
        assert!(!rendered.contains("secret-456"));
    }

    #[test]
    fn truthy_values() {
        for v in ["true", "TRUE", "1", "yes", " on "] {
            assert!(is_truthy(v), "{v}");
        }
        for v in ["false", "0", "", "nope"] {
            assert!(!is_truthy(v), "{v}");
        }
    }

    #[test]
    fn flag_values() {
        assert_eq!(parse_flag("YES"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag(""), None);
        assert_eq!(parse_flag("maybe"), None);
    }
}
