//! Identity-verification vendor strategies.
//!
//! [`LiveVendor`] signs and sends real calls; [`DemoVendor`] answers with
//! canned, clearly tagged results and never touches the network. Both are
//! built once at startup and [`Vendors::select`] picks one per request.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use serde_json::{json, Value};

use crate::config::AplyidConfig;
use crate::error::{ProxyError, Result};
use crate::normalize;
use crate::payload::{PepCheck, RedirectUrls, VerificationRequest};
use crate::redirect::{self, OutboundRequest, MAX_REDIRECTS};
use crate::signing;
use crate::types::VendorReply;

pub const DEMO_START_URL: &str = "https://example.com/demo-aplyid-start";

#[async_trait]
pub trait VerificationVendor: Send + Sync {
    /// Opens a hosted verification session.
    async fn start_verification(&self, request: &VerificationRequest) -> Result<VendorReply>;

    /// Runs an AML/PEP watch-list screening.
    async fn pep_check(&self, check: &PepCheck) -> Result<VendorReply>;
}

pub struct LiveVendor {
    config: AplyidConfig,
    client: Client,
}

impl LiveVendor {
    pub fn new(config: AplyidConfig) -> Result<Self> {
        let client = redirect::http_client(config.timeout)?;
        Ok(Self { config, client })
    }

    async fn post_signed(&self, target: String, payload: &Value) -> Result<VendorReply> {
        let credential = self.config.credential()?;
        let url = Url::parse(&target)
            .map_err(|e| ProxyError::Configuration(format!("invalid vendor URL {target}: {e}")))?;

        let body = serde_json::to_vec(payload)
            .map_err(|e| ProxyError::Internal(format!("failed to serialize payload: {e}")))?;
        let mut headers = signing::auth_headers(&credential, &body, Utc::now())?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let request = OutboundRequest {
            method: Method::POST,
            url,
            headers,
            body: Some(body),
        };
        let fetched = redirect::fetch(&self.client, &request, MAX_REDIRECTS).await?;
        let data = normalize::parse_body(&fetched.text);

        tracing::info!(
            url = %fetched.url,
            status = fetched.status.as_u16(),
            scheme = credential.scheme.as_str(),
            "Vendor call completed"
        );

        if !fetched.status.is_success() {
            return Err(ProxyError::Upstream {
                status: fetched.status.as_u16(),
                url: target,
                data,
            });
        }

        Ok(VendorReply {
            url: target,
            status: fetched.status.as_u16(),
            body: data,
            fake: false,
        })
    }
}

#[async_trait]
impl VerificationVendor for LiveVendor {
    async fn start_verification(&self, request: &VerificationRequest) -> Result<VendorReply> {
        let redirects = RedirectUrls {
            success: self.config.redirect_success_url.clone(),
            cancel: self.config.redirect_cancel_url.clone(),
        };
        let payload = request.to_vendor_payload(&redirects);
        self.post_signed(self.config.start_url(), &payload).await
    }

    async fn pep_check(&self, check: &PepCheck) -> Result<VendorReply> {
        self.post_signed(self.config.pep_url(), &check.to_vendor_payload())
            .await
    }
}

/// Offline stand-in used for demos.
#[derive(Debug, Default, Clone, Copy)]
pub struct DemoVendor;

#[async_trait]
impl VerificationVendor for DemoVendor {
    async fn start_verification(&self, request: &VerificationRequest) -> Result<VendorReply> {
        let token = format!("DEMO-{}", Utc::now().timestamp_millis());
        Ok(VendorReply {
            url: DEMO_START_URL.to_string(),
            status: 200,
            body: json!({
                "reference": request.reference,
                "start_process_url": format!("{DEMO_START_URL}?token={token}"),
            }),
            fake: true,
        })
    }

    async fn pep_check(&self, check: &PepCheck) -> Result<VendorReply> {
        Ok(VendorReply {
            url: "FAKE".to_string(),
            status: 200,
            body: json!({
                "reference": check.reference,
                "firstname": check.first_name,
                "lastname": check.last_name,
                "date_of_birth": check.date_of_birth.to_day_first(),
                "is_pep_watchlist_clear": true,
            }),
            fake: true,
        })
    }
}

/// The two strategies plus the process-wide default.
#[derive(Clone)]
pub struct Vendors {
    live: Arc<dyn VerificationVendor>,
    demo: Arc<dyn VerificationVendor>,
    fake_by_default: bool,
}

impl Vendors {
    pub fn new(
        live: Arc<dyn VerificationVendor>,
        demo: Arc<dyn VerificationVendor>,
        fake_by_default: bool,
    ) -> Self {
        Self {
            live,
            demo,
            fake_by_default,
        }
    }

    pub fn fake_by_default(&self) -> bool {
        self.fake_by_default
    }

    /// A per-request override wins over the process default.
    pub fn select(&self, fake_override: Option<bool>) -> &dyn VerificationVendor {
        if fake_override.unwrap_or(self.fake_by_default) {
            self.demo.as_ref()
        } else {
            self.live.as_ref()
        }
    }
}
