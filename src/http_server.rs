use crate::config::{parse_flag, Config};
use crate::error::{ProxyError, Result};
use crate::forward::{AmlForwarder, ForwardResult};
use crate::normalize;
use crate::payload::{PepCheck, VerificationRequest};
use crate::redirect;
use crate::signing;
use crate::store::{EventBuffer, SharedEvents, DEFAULT_CAPACITY};
use crate::types::{ForwardRequest, PepRequest, Product, StartRequest, VendorReply};
use crate::vendor::{DemoVendor, LiveVendor, Vendors};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Non-secret view of the running configuration, served on `/diag`.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub version: &'static str,
    pub fake_by_default: bool,
    pub signing_scheme: &'static str,
    pub aplyid_base_url: String,
    pub aplyid_credentials_set: bool,
    pub webhook_auth: &'static str,
    pub webhook_secret_set: bool,
    pub aml_configured: bool,
}

impl Diagnostics {
    fn from_config(config: &Config) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            fake_by_default: config.fake_by_default,
            signing_scheme: config.aplyid.scheme.as_str(),
            aplyid_base_url: config.aplyid.base_url.clone(),
            aplyid_credentials_set: config.aplyid.credential().is_ok(),
            webhook_auth: config.webhook.mode.as_str(),
            webhook_secret_set: config.webhook.secret.is_some(),
            aml_configured: config.aml.base_url.is_some() && config.aml.api_key.is_some(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub vendors: Vendors,
    pub forwarder: Arc<AmlForwarder>,
    pub events: SharedEvents,
    webhook_authorization: Option<Arc<str>>,
    diagnostics: Arc<Diagnostics>,
}

impl AppState {
    /// Builds the live and demo vendors, the AML forwarder and an empty
    /// event buffer from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let live = LiveVendor::new(config.aplyid.clone())?;
        let vendors = Vendors::new(Arc::new(live), Arc::new(DemoVendor), config.fake_by_default);
        let forwarder = AmlForwarder::new(
            config.aml.clone(),
            redirect::http_client(config.aplyid.timeout)?,
        );

        Ok(Self {
            vendors,
            forwarder: Arc::new(forwarder),
            events: EventBuffer::shared(DEFAULT_CAPACITY),
            webhook_authorization: signing::expected_webhook_authorization(&config.webhook)
                .map(Arc::from),
            diagnostics: Arc::new(Diagnostics::from_config(config)),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/start", post(handle_start))
        .route("/pep", post(handle_pep))
        .route("/aml", post(handle_aml))
        .route("/webhook", post(receive_webhook).get(list_webhooks))
        .route("/diag", get(diag))
        .route("/health_check", get(health_check))
        .with_state(state)
}

/// Starts the proxy HTTP server on `0.0.0.0:{config.port}`.
pub async fn serve(config: Config) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let state = AppState::from_config(&config)?;
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(
        addr = %addr,
        fake_by_default = config.fake_by_default,
        scheme = config.aplyid.scheme.as_str(),
        "VOI proxy listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct FakeQuery {
    fake: Option<String>,
}

impl FakeQuery {
    /// Unrecognised values leave the process default in place.
    fn fake_override(&self) -> Option<bool> {
        self.fake.as_deref().and_then(parse_flag)
    }
}

/// Empty body is treated as `{}`; anything else must be valid JSON.
fn json_or_default<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ProxyError::Validation(format!("invalid JSON body: {e}")))
}

fn pep_response(reply: VendorReply) -> Value {
    json!({
        "ok": true,
        "fake": reply.fake,
        "status": reply.status,
        "used": reply.url,
        "raw": reply.body,
    })
}

#[instrument(
    name = "voi.start",
    skip_all,
    fields(product = tracing::field::Empty, fake = tracing::field::Empty)
)]
async fn handle_start(
    State(state): State<AppState>,
    Query(query): Query<FakeQuery>,
    body: Bytes,
) -> Result<Json<Value>> {
    let request: StartRequest = json_or_default(&body)?;
    let product = request.mode.unwrap_or_default();
    let vendor = state.vendors.select(query.fake_override());

    let span = tracing::Span::current();
    span.record("product", product.as_str());

    if product == Product::AmlOnly {
        let check = PepCheck::from_request(PepRequest::from(request))?;
        let reply = vendor.pep_check(&check).await?;
        span.record("fake", reply.fake);
        info!(reference = %check.reference, "AML-only check completed");
        return Ok(Json(pep_response(reply)));
    }

    let verification = VerificationRequest::from_request(request)?;
    let reply = vendor.start_verification(&verification).await?;
    span.record("fake", reply.fake);

    let start_process_url = normalize::start_url(&reply.body);
    if start_process_url.is_none() {
        warn!(reference = %verification.reference, "Vendor response carried no start URL");
    } else {
        info!(reference = %verification.reference, "Verification started");
    }

    Ok(Json(json!({
        "ok": true,
        "fake": reply.fake,
        "status": reply.status,
        "url": reply.url,
        "start_process_url": start_process_url,
        "raw": reply.body,
    })))
}

#[instrument(name = "voi.pep", skip_all, fields(fake = tracing::field::Empty))]
async fn handle_pep(
    State(state): State<AppState>,
    Query(query): Query<FakeQuery>,
    body: Bytes,
) -> Result<Json<Value>> {
    let request: PepRequest = json_or_default(&body)?;
    let check = PepCheck::from_request(request)?;
    let reply = state
        .vendors
        .select(query.fake_override())
        .pep_check(&check)
        .await?;

    tracing::Span::current().record("fake", reply.fake);
    info!(reference = %check.reference, "PEP check completed");
    Ok(Json(pep_response(reply)))
}

#[instrument(name = "voi.aml", skip_all)]
async fn handle_aml(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<ForwardResult>)> {
    let request: ForwardRequest = serde_json::from_slice(&body)
        .map_err(|e| ProxyError::Validation(format!("invalid forward request: {e}")))?;
    let result = state.forwarder.forward(request).await?;
    let status = StatusCode::from_u16(result.status).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok((status, Json(result)))
}

fn authorize_webhook(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let Some(expected) = state.webhook_authorization.as_deref() else {
        return Ok(());
    };

    match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(actual) if signing::authorization_matches(expected, actual) => Ok(()),
        Some(_) => {
            warn!("Invalid webhook authorization");
            Err(ProxyError::Unauthorized)
        }
        None => {
            warn!("Missing Authorization header on webhook");
            Err(ProxyError::Unauthorized)
        }
    }
}

#[instrument(name = "voi.webhook", skip_all, fields(event_id = tracing::field::Empty))]
async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    authorize_webhook(&state, &headers)?;

    let payload: Value = serde_json::from_slice(&body).unwrap_or_else(|_| json!({}));
    let event = state.events.write().await.record(payload);

    tracing::Span::current().record("event_id", event.id.as_str());
    info!("Webhook received");

    Ok(Json(json!({ "received": true })))
}

async fn list_webhooks(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Value>> {
    authorize_webhook(&state, &headers)?;
    let items = state.events.read().await.items();
    Ok(Json(json!({ "items": items })))
}

async fn diag(State(state): State<AppState>) -> Json<Diagnostics> {
    Json(state.diagnostics.as_ref().clone())
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}
