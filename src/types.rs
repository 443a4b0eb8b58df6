use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the vendor hands the verification session to the subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    #[default]
    Link,
    Sms,
    Email,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Link => "link",
            DeliveryMethod::Sms => "sms",
            DeliveryMethod::Email => "email",
        }
    }
}

/// Which checks the subject is put through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Product {
    #[default]
    Biometric,
    BiometricAml,
    AmlOnly,
}

impl Product {
    pub fn as_str(&self) -> &'static str {
        match self {
            Product::Biometric => "biometric",
            Product::BiometricAml => "biometric_aml",
            Product::AmlOnly => "aml_only",
        }
    }

    pub fn includes_aml(&self) -> bool {
        matches!(self, Product::BiometricAml | Product::AmlOnly)
    }
}

/// Body of `POST /start`, as loosely typed as the portal sends it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "contact_phone")]
    pub phone: Option<String>,
    #[serde(default, alias = "date_of_birth")]
    pub dob: Option<String>,
    #[serde(default)]
    pub communication_method: Option<DeliveryMethod>,
    #[serde(default)]
    pub mode: Option<Product>,
    #[serde(default)]
    pub reference: Option<String>,
}

/// Body of `POST /pep`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PepRequest {
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default, alias = "date_of_birth")]
    pub dob: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

impl From<StartRequest> for PepRequest {
    fn from(req: StartRequest) -> Self {
        Self {
            firstname: req.firstname,
            lastname: req.lastname,
            dob: req.dob,
            reference: req.reference,
        }
    }
}

/// Body of `POST /aml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ForwardRequest {
    pub path: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub search: Option<serde_json::Map<String, Value>>,
}

/// A vendor callback held in the event buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub id: String,
    pub received_at: DateTime<Utc>,
    pub payload: Value,
}

/// What a vendor strategy hands back on success.
#[derive(Debug, Clone)]
pub struct VendorReply {
    pub url: String,
    pub status: u16,
    pub body: Value,
    pub fake: bool,
}
