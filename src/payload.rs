//! Turns loosely typed portal input into vendor-shaped JSON.
//!
//! Everything here is pure: a request that is missing a field required by its
//! mode is rejected with [`ProxyError::Validation`] before any vendor call.

use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};

use crate::error::{ProxyError, Result};
use crate::types::{DeliveryMethod, PepRequest, Product, StartRequest};

const AU_COUNTRY_CODE: &str = "61";

/// A date of birth, held as a calendar date and rendered per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateOfBirth(NaiveDate);

impl DateOfBirth {
    /// Accepts `YYYY-MM-DD` or `DD/MM/YYYY`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
            .map(DateOfBirth)
            .map_err(|_| {
                ProxyError::Validation(format!(
                    "dob must be YYYY-MM-DD or DD/MM/YYYY, got {raw:?}"
                ))
            })
    }

    /// Wire format of the identity-verification start endpoint.
    pub fn to_iso(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }

    /// Wire format of the v4 PEP check endpoint.
    pub fn to_day_first(&self) -> String {
        self.0.format("%d/%m/%Y").to_string()
    }
}

/// Strips non-digits and swaps a leading national trunk `0` for `61`.
pub fn normalise_au_mobile(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.strip_prefix('0') {
        Some(rest) => format!("{AU_COUNTRY_CODE}{rest}"),
        None => digits,
    }
}

pub fn generate_reference(prefix: &str) -> String {
    format!("{prefix}-{}", Utc::now().timestamp_millis())
}

/// Where the hosted flow sends the subject when it finishes or is abandoned.
#[derive(Debug, Clone)]
pub struct RedirectUrls {
    pub success: String,
    pub cancel: String,
}

/// A validated identity-verification start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub delivery: DeliveryMethod,
    pub product: Product,
    pub date_of_birth: Option<DateOfBirth>,
    pub reference: String,
}

impl VerificationRequest {
    pub fn from_request(req: StartRequest) -> Result<Self> {
        let first_name = required(req.firstname, "firstname")?;
        let last_name = required(req.lastname, "lastname")?;
        let delivery = req.communication_method.unwrap_or_default();
        let product = req.mode.unwrap_or_default();
        let email = present(req.email);

        let phone = match delivery {
            DeliveryMethod::Sms => {
                let raw = required(req.phone, "phone")?;
                let phone = normalise_au_mobile(&raw);
                if phone.is_empty() {
                    return Err(ProxyError::Validation(
                        "phone must contain digits when communication_method is sms".to_string(),
                    ));
                }
                Some(phone)
            }
            _ => None,
        };

        if delivery == DeliveryMethod::Email && email.is_none() {
            return Err(ProxyError::Validation(
                "email is required when communication_method is email".to_string(),
            ));
        }

        let date_of_birth = if product.includes_aml() {
            let raw = required(req.dob, "dob")?;
            Some(DateOfBirth::parse(&raw)?)
        } else {
            None
        };

        Ok(Self {
            first_name,
            last_name,
            email,
            phone,
            delivery,
            product,
            date_of_birth,
            reference: present(req.reference).unwrap_or_else(|| generate_reference("VOI")),
        })
    }

    /// Body for the identity-verification start endpoint.
    pub fn to_vendor_payload(&self, redirects: &RedirectUrls) -> Value {
        let mut out = Map::new();
        out.insert("reference".into(), self.reference.clone().into());
        out.insert("firstname".into(), self.first_name.clone().into());
        out.insert("lastname".into(), self.last_name.clone().into());
        if let Some(email) = &self.email {
            out.insert("email".into(), email.clone().into());
        }
        if let Some(phone) = &self.phone {
            out.insert("phone".into(), phone.clone().into());
        }
        out.insert(
            "communication_method".into(),
            self.delivery.as_str().into(),
        );
        out.insert(
            "biometric_only".into(),
            Value::Bool(self.product == Product::Biometric),
        );
        if let Some(dob) = &self.date_of_birth {
            out.insert("date_of_birth".into(), dob.to_iso().into());
        }
        out.insert("redirect_success_url".into(), redirects.success.clone().into());
        out.insert("redirect_cancel_url".into(), redirects.cancel.clone().into());
        Value::Object(out)
    }
}

/// A validated AML/PEP-only screening request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PepCheck {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: DateOfBirth,
    pub reference: String,
}

impl PepCheck {
    pub fn from_request(req: PepRequest) -> Result<Self> {
        let first_name = required(req.firstname, "firstname")?;
        let last_name = required(req.lastname, "lastname")?;
        let dob = required(req.dob, "dob")?;
        Ok(Self {
            first_name,
            last_name,
            date_of_birth: DateOfBirth::parse(&dob)?,
            reference: present(req.reference).unwrap_or_else(|| generate_reference("PEP")),
        })
    }

    pub fn to_vendor_payload(&self) -> Value {
        serde_json::json!({
            "reference": self.reference,
            "firstname": self.first_name,
            "lastname": self.last_name,
            "date_of_birth": self.date_of_birth.to_day_first(),
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    present(value).ok_or_else(|| ProxyError::Validation(format!("{field} is required")))
}
