//! # Payments
//!
//! Invoices go through CryptoCloud. Two plans:
//! - `pack`: a fixed number of paid credits that never expire
//! - `monthly`: premium for a number of days, stacking on top of any premium left
//!
//! ## Flow
//! 1. Client asks for an invoice, we store a pending [`PaymentRecord`] keyed by invoice id.
//! 2. Client opens the pay url, then polls the status endpoint.
//! 3. The first poll that sees `paid` (or `overpaid`) applies the grant and flags the record as
//!    applied, later polls only report the status.
//!
//! Without `CRYPTO_SHOP_ID`/`CRYPTO_API_KEY` every invoice is a demo invoice (`demo_<millis>_<n>`),
//! which reports `paid` on the first poll.
//!
//! Provider failures are returned to the caller as retryable errors, nothing here retries.
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration as StdDuration,
};

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, header::CONTENT_TYPE};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::Sha256;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    config::{Config, period},
    entitlement::{Entitlement, grant_paid_credits, grant_premium},
};

const BASE_URL: &str = "https://api.cryptocloud.plus";
const DEMO_URL: &str = "https://cryptocloud.plus/demo";
const DEMO_PREFIX: &str = "demo_";
pub const STATUS_PENDING: &str = "pending";
pub const STATUS_PAID: &str = "paid";

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider rejected request: {0}")]
    Rejected(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[serde(alias = "one-time")]
    Pack,
    Monthly,
}

/// Prices and grants of both plans.
#[derive(Clone, Debug)]
pub struct PlanTerms {
    pub pack_credits: u32,
    pub premium_days: i64,
    pub pack_price: u32,
    pub monthly_price: u32,
    pub currency: String,
}

impl PlanTerms {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pack_credits: config.pack_credits,
            premium_days: config.premium_days,
            pack_price: config.pack_price,
            monthly_price: config.monthly_price,
            currency: config.currency.clone(),
        }
    }

    pub fn price(&self, plan: Plan) -> u32 {
        match plan {
            Plan::Pack => self.pack_price,
            Plan::Monthly => self.monthly_price,
        }
    }

    pub fn description(&self, plan: Plan) -> String {
        match plan {
            Plan::Pack => format!("ChefZero Пакет {} рецептов", self.pack_credits),
            Plan::Monthly => "ChefZero Премиум месяц".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: String,
    pub user_id: String,
    pub plan: Plan,
    pub amount: u32,
    pub currency: String,
    pub status: String,
    pub applied: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub invoice_url: String,
    pub amount: u32,
    pub currency: String,
    pub status: String,
    pub demo: bool,
}

#[derive(Serialize)]
struct InvoiceRequest<'a> {
    shop_id: &'a str,
    amount: String,
    currency: &'a str,
    order_id: String,
    description: &'a str,
}

#[derive(Deserialize)]
struct ProviderResponse<T> {
    status: String,

    #[serde(default)]
    message: Option<String>,

    #[serde(alias = "result")]
    data: Option<T>,
}

#[derive(Deserialize)]
struct CreatedInvoice {
    #[serde(alias = "uuid")]
    invoice_id: String,
    #[serde(alias = "link")]
    pay_url: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct InvoiceInfo {
    status: String,
}

struct Credentials {
    shop_id: String,
    api_key: String,
}

pub struct PaymentService {
    client: Client,
    credentials: Option<Credentials>,
    sequence: AtomicU64,
}

impl PaymentService {
    pub fn new(config: &Config) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(config.crypto_timeout_secs))
            .build()?;

        let credentials = match (&config.crypto_shop_id, &config.crypto_key) {
            (Some(shop_id), Some(api_key)) => {
                info!("CryptoCloud API initialized");
                Some(Credentials {
                    shop_id: shop_id.clone(),
                    api_key: api_key.clone(),
                })
            }
            _ => {
                info!("CryptoCloud keys not found, payments run in demo mode");
                None
            }
        };

        Ok(Self {
            client,
            credentials,
            sequence: AtomicU64::new(0),
        })
    }

    /// `<millis>_<n>`, unique within this process even for calls in the same millisecond.
    fn next_order(&self, now: DateTime<Utc>) -> String {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);

        format!("{}_{n}", now.timestamp_millis())
    }

    pub fn is_demo(&self) -> bool {
        self.credentials.is_none()
    }

    pub async fn create_invoice(
        &self,
        amount: u32,
        currency: &str,
        description: &str,
    ) -> Result<Invoice, PaymentError> {
        let Some(credentials) = &self.credentials else {
            return Ok(demo_invoice(amount, currency, &self.next_order(Utc::now())));
        };

        let request = InvoiceRequest {
            shop_id: &credentials.shop_id,
            amount: amount.to_string(),
            currency,
            order_id: format!("chefzero-{}", self.next_order(Utc::now())),
            description,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| PaymentError::Rejected(format!("Unserializable invoice: {e}")))?;

        let response = self
            .client
            .post(format!("{BASE_URL}/v1/invoice/create"))
            .header(CONTENT_TYPE, "application/json")
            .header("Authorization", format!("Token {}", credentials.api_key))
            .header("Signature", sign(&credentials.api_key, &body))
            .body(body)
            .send()
            .await?;

        let created: CreatedInvoice = unwrap_response(response.json().await?)?;

        Ok(Invoice {
            id: created.invoice_id,
            invoice_url: created.pay_url,
            amount,
            currency: currency.to_string(),
            status: created.status.unwrap_or_else(|| STATUS_PENDING.to_string()),
            demo: false,
        })
    }

    pub async fn check_status(&self, invoice_id: &str) -> Result<String, PaymentError> {
        let Some(credentials) = &self.credentials else {
            return Ok(STATUS_PAID.to_string());
        };

        if invoice_id.starts_with(DEMO_PREFIX) {
            return Ok(STATUS_PAID.to_string());
        }

        let response = self
            .client
            .get(format!("{BASE_URL}/v1/invoice/info"))
            .query(&[("invoice_id", invoice_id)])
            .header("Authorization", format!("Token {}", credentials.api_key))
            .send()
            .await?;

        let info: InvoiceInfo = unwrap_response(response.json().await?)?;

        Ok(info.status)
    }
}

fn unwrap_response<T: DeserializeOwned>(response: ProviderResponse<T>) -> Result<T, PaymentError> {
    if response.status != "success" {
        let message = response
            .message
            .unwrap_or_else(|| format!("status {}", response.status));
        warn!("CryptoCloud rejected request: {message}");

        return Err(PaymentError::Rejected(message));
    }

    response
        .data
        .ok_or_else(|| PaymentError::Rejected("missing data".to_string()))
}

fn demo_invoice(amount: u32, currency: &str, order: &str) -> Invoice {
    Invoice {
        id: format!("{DEMO_PREFIX}{order}"),
        invoice_url: DEMO_URL.to_string(),
        amount,
        currency: currency.to_string(),
        status: STATUS_PENDING.to_string(),
        demo: true,
    }
}

/// Hex HMAC-SHA256 of the exact request body.
pub fn sign(api_key: &str, body: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(api_key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body.as_bytes());

    hex::encode(mac.finalize().into_bytes())
}

pub fn is_paid(status: &str) -> bool {
    matches!(status, "paid" | "overpaid")
}

/// Records the latest provider status and, the first time it reads as paid, applies the plan to
/// the entitlement. Returns the entitlement only when it changed.
pub fn settle(
    mut payment: PaymentRecord,
    status: String,
    entitlement: Entitlement,
    now: DateTime<Utc>,
    terms: &PlanTerms,
) -> (PaymentRecord, Option<Entitlement>) {
    payment.status = status;

    if payment.applied || !is_paid(&payment.status) {
        return (payment, None);
    }

    let updated = match payment.plan {
        Plan::Pack => grant_paid_credits(entitlement, terms.pack_credits),
        Plan::Monthly => grant_premium(entitlement, now, period(terms.premium_days)),
    };
    payment.applied = true;

    info!(
        "Applied {:?} plan from invoice {} to {}",
        payment.plan, payment.id, payment.user_id
    );

    (payment, Some(updated))
}
