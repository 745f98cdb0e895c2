use crate::{
    gateway::{Order, Payment, PaymentGateway},
    Error, Result,
};
use serde::Deserialize;
use serde_json::json;
use std::{collections::HashMap, time::Duration};

pub const DEFAULT_API_BASE: &str = "https://api.razorpay.com/v1";

/// Razorpay REST backend, basic auth with the key pair
pub struct Razorpay {
    http: reqwest::Client,
    key_id: String,
    key_secret: String,
    base: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetails {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorDetails,
}

impl Razorpay {
    pub fn new(
        key_id: String,
        key_secret: String,
        base: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout.unwrap_or(Duration::from_secs(20)))
            .build()?;
        Ok(Self {
            http,
            key_id,
            key_secret,
            base: base.unwrap_or_else(|| DEFAULT_API_BASE.to_owned()),
        })
    }

    async fn check(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .and_then(|e| e.error.description.or(e.error.reason))
            .unwrap_or_else(|| format!("{} failed with status {}", context, status));
        Err(Error::Api { status, message })
    }
}

#[async_trait::async_trait]
impl PaymentGateway for Razorpay {
    async fn create_order(
        &self,
        amount: i64,
        currency: String,
        receipt: String,
        notes: HashMap<String, String>,
    ) -> Result<Order> {
        let resp = self
            .http
            .post(format!("{}/orders", self.base))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&json!({
                "amount": amount,
                "currency": currency,
                "receipt": receipt,
                "notes": notes,
            }))
            .send()
            .await?;
        let resp = Self::check(resp, "create order").await?;
        Ok(resp.json().await?)
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Payment> {
        let resp = self
            .http
            .get(format!("{}/payments/{}", self.base, payment_id))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;
        let resp = Self::check(resp, "fetch payment").await?;
        Ok(resp.json().await?)
    }
}
