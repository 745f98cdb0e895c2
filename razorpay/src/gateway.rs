use crate::Result;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

/// remote order opened for a checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Created,
    Authorized,
    Captured,
    Refunded,
    Failed,
}

impl PaymentStatus {
    /// settled states, everything else is still in flight or dead
    pub fn is_complete(&self) -> bool {
        matches!(self, PaymentStatus::Authorized | PaymentStatus::Captured)
    }
}

/// authoritative payment record fetched server to server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
}

/// the payment gateway trait for multiple backends
#[async_trait::async_trait]
pub trait PaymentGateway {
    async fn create_order(
        &self,
        amount: i64,
        currency: String,
        receipt: String,
        notes: HashMap<String, String>,
    ) -> Result<Order>;

    async fn get_payment(&self, payment_id: &str) -> Result<Payment>;
}

/// checkout callback signature: hex HMAC-SHA256 over `order_id|payment_id`
pub fn signature(secret: &str, order_id: &str, payment_id: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// constant-time check of a client-supplied checkout signature
pub fn verify_signature(secret: &str, order_id: &str, payment_id: &str, supplied: &str) -> bool {
    let supplied = match hex::decode(supplied.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    mac.verify_slice(&supplied).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_roundtrip() {
        let sig = signature("secret", "order_1", "pay_1");
        assert_eq!(sig.len(), 64);
        assert!(verify_signature("secret", "order_1", "pay_1", &sig));
        // any mutation of the signed pair must fail
        assert!(!verify_signature("secret", "order_1", "pay_2", &sig));
        assert!(!verify_signature("secret", "order_2", "pay_1", &sig));
        assert!(!verify_signature("other", "order_1", "pay_1", &sig));
        assert!(!verify_signature("secret", "order_1", "pay_1", "not-hex"));
        assert!(!verify_signature("secret", "order_1", "pay_1", ""));
    }

    #[test]
    fn status_wire_names() {
        let status: PaymentStatus = serde_json::from_str("\"captured\"").unwrap();
        assert_eq!(status, PaymentStatus::Captured);
        assert!(status.is_complete());
        let status: PaymentStatus = serde_json::from_str("\"created\"").unwrap();
        assert!(!status.is_complete());
        let status: PaymentStatus = serde_json::from_str("\"authorized\"").unwrap();
        assert!(status.is_complete());
    }

    #[test]
    fn payment_deserialize() {
        let payment: Payment = serde_json::from_str(
            r#"{"id":"pay_1","order_id":"order_1","amount":49500,"currency":"INR","status":"captured","method":"upi"}"#,
        )
        .unwrap();
        assert_eq!(payment.amount, 49500);
        assert_eq!(payment.order_id, "order_1");
    }
}
