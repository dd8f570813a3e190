//! Hosted payment gateway boundary.
//!
//! The workflow talks to the gateway through [`PaymentGateway`] so the
//! composition root decides which client is live. Signature checks are local
//! and live in [`signature`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::error::AppError;

pub mod razorpay;
pub mod signature;

pub use razorpay::RazorpayClient;

/// Gateway-side order awaiting payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GatewayIntent {
    pub id: String,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    pub status: String,
    /// Minor currency units.
    pub amount: i64,
    #[serde(default)]
    pub order_id: Option<String>,
}

impl GatewayPayment {
    pub fn is_captured(&self) -> bool {
        self.status == "captured"
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key handed to the checkout widget.
    fn key_id(&self) -> &str;

    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayIntent, GatewayError>;

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;
}

/// `amount × 100`, rounded half away from zero.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

pub fn from_minor_units(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn minor_units_round_trip_exact_amounts() {
        let amount = Decimal::from_str("249.99").unwrap();
        assert_eq!(to_minor_units(amount), Some(24999));
        assert_eq!(from_minor_units(24999), amount);
        assert_eq!(to_minor_units(Decimal::from(200)), Some(20000));
    }

    #[test]
    fn minor_units_round_sub_cent_values() {
        assert_eq!(to_minor_units(Decimal::from_str("10.005").unwrap()), Some(1001));
        assert_eq!(to_minor_units(Decimal::from_str("10.004").unwrap()), Some(1000));
    }

    #[test]
    fn only_captured_counts() {
        let mut payment = GatewayPayment {
            id: "pay_1".into(),
            status: "authorized".into(),
            amount: 100,
            order_id: None,
        };
        assert!(!payment.is_captured());
        payment.status = "captured".into();
        assert!(payment.is_captured());
    }
}
