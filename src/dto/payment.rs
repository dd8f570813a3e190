use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Fields posted back by the checkout widget after the customer pays.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct VerifyPaymentRequest {
    pub order_id: Uuid,
    #[serde(alias = "razorpay_payment_id")]
    #[validate(length(min = 1, message = "gateway_payment_id is required"))]
    pub gateway_payment_id: String,
    #[serde(alias = "razorpay_order_id")]
    #[validate(length(min = 1, message = "gateway_order_id is required"))]
    pub gateway_order_id: String,
    #[serde(alias = "razorpay_signature")]
    #[validate(length(min = 1, message = "gateway_signature is required"))]
    pub gateway_signature: String,
}
