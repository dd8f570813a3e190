use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::CartLine;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 1000, message = "quantity must be between 1 and 1000"))]
    pub quantity: i32,
}

/// Quantity 0 removes the line.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 0, max = 1000, message = "quantity must be between 0 and 1000"))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub total_items: i64,
    pub subtotal: Decimal,
}

impl CartView {
    pub fn from_lines(items: Vec<CartLine>) -> Self {
        let total_items = items.iter().map(|l| i64::from(l.quantity)).sum();
        let subtotal = items.iter().map(|l| l.subtotal).sum();
        Self {
            items,
            total_items,
            subtotal,
        }
    }
}
