use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    entity::orders::{OrderStatus, PaymentMethod, ShippingAddress},
    models::{Order, OrderItem, ShippingMethod},
    payment::GatewayIntent,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    pub shipping_address: ShippingAddress,
    pub shipping_method: Option<ShippingMethod>,
    pub payment_method: PaymentMethod,
}

/// What the checkout widget needs to collect a gateway payment.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GatewayCheckout {
    pub key_id: String,
    pub intent: GatewayIntent,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlaceOrderResponse {
    #[serde(flatten)]
    pub order: OrderWithItems,
    /// Absent for cash on delivery.
    pub gateway: Option<GatewayCheckout>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
