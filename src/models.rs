use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    order_items::Model as OrderItemModel,
    orders::{Model as OrderModel, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress},
    products::{Model as ProductModel, ProductImage},
    reviews::Model as ReviewModel,
    users::{Model as UserModel, UserAddress, UserRole},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub address: Option<UserAddress>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category: String,
    pub sub_category: Option<String>,
    pub stock: i32,
    pub images: Vec<ProductImage>,
    pub num_of_reviews: i32,
    pub rating_sum: i64,
    pub average_rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cart line with product fields resolved at read time, for display only.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub quantity: i32,
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ShippingMethod {
    pub id: String,
    pub label: String,
    pub price: Decimal,
}

impl Default for ShippingMethod {
    fn default() -> Self {
        Self {
            id: "standard".to_string(),
            label: "Standard".to_string(),
            price: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentInfo {
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub shipping_address: ShippingAddress,
    pub shipping_method: ShippingMethod,
    pub payment_method: PaymentMethod,
    pub payment: PaymentInfo,
    pub total_amount: Decimal,
    pub tax_amount: Decimal,
    pub status: OrderStatus,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserModel> for User {
    fn from(model: UserModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            role: model.role,
            address: model.address,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<ProductModel> for Product {
    fn from(model: ProductModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            category: model.category,
            sub_category: model.sub_category,
            stock: model.stock,
            images: model.images.0,
            num_of_reviews: model.num_of_reviews,
            rating_sum: model.rating_sum,
            average_rating: model.average_rating,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<OrderModel> for Order {
    fn from(model: OrderModel) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            shipping_address: model.shipping_address,
            shipping_method: ShippingMethod {
                id: model.shipping_method_id,
                label: model.shipping_method_label,
                price: model.shipping_price,
            },
            payment_method: model.payment_method,
            payment: PaymentInfo {
                gateway_order_id: model.gateway_order_id,
                gateway_payment_id: model.gateway_payment_id,
                payment_status: model.payment_status,
            },
            total_amount: model.total_amount,
            tax_amount: model.tax_amount,
            status: model.status,
            is_paid: model.is_paid,
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
            is_delivered: model.is_delivered,
            delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<OrderItemModel> for OrderItem {
    fn from(model: OrderItemModel) -> Self {
        Self {
            product_id: model.product_id,
            name: model.name,
            image: model.image,
            price: model.price,
            quantity: model.quantity,
            line_total: model.line_total,
        }
    }
}

impl From<ReviewModel> for Review {
    fn from(model: ReviewModel) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            product_id: model.product_id,
            rating: model.rating,
            comment: model.comment,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}
