use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{Product, Review};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReviewRequest {
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(min = 1, max = 1000, message = "comment must be 1-1000 characters"))]
    pub comment: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewWithProduct {
    pub review: Review,
    pub product: Product,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewList {
    pub items: Vec<Review>,
}
