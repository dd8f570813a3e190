use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::reviews::{ReviewList, ReviewRequest, ReviewWithProduct},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Product,
    response::ApiResponse,
    routes::params::Pagination,
    services::review_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products/{product_id}/reviews", get(list_reviews))
        .route(
            "/products/{product_id}/review",
            post(submit_review).delete(delete_review),
        )
}

#[utoipa::path(
    get,
    path = "/api/review/products/{product_id}/reviews",
    params(
        ("product_id" = Uuid, Path, description = "Product ID"),
        Pagination
    ),
    responses(
        (status = 200, description = "Reviews, newest first", body = ApiResponse<ReviewList>)
    ),
    tag = "Reviews"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ReviewList>>> {
    let resp = review_service::list_reviews(&state, product_id, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/review/products/{product_id}/review",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Review created or updated", body = ApiResponse<ReviewWithProduct>),
        (status = 403, description = "Product not purchased"),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn submit_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> AppResult<Json<ApiResponse<ReviewWithProduct>>> {
    let resp = review_service::submit_review(&state, &user, product_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/review/products/{product_id}/review",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Review deleted, updated product returned", body = ApiResponse<Product>),
        (status = 404, description = "Review not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn delete_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = review_service::delete_review(&state, &user, product_id).await?;
    Ok(Json(resp))
}
