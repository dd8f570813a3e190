use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::{orders::OrderWithItems, payment::VerifyPaymentRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/verify-payment", post(verify_payment))
}

#[utoipa::path(
    post,
    path = "/api/payment/verify-payment",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment verified, order paid", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Signature, capture or amount check failed, or order already paid"),
        (status = 404, description = "Order not found"),
        (status = 502, description = "Payment gateway unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "Payment"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<VerifyPaymentRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = payment_service::verify_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}
