use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, TransactionTrait};
use validator::Validate;

use crate::{
    audit, cache,
    dto::{orders::OrderWithItems, payment::VerifyPaymentRequest},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{Column as OrderCol, Entity as Orders, OrderStatus, PaymentStatus},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    payment::{from_minor_units, signature},
    response::{ApiResponse, Meta},
    services::{cart_service, order_service, product_service},
    state::AppState,
};

/// Confirm a gateway payment for an order the caller owns.
///
/// The signature is checked locally first, then the payment is looked up at
/// the gateway to make sure it was captured for the full order total. Only
/// then is the order marked paid, stock committed and the cart cleared, all in
/// one transaction. The paid flag is flipped conditionally so a replayed
/// verification cannot take stock twice.
pub async fn verify_payment(
    state: &AppState,
    user: &AuthUser,
    payload: VerifyPaymentRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    payload.validate()?;
    let VerifyPaymentRequest {
        order_id,
        gateway_payment_id,
        gateway_order_id,
        gateway_signature,
    } = payload;

    let order = Orders::find_by_id(order_id)
        .filter(OrderCol::GatewayOrderId.eq(gateway_order_id.as_str()))
        .one(&state.orm)
        .await?
        .filter(|o| o.user_id == user.user_id || user.is_admin())
        .ok_or_else(|| AppError::NotFoundMsg("Order not found".into()))?;

    if order.payment_status == PaymentStatus::Paid {
        return Err(AppError::BadRequest("Order already paid".into()));
    }
    if !order.status.is_open() {
        return Err(AppError::BadRequest(format!(
            "Order is {:?} and can no longer be paid",
            order.status
        )));
    }

    if !signature::verify(
        &state.config.payment.key_secret,
        &gateway_order_id,
        &gateway_payment_id,
        &gateway_signature,
    ) {
        mark_failed(state, order_id).await?;
        tracing::warn!(%order_id, "payment signature mismatch");
        return Err(AppError::PaymentVerification(
            "Invalid payment signature".into(),
        ));
    }

    let payment = state.gateway.fetch_payment(&gateway_payment_id).await?;
    if !payment.is_captured() {
        tracing::warn!(%order_id, status = %payment.status, "payment not captured");
        return Err(AppError::PaymentVerification(format!(
            "Payment is not captured (status: {})",
            payment.status
        )));
    }
    if payment
        .order_id
        .as_deref()
        .is_some_and(|id| id != gateway_order_id)
    {
        return Err(AppError::PaymentVerification(
            "Payment belongs to a different order".into(),
        ));
    }

    let paid = from_minor_units(payment.amount);
    if paid != order.total_amount {
        tracing::warn!(%order_id, %paid, expected = %order.total_amount, "payment amount mismatch");
        return Err(AppError::PaymentVerification(
            "Paid amount does not match order total".into(),
        ));
    }

    let txn = state.orm.begin().await?;
    let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();

    let result = Orders::update_many()
        .col_expr(OrderCol::PaymentStatus, Expr::value(PaymentStatus::Paid))
        .col_expr(OrderCol::IsPaid, Expr::value(true))
        .col_expr(OrderCol::PaidAt, Expr::value(now))
        .col_expr(OrderCol::GatewayPaymentId, Expr::value(gateway_payment_id.clone()))
        .col_expr(OrderCol::GatewaySignature, Expr::value(gateway_signature))
        .col_expr(OrderCol::UpdatedAt, Expr::value(now))
        .filter(OrderCol::Id.eq(order_id))
        .filter(OrderCol::PaymentStatus.ne(PaymentStatus::Paid))
        .filter(OrderCol::Status.is_in(OrderStatus::OPEN))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::Conflict(
            "Order was paid or closed while verifying".into(),
        ));
    }

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(&txn)
        .await?;
    for item in &items {
        product_service::decrement_stock(&txn, item.product_id, item.quantity).await?;
    }
    cart_service::clear_cart_for(&txn, order.user_id).await?;
    txn.commit().await?;

    cache::invalidate_catalog(state.cache.as_ref()).await;
    tracing::info!(%order_id, payment_id = %gateway_payment_id, "payment verified");
    audit::record(
        &state.orm,
        Some(user.user_id),
        "payment_verify",
        "orders",
        serde_json::json!({ "order_id": order_id, "payment_id": gateway_payment_id }),
    )
    .await;

    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let owner_id = order.user_id;
    let data = order_service::with_items(&state.orm, order).await?;
    order_service::send_confirmation(state, owner_id, &data).await;

    Ok(ApiResponse::success(
        "Payment verified",
        data,
        Some(Meta::empty()),
    ))
}

/// Record a rejected attempt. A paid order is never downgraded.
async fn mark_failed(state: &AppState, order_id: uuid::Uuid) -> AppResult<()> {
    let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
    Orders::update_many()
        .col_expr(OrderCol::PaymentStatus, Expr::value(PaymentStatus::Failed))
        .col_expr(OrderCol::UpdatedAt, Expr::value(now))
        .filter(OrderCol::Id.eq(order_id))
        .filter(OrderCol::PaymentStatus.ne(PaymentStatus::Paid))
        .exec(&state.orm)
        .await?;
    Ok(())
}
