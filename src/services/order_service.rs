use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit, cache,
    dto::orders::{
        GatewayCheckout, OrderList, OrderWithItems, PlaceOrderRequest, PlaceOrderResponse,
        UpdateOrderStatusRequest,
    },
    entity::{
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
            OrderStatus, PaymentStatus,
        },
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderItem},
    payment::to_minor_units,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{cart_service, product_service},
    state::AppState,
};

/// Turn the caller's cart into an order.
///
/// Prices, names and images are read from the catalog now and frozen into the
/// order lines. Cash on delivery commits stock and clears the cart in the same
/// transaction that creates the order; gateway methods only create the order
/// and a gateway intent, leaving stock and cart for payment verification.
pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<PlaceOrderResponse>> {
    let shipping_address = payload.shipping_address.trimmed();
    shipping_address.validate()?;
    let shipping_method = payload.shipping_method.unwrap_or_default();
    if shipping_method.id.trim().is_empty() || shipping_method.label.trim().is_empty() {
        return Err(AppError::Validation("shipping_method id and label are required".into()));
    }
    if shipping_method.price.is_sign_negative() {
        return Err(AppError::Validation("shipping_method price must not be negative".into()));
    }

    let txn = state.orm.begin().await?;

    let rows = cart_service::cart_with_products(&txn, user.user_id).await?;
    if rows.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let order_id = Uuid::new_v4();
    let now = Utc::now();
    let mut total_amount = Decimal::ZERO;
    let mut lines: Vec<OrderItemActive> = Vec::with_capacity(rows.len());

    for (line, product) in rows {
        let product = product.ok_or_else(|| {
            AppError::NotFoundMsg(format!("Product {} no longer exists", line.product_id))
        })?;
        if product.stock < line.quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}",
                product.name
            )));
        }
        let line_total = product.price * Decimal::from(line.quantity);
        total_amount += line_total;
        lines.push(OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            product_id: Set(product.id),
            image: Set(product.images.primary_url()),
            name: Set(product.name),
            price: Set(product.price),
            quantity: Set(line.quantity),
            line_total: Set(line_total),
            created_at: Set(now.into()),
        });
    }

    let payment_method = payload.payment_method;
    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        shipping_address: Set(shipping_address),
        shipping_method_id: Set(shipping_method.id),
        shipping_method_label: Set(shipping_method.label),
        shipping_price: Set(shipping_method.price),
        payment_method: Set(payment_method),
        payment_status: Set(PaymentStatus::Pending),
        gateway_order_id: Set(None),
        gateway_payment_id: Set(None),
        gateway_signature: Set(None),
        total_amount: Set(total_amount),
        tax_amount: Set(Decimal::ZERO),
        status: Set(OrderStatus::Pending),
        is_paid: Set(false),
        paid_at: Set(None),
        is_delivered: Set(false),
        delivered_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for line in lines {
        items.push(OrderItem::from(line.insert(&txn).await?));
    }

    if !payment_method.uses_gateway() {
        for item in &items {
            product_service::decrement_stock(&txn, item.product_id, item.quantity).await?;
        }
        cart_service::clear_cart_for(&txn, user.user_id).await?;
        txn.commit().await?;

        cache::invalidate_catalog(state.cache.as_ref()).await;
        tracing::info!(order_id = %order.id, total = %order.total_amount, "cash on delivery order placed");

        let placed = OrderWithItems {
            order: Order::from(order),
            items,
        };
        audit::record(
            &state.orm,
            Some(user.user_id),
            "order_place",
            "orders",
            serde_json::json!({ "order_id": placed.order.id, "payment_method": "COD" }),
        )
        .await;
        send_confirmation(state, user.user_id, &placed).await;

        return Ok(ApiResponse::success(
            "Order placed",
            PlaceOrderResponse {
                order: placed,
                gateway: None,
            },
            Some(Meta::empty()),
        ));
    }

    txn.commit().await?;

    let amount_minor = to_minor_units(order.total_amount)
        .ok_or_else(|| AppError::BadRequest("Order total is out of range".into()))?;
    let intent = state
        .gateway
        .create_intent(amount_minor, &state.config.payment.currency, &order.id.to_string())
        .await
        .inspect_err(|err| {
            tracing::warn!(order_id = %order.id, error = %err, "gateway intent creation failed");
        })?;

    let mut active: OrderActive = order.into();
    active.gateway_order_id = Set(Some(intent.id.clone()));
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    tracing::info!(
        order_id = %order.id,
        intent_id = %intent.id,
        amount_minor,
        "gateway order placed, awaiting payment"
    );
    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_place",
        "orders",
        serde_json::json!({ "order_id": order.id, "gateway_order_id": intent.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created, awaiting payment",
        PlaceOrderResponse {
            order: OrderWithItems {
                order: Order::from(order),
                items,
            },
            gateway: Some(GatewayCheckout {
                key_id: state.gateway.key_id().to_string(),
                intent,
            }),
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .filter(|o| o.user_id == user.user_id || user.is_admin())
        .ok_or(AppError::NotFound)?;

    let data = with_items(&state.orm, order).await?;
    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

pub async fn list_my_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    list_orders(state, condition, query).await
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    list_orders(state, Condition::all(), query).await
}

async fn list_orders(
    state: &AppState,
    mut condition: Condition,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let paging = query.paging();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await?;

    let orders = finder
        .limit(paging.limit)
        .offset(paging.offset())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(Meta::paged(&paging, total)),
    ))
}

/// Admin-driven fulfilment step. Only forward moves are accepted.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let next = payload.status;

    let existing = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let previous = existing.status;

    if !previous.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot move order from {previous:?} to {next:?}"
        )));
    }

    let now = Utc::now();
    let already_paid = existing.is_paid;
    let mut active: OrderActive = existing.into();
    active.status = Set(next);
    active.updated_at = Set(now.into());
    if next == OrderStatus::Delivered {
        active.is_delivered = Set(true);
        active.delivered_at = Set(Some(now.into()));
        collect_payment_on_delivery(&mut active, already_paid, now);
    }

    // Guard against a concurrent status change between the read and the write.
    let result = Orders::update_many()
        .set(active)
        .filter(OrderCol::Id.eq(id))
        .filter(OrderCol::Status.eq(previous))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::Conflict("Order status changed concurrently".into()));
    }

    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!(order_id = %order.id, from = ?previous, to = ?next, "order status updated");
    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "from": previous, "to": next }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order updated",
        Order::from(order),
        Some(Meta::empty()),
    ))
}

/// Delivery settles the payment: cash is collected at the door, and a gateway
/// order that reached the customer is treated as paid. Existing paid_at is kept.
pub fn collect_payment_on_delivery(
    active: &mut OrderActive,
    already_paid: bool,
    now: chrono::DateTime<Utc>,
) {
    active.is_paid = Set(true);
    active.payment_status = Set(PaymentStatus::Paid);
    if !already_paid {
        active.paid_at = Set(Some(now.into()));
    }
}

/// Owner cancellation. Stock is not restored and no refund is started.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
    let result = Orders::update_many()
        .col_expr(OrderCol::Status, Expr::value(OrderStatus::Cancelled))
        .col_expr(OrderCol::UpdatedAt, Expr::value(now))
        .filter(OrderCol::Id.eq(id))
        .filter(OrderCol::UserId.eq(user.user_id))
        .filter(OrderCol::Status.is_in(OrderStatus::OPEN))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFoundMsg(
            "Order not found or cannot be cancelled".into(),
        ));
    }

    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!(order_id = %order.id, "order cancelled by owner");
    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_cancel",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order cancelled",
        Order::from(order),
        Some(Meta::empty()),
    ))
}

pub(crate) async fn with_items<C: ConnectionTrait>(
    conn: &C,
    order: OrderModel,
) -> AppResult<OrderWithItems> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();
    Ok(OrderWithItems {
        order: Order::from(order),
        items,
    })
}

/// Email the owner; delivery problems are logged and never fail the order.
pub(crate) async fn send_confirmation(state: &AppState, user_id: Uuid, order: &OrderWithItems) {
    let owner = match Users::find_by_id(user_id).one(&state.orm).await {
        Ok(Some(owner)) => owner,
        Ok(None) => {
            tracing::warn!(%user_id, "order owner missing, confirmation not sent");
            return;
        }
        Err(err) => {
            tracing::warn!(error = %err, "could not load order owner for confirmation");
            return;
        }
    };

    if let Err(err) = state
        .notifier
        .send_order_confirmation(&owner.email, order)
        .await
    {
        tracing::warn!(order_id = %order.order.id, error = %err, "order confirmation email failed");
    }
}
