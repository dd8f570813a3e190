mod common;

use axum_storefront_api::{
    dto::{
        cart::AddToCartRequest,
        orders::{PlaceOrderRequest, UpdateOrderStatusRequest},
        payment::VerifyPaymentRequest,
    },
    entity::{
        Orders, Products,
        orders::{OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress},
        users::UserRole,
    },
    error::AppError,
    middleware::auth::AuthUser,
    payment::signature,
    routes::params::OrderListQuery,
    services::{cart_service, order_service, payment_service},
    state::AppState,
};
use common::{KEY_ID, KEY_SECRET, create_product, create_user, setup};
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};
use uuid::Uuid;

fn address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Asha Rao".into(),
        street: "12 MG Road".into(),
        city: "Bengaluru".into(),
        state: "KA".into(),
        postal_code: "560001".into(),
        country: "India".into(),
        phone: "9999999999".into(),
    }
}

fn order_request(payment_method: PaymentMethod) -> PlaceOrderRequest {
    PlaceOrderRequest {
        shipping_address: address(),
        shipping_method: None,
        payment_method,
    }
}

async fn add(state: &AppState, user: &AuthUser, product_id: Uuid, quantity: i32) {
    cart_service::add_to_cart(
        state,
        user,
        AddToCartRequest {
            product_id,
            quantity,
        },
    )
    .await
    .unwrap();
}

async fn stock_of(state: &AppState, product_id: Uuid) -> i32 {
    Products::find_by_id(product_id)
        .one(&state.orm)
        .await
        .unwrap()
        .unwrap()
        .stock
}

async fn cart_size(state: &AppState, user: &AuthUser) -> usize {
    cart_service::get_cart(state, user)
        .await
        .unwrap()
        .data
        .unwrap()
        .items
        .len()
}

#[tokio::test]
async fn cod_order_commits_stock_and_clears_cart() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let user = create_user(state, "buyer", UserRole::Customer).await?;
    let product = create_product(state, "widget", dec!(100), 10).await?;
    add(state, &user, product, 2).await;

    let placed = order_service::place_order(state, &user, order_request(PaymentMethod::Cod))
        .await?
        .data
        .unwrap();

    assert!(placed.gateway.is_none());
    let order = &placed.order.order;
    assert_eq!(order.total_amount, dec!(200));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_method, PaymentMethod::Cod);
    assert_eq!(order.payment.payment_status, PaymentStatus::Pending);
    assert!(!order.is_paid);
    assert_eq!(placed.order.items.len(), 1);
    assert_eq!(placed.order.items[0].quantity, 2);
    assert_eq!(placed.order.items[0].name, "widget");

    assert_eq!(stock_of(state, product).await, 8);
    assert_eq!(cart_size(state, &user).await, 0);

    let sent = app.notifier.confirmations.lock().unwrap().clone();
    assert_eq!(sent, vec![("buyer@example.com".to_string(), order.id)]);
    Ok(())
}

#[tokio::test]
async fn empty_cart_is_rejected() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = create_user(&app.state, "buyer", UserRole::Customer).await?;

    let err = order_service::place_order(&app.state, &user, order_request(PaymentMethod::Cod))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref m) if m == "Cart is empty"));
    Ok(())
}

#[tokio::test]
async fn blank_address_field_is_rejected_before_persisting() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let user = create_user(state, "buyer", UserRole::Customer).await?;
    let product = create_product(state, "widget", dec!(100), 10).await?;
    add(state, &user, product, 1).await;

    let mut request = order_request(PaymentMethod::Cod);
    request.shipping_address.city = "   ".into();
    let err = order_service::place_order(state, &user, request)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(Orders::find().count(&state.orm).await?, 0);
    assert_eq!(stock_of(state, product).await, 10);
    assert_eq!(cart_size(state, &user).await, 1);
    Ok(())
}

#[tokio::test]
async fn insufficient_stock_creates_nothing() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let user = create_user(state, "buyer", UserRole::Customer).await?;
    let product = create_product(state, "widget", dec!(100), 1).await?;
    add(state, &user, product, 2).await;

    let err = order_service::place_order(state, &user, order_request(PaymentMethod::Cod))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(Orders::find().count(&state.orm).await?, 0);
    assert_eq!(stock_of(state, product).await, 1);
    Ok(())
}

#[tokio::test]
async fn gateway_order_waits_for_verified_payment() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let user = create_user(state, "buyer", UserRole::Customer).await?;
    let product = create_product(state, "widget", dec!(100), 10).await?;
    add(state, &user, product, 2).await;

    let placed = order_service::place_order(state, &user, order_request(PaymentMethod::Upi))
        .await?
        .data
        .unwrap();

    let checkout = placed.gateway.expect("gateway checkout");
    assert_eq!(checkout.key_id, KEY_ID);
    assert_eq!(checkout.intent.amount, 20000);
    assert_eq!(checkout.intent.currency, "INR");
    let order_id = placed.order.order.id;
    assert_eq!(
        checkout.intent.receipt.as_deref(),
        Some(order_id.to_string().as_str())
    );
    assert_eq!(
        placed.order.order.payment.gateway_order_id.as_deref(),
        Some(checkout.intent.id.as_str())
    );

    // Nothing is committed until the payment is verified.
    assert_eq!(stock_of(state, product).await, 10);
    assert_eq!(cart_size(state, &user).await, 1);
    assert!(app.notifier.confirmations.lock().unwrap().is_empty());

    app.gateway
        .script_payment("pay_1", &checkout.intent.id, "captured", 20000);
    let request = VerifyPaymentRequest {
        order_id,
        gateway_payment_id: "pay_1".into(),
        gateway_order_id: checkout.intent.id.clone(),
        gateway_signature: signature::sign(KEY_SECRET, &checkout.intent.id, "pay_1"),
    };

    let verified = payment_service::verify_payment(state, &user, request.clone())
        .await?
        .data
        .unwrap();
    assert!(verified.order.is_paid);
    assert!(verified.order.paid_at.is_some());
    assert_eq!(verified.order.payment.payment_status, PaymentStatus::Paid);
    assert_eq!(verified.order.payment.gateway_payment_id.as_deref(), Some("pay_1"));
    assert_eq!(stock_of(state, product).await, 8);
    assert_eq!(cart_size(state, &user).await, 0);
    assert_eq!(app.notifier.confirmations.lock().unwrap().len(), 1);

    // Replaying the same verification must not take stock again.
    let err = payment_service::verify_payment(state, &user, request)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref m) if m == "Order already paid"));
    assert_eq!(stock_of(state, product).await, 8);
    Ok(())
}

#[tokio::test]
async fn tampered_signature_marks_payment_failed() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let user = create_user(state, "buyer", UserRole::Customer).await?;
    let product = create_product(state, "widget", dec!(100), 10).await?;
    add(state, &user, product, 2).await;

    let placed = order_service::place_order(state, &user, order_request(PaymentMethod::Card))
        .await?
        .data
        .unwrap();
    let intent_id = placed.gateway.unwrap().intent.id;
    let order_id = placed.order.order.id;
    app.gateway.script_payment("pay_1", &intent_id, "captured", 20000);

    let err = payment_service::verify_payment(
        state,
        &user,
        VerifyPaymentRequest {
            order_id,
            gateway_payment_id: "pay_1".into(),
            gateway_order_id: intent_id.clone(),
            gateway_signature: signature::sign("wrong_secret", &intent_id, "pay_1"),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::PaymentVerification(_)));

    let order = Orders::find_by_id(order_id).one(&state.orm).await?.unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Failed);
    assert!(!order.is_paid);
    assert_eq!(stock_of(state, product).await, 10);
    assert_eq!(cart_size(state, &user).await, 1);
    Ok(())
}

#[tokio::test]
async fn uncaptured_or_short_payment_changes_nothing() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let user = create_user(state, "buyer", UserRole::Customer).await?;
    let product = create_product(state, "widget", dec!(100), 10).await?;
    add(state, &user, product, 2).await;

    let placed = order_service::place_order(state, &user, order_request(PaymentMethod::NetBanking))
        .await?
        .data
        .unwrap();
    let intent_id = placed.gateway.unwrap().intent.id;
    let order_id = placed.order.order.id;

    app.gateway.script_payment("pay_auth", &intent_id, "authorized", 20000);
    app.gateway.script_payment("pay_short", &intent_id, "captured", 19900);

    for payment_id in ["pay_auth", "pay_short"] {
        let err = payment_service::verify_payment(
            state,
            &user,
            VerifyPaymentRequest {
                order_id,
                gateway_payment_id: payment_id.into(),
                gateway_order_id: intent_id.clone(),
                gateway_signature: signature::sign(KEY_SECRET, &intent_id, payment_id),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::PaymentVerification(_)), "{payment_id}");
    }

    let order = Orders::find_by_id(order_id).one(&state.orm).await?.unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert!(!order.is_paid);
    assert_eq!(stock_of(state, product).await, 10);
    Ok(())
}

#[tokio::test]
async fn verification_is_scoped_to_the_gateway_order_and_owner() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let user = create_user(state, "buyer", UserRole::Customer).await?;
    let stranger = create_user(state, "stranger", UserRole::Customer).await?;
    let product = create_product(state, "widget", dec!(100), 10).await?;
    add(state, &user, product, 1).await;

    let placed = order_service::place_order(state, &user, order_request(PaymentMethod::Upi))
        .await?
        .data
        .unwrap();
    let intent_id = placed.gateway.unwrap().intent.id;
    let order_id = placed.order.order.id;

    let wrong_gateway_order = VerifyPaymentRequest {
        order_id,
        gateway_payment_id: "pay_1".into(),
        gateway_order_id: "order_other".into(),
        gateway_signature: signature::sign(KEY_SECRET, "order_other", "pay_1"),
    };
    let err = payment_service::verify_payment(state, &user, wrong_gateway_order)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFoundMsg(_)));

    let foreign = VerifyPaymentRequest {
        order_id,
        gateway_payment_id: "pay_1".into(),
        gateway_order_id: intent_id.clone(),
        gateway_signature: signature::sign(KEY_SECRET, &intent_id, "pay_1"),
    };
    let err = payment_service::verify_payment(state, &stranger, foreign)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFoundMsg(_)));
    Ok(())
}

#[tokio::test]
async fn cancelled_order_cannot_be_paid() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let user = create_user(state, "buyer", UserRole::Customer).await?;
    let product = create_product(state, "widget", dec!(100), 10).await?;
    add(state, &user, product, 2).await;

    let placed = order_service::place_order(state, &user, order_request(PaymentMethod::Upi))
        .await?
        .data
        .unwrap();
    let intent_id = placed.gateway.unwrap().intent.id;
    let order_id = placed.order.order.id;
    order_service::cancel_order(state, &user, order_id).await?;

    app.gateway.script_payment("pay_1", &intent_id, "captured", 20000);
    let err = payment_service::verify_payment(
        state,
        &user,
        VerifyPaymentRequest {
            order_id,
            gateway_payment_id: "pay_1".into(),
            gateway_order_id: intent_id.clone(),
            gateway_signature: signature::sign(KEY_SECRET, &intent_id, "pay_1"),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let order = Orders::find_by_id(order_id).one(&state.orm).await?.unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert!(!order.is_paid);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(stock_of(state, product).await, 10);
    assert_eq!(cart_size(state, &user).await, 1);
    assert!(app.notifier.confirmations.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn gateway_outage_surfaces_as_upstream_error() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let user = create_user(state, "buyer", UserRole::Customer).await?;
    let product = create_product(state, "widget", dec!(100), 10).await?;
    add(state, &user, product, 1).await;
    *app.gateway.fail_intents.lock().unwrap() = true;

    let err = order_service::place_order(state, &user, order_request(PaymentMethod::Card))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Upstream(_)));

    let orders = Orders::find().all(&state.orm).await?;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Pending);
    assert!(orders[0].gateway_order_id.is_none());
    assert_eq!(stock_of(state, product).await, 10);
    assert_eq!(cart_size(state, &user).await, 1);
    Ok(())
}

#[tokio::test]
async fn cancel_is_owner_only_and_before_shipping() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let user = create_user(state, "buyer", UserRole::Customer).await?;
    let stranger = create_user(state, "stranger", UserRole::Customer).await?;
    let admin = create_user(state, "admin", UserRole::Admin).await?;
    let product = create_product(state, "widget", dec!(100), 10).await?;

    add(state, &user, product, 1).await;
    let first = order_service::place_order(state, &user, order_request(PaymentMethod::Cod))
        .await?
        .data
        .unwrap()
        .order
        .order
        .id;

    let err = order_service::cancel_order(state, &stranger, first)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFoundMsg(_)));

    let cancelled = order_service::cancel_order(state, &user, first)
        .await?
        .data
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    // Cancelling does not restock.
    assert_eq!(stock_of(state, product).await, 9);

    add(state, &user, product, 1).await;
    let second = order_service::place_order(state, &user, order_request(PaymentMethod::Cod))
        .await?
        .data
        .unwrap()
        .order
        .order
        .id;
    order_service::update_order_status(
        state,
        &admin,
        second,
        UpdateOrderStatusRequest {
            status: OrderStatus::Shipped,
        },
    )
    .await?;

    let err = order_service::cancel_order(state, &user, second)
        .await
        .unwrap_err();
    assert!(
        matches!(err, AppError::NotFoundMsg(ref m) if m == "Order not found or cannot be cancelled")
    );
    let order = Orders::find_by_id(second).one(&state.orm).await?.unwrap();
    assert_eq!(order.status, OrderStatus::Shipped);
    Ok(())
}

#[tokio::test]
async fn delivery_collects_payment_and_status_only_moves_forward() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let user = create_user(state, "buyer", UserRole::Customer).await?;
    let admin = create_user(state, "admin", UserRole::Admin).await?;
    let product = create_product(state, "widget", dec!(100), 10).await?;
    add(state, &user, product, 1).await;

    let order_id = order_service::place_order(state, &user, order_request(PaymentMethod::Cod))
        .await?
        .data
        .unwrap()
        .order
        .order
        .id;

    let err = order_service::update_order_status(
        state,
        &user,
        order_id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Confirmed,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let confirmed = order_service::update_order_status(
        state,
        &admin,
        order_id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Confirmed,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    assert!(!confirmed.is_paid);

    let err = order_service::update_order_status(
        state,
        &admin,
        order_id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Pending,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let delivered = order_service::update_order_status(
        state,
        &admin,
        order_id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Delivered,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert!(delivered.is_delivered);
    assert!(delivered.delivered_at.is_some());
    assert!(delivered.is_paid);
    assert!(delivered.paid_at.is_some());
    assert_eq!(delivered.payment.payment_status, PaymentStatus::Paid);

    let err = order_service::update_order_status(
        state,
        &admin,
        order_id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Cancelled,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    Ok(())
}

#[tokio::test]
async fn order_reads_respect_ownership_and_role() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let user = create_user(state, "buyer", UserRole::Customer).await?;
    let other = create_user(state, "other", UserRole::Customer).await?;
    let admin = create_user(state, "admin", UserRole::Admin).await?;
    let product = create_product(state, "widget", dec!(100), 10).await?;

    add(state, &user, product, 1).await;
    let mine = order_service::place_order(state, &user, order_request(PaymentMethod::Cod))
        .await?
        .data
        .unwrap()
        .order
        .order
        .id;
    add(state, &other, product, 1).await;
    let theirs = order_service::place_order(state, &other, order_request(PaymentMethod::Cod))
        .await?
        .data
        .unwrap()
        .order
        .order
        .id;
    order_service::cancel_order(state, &other, theirs).await?;

    let err = order_service::get_order(state, &user, theirs).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    let seen = order_service::get_order(state, &admin, theirs).await?.data.unwrap();
    assert_eq!(seen.items.len(), 1);

    let own = order_service::list_my_orders(state, &user, OrderListQuery::default()).await?;
    let own_ids: Vec<Uuid> = own.data.unwrap().items.iter().map(|o| o.id).collect();
    assert_eq!(own_ids, vec![mine]);
    assert_eq!(own.meta.unwrap().total, Some(1));

    let err = order_service::list_all_orders(state, &user, OrderListQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let cancelled = order_service::list_all_orders(
        state,
        &admin,
        OrderListQuery {
            status: Some(OrderStatus::Cancelled),
            ..Default::default()
        },
    )
    .await?;
    let ids: Vec<Uuid> = cancelled.data.unwrap().items.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![theirs]);
    Ok(())
}
