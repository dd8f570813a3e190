use chrono::Utc;
use sea_orm::sea_query::{Alias, Expr, OnConflict};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, CartView, UpdateCartItemRequest},
    entity::{
        cart_items::{ActiveModel as CartActive, Column as CartCol, Entity as CartItems, Model as CartModel},
        products::{Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::CartLine,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Cart rows for a user joined with their current product, oldest first.
pub async fn cart_with_products<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<Vec<(CartModel, Option<ProductModel>)>> {
    Ok(CartItems::find()
        .filter(CartCol::UserId.eq(user_id))
        .order_by_asc(CartCol::CreatedAt)
        .find_also_related(Products)
        .all(conn)
        .await?)
}

pub async fn clear_cart_for<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<u64> {
    let result = CartItems::delete_many()
        .filter(CartCol::UserId.eq(user_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

async fn cart_view<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<CartView> {
    let lines = cart_with_products(conn, user_id)
        .await?
        .into_iter()
        // A line whose product was deleted has nothing left to show.
        .filter_map(|(line, product)| product.map(|p| to_cart_line(line, p)))
        .collect();
    Ok(CartView::from_lines(lines))
}

fn to_cart_line(line: CartModel, product: ProductModel) -> CartLine {
    let subtotal = product.price * rust_decimal::Decimal::from(line.quantity);
    CartLine {
        product_id: product.id,
        image: product.images.primary_url(),
        name: product.name,
        price: product.price,
        stock: product.stock,
        quantity: line.quantity,
        subtotal,
    }
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let view = cart_view(&state.orm, user.user_id).await?;
    Ok(ApiResponse::success("OK", view, Some(Meta::empty())))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    payload.validate()?;

    if Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?
        .is_none()
    {
        return Err(AppError::NotFoundMsg("Product not found".into()));
    }

    // Re-adding a product bumps the existing line instead of duplicating it.
    let on_conflict = OnConflict::columns([CartCol::UserId, CartCol::ProductId])
        .value(
            CartCol::Quantity,
            Expr::col((CartItems, CartCol::Quantity))
                .add(Expr::col((Alias::new("excluded"), CartCol::Quantity))),
        )
        .to_owned();

    CartItems::insert(CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        product_id: Set(payload.product_id),
        quantity: Set(payload.quantity),
        created_at: Set(Utc::now().into()),
    })
    .on_conflict(on_conflict)
    .exec_without_returning(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_add",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    let view = cart_view(&state.orm, user.user_id).await?;
    Ok(ApiResponse::success("Added to cart", view, Some(Meta::empty())))
}

pub async fn set_quantity(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartView>> {
    payload.validate()?;

    let affected = if payload.quantity == 0 {
        CartItems::delete_many()
            .filter(CartCol::UserId.eq(user.user_id))
            .filter(CartCol::ProductId.eq(product_id))
            .exec(&state.orm)
            .await?
            .rows_affected
    } else {
        CartItems::update_many()
            .col_expr(CartCol::Quantity, Expr::value(payload.quantity))
            .filter(CartCol::UserId.eq(user.user_id))
            .filter(CartCol::ProductId.eq(product_id))
            .exec(&state.orm)
            .await?
            .rows_affected
    };

    if affected == 0 {
        return Err(AppError::NotFoundMsg("Item not in cart".into()));
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_update",
        "cart_items",
        serde_json::json!({ "product_id": product_id, "quantity": payload.quantity }),
    )
    .await;

    let view = cart_view(&state.orm, user.user_id).await?;
    Ok(ApiResponse::success("Cart updated", view, Some(Meta::empty())))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<CartView>> {
    let result = CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .filter(CartCol::ProductId.eq(product_id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFoundMsg("Item not in cart".into()));
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_remove",
        "cart_items",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    let view = cart_view(&state.orm, user.user_id).await?;
    Ok(ApiResponse::success("Removed from cart", view, Some(Meta::empty())))
}

pub async fn clear_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    clear_cart_for(&state.orm, user.user_id).await?;
    Ok(ApiResponse::success(
        "Cart cleared",
        CartView::from_lines(Vec::new()),
        Some(Meta::empty()),
    ))
}
