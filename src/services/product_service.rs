use std::time::Duration;

use chrono::Utc;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    cache::{self, CATALOG_PREFIX},
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    entity::products::{
        ActiveModel, Column, Entity as Products, Model as ProductModel, ProductImages,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

#[derive(Serialize, Deserialize)]
struct CachedPage {
    items: Vec<Product>,
    total: u64,
}

fn cache_ttl(state: &AppState) -> Duration {
    Duration::from_secs(state.config.cache_ttl_secs)
}

fn product_cache_key(id: Uuid) -> String {
    format!("{CATALOG_PREFIX}product:{id}")
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let paging = query.paging();
    let key = query.cache_key();

    if let Some(page) = cache::get_json::<CachedPage>(state.cache.as_ref(), &key).await {
        let meta = Meta::paged(&paging, page.total);
        return Ok(ApiResponse::success(
            "Products",
            ProductList { items: page.items },
            Some(meta),
        ));
    }

    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        condition = condition.add(
            Condition::any()
                .add(Expr::expr(Func::lower(Expr::col(Column::Name))).like(pattern.clone()))
                .add(Expr::expr(Func::lower(Expr::col(Column::Description))).like(pattern)),
        );
    }

    if let Some(category) = query.category.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Column::Category.eq(category.clone()));
    }

    if let Some(sub_category) = query.sub_category.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Column::SubCategory.eq(sub_category.clone()));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
        ProductSortBy::Rating => Column::AverageRating,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await?;

    let items: Vec<Product> = finder
        .limit(paging.limit)
        .offset(paging.offset())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let cached = CachedPage { items, total };
    cache::put_json(state.cache.as_ref(), &key, &cached, cache_ttl(state)).await;

    let meta = Meta::paged(&paging, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList {
            items: cached.items,
        },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let key = product_cache_key(id);
    if let Some(product) = cache::get_json::<Product>(state.cache.as_ref(), &key).await {
        return Ok(ApiResponse::success("Product", product, None));
    }

    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(Product::from)
        .ok_or(AppError::NotFound)?;

    cache::put_json(state.cache.as_ref(), &key, &product, cache_ttl(state)).await;
    Ok(ApiResponse::success("Product", product, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    payload.validate()?;

    let name = payload.name.trim().to_string();
    if Products::find()
        .filter(Column::Name.eq(name.as_str()))
        .one(&state.orm)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Product name is already taken".into()));
    }

    let now = Utc::now();
    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(payload.description),
        price: Set(payload.price),
        category: Set(payload.category),
        sub_category: Set(payload.sub_category),
        stock: Set(payload.stock),
        images: Set(ProductImages(payload.images)),
        num_of_reviews: Set(0),
        rating_sum: Set(0),
        average_rating: Set(0.0),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    let product = active.insert(&state.orm).await?;

    cache::invalidate_catalog(state.cache.as_ref()).await;
    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    payload.validate()?;

    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    // Rating aggregate fields are owned by the review workflow and never patched here.
    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(category) = payload.category {
        active.category = Set(category);
    }
    if let Some(sub_category) = payload.sub_category {
        active.sub_category = Set(Some(sub_category));
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(images) = payload.images {
        active.images = Set(ProductImages(images));
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    cache::invalidate_catalog(state.cache.as_ref()).await;
    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    cache::invalidate_catalog(state.cache.as_ref()).await;
    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Take `quantity` units out of stock in one guarded statement.
pub async fn decrement_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
) -> AppResult<()> {
    let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
    let result = Products::update_many()
        .col_expr(Column::Stock, Expr::col(Column::Stock).sub(quantity))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::Id.eq(product_id))
        .filter(Column::Stock.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::Conflict(format!(
            "Insufficient stock for product {product_id}"
        )));
    }
    Ok(())
}

/// Shift the review count and rating sum in place, then rewrite the average
/// from the updated row. Callers run this inside their transaction so the row
/// stays locked between the increment and the recompute.
pub async fn apply_review_delta<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    count_delta: i32,
    sum_delta: i64,
) -> AppResult<ProductModel> {
    let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
    let result = Products::update_many()
        .col_expr(
            Column::NumOfReviews,
            Expr::col(Column::NumOfReviews).add(count_delta),
        )
        .col_expr(Column::RatingSum, Expr::col(Column::RatingSum).add(sum_delta))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::Id.eq(product_id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    let product = Products::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;

    let average = average_rating(product.rating_sum, product.num_of_reviews);
    let mut active: ActiveModel = product.into();
    active.average_rating = Set(average);
    Ok(active.update(conn).await?)
}

/// Mean rating rounded to one decimal place; 0 when there are no reviews.
pub fn average_rating(rating_sum: i64, num_of_reviews: i32) -> f64 {
    if num_of_reviews <= 0 {
        return 0.0;
    }
    let mean = rating_sum as f64 / f64::from(num_of_reviews);
    (mean * 10.0).round() / 10.0
}
