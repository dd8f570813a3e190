use chrono::Utc;
use sea_orm::{
    sea_query::LockType,
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit, cache,
    dto::reviews::{ReviewList, ReviewRequest, ReviewWithProduct},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems, Relation as OrderItemRel},
        orders::Column as OrderCol,
        products::Entity as Products,
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Product, Review},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::product_service,
    state::AppState,
};

/// Any order that contains the product counts, whatever its status.
pub async fn has_purchased<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
) -> AppResult<bool> {
    let count = OrderItems::find()
        .join(JoinType::InnerJoin, OrderItemRel::Orders.def())
        .filter(OrderItemCol::ProductId.eq(product_id))
        .filter(OrderCol::UserId.eq(user_id))
        .count(conn)
        .await?;
    Ok(count > 0)
}

/// Create the caller's review of a product, or overwrite it if one exists.
///
/// The product aggregate moves by `+1 / +rating` for a new review and by
/// `0 / new - old` for an edit, inside the same transaction as the review row.
/// The existing row is read `FOR UPDATE` so concurrent edits see each other's
/// rating before computing their delta.
pub async fn submit_review(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: ReviewRequest,
) -> AppResult<ApiResponse<ReviewWithProduct>> {
    payload.validate()?;
    let comment = payload.comment.trim().to_string();
    if comment.is_empty() {
        return Err(AppError::Validation("comment must be 1-1000 characters".into()));
    }

    if Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .is_none()
    {
        return Err(AppError::NotFoundMsg("Product not found".into()));
    }

    if !has_purchased(&state.orm, user.user_id, product_id).await? {
        return Err(AppError::ForbiddenMsg(
            "You can only review products you have purchased".into(),
        ));
    }

    let txn = state.orm.begin().await?;
    let now = Utc::now();

    let existing = Reviews::find()
        .filter(ReviewCol::UserId.eq(user.user_id))
        .filter(ReviewCol::ProductId.eq(product_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?;

    let (review, count_delta, sum_delta) = match existing {
        Some(existing) => {
            let sum_delta = i64::from(payload.rating - existing.rating);
            let mut active: ReviewActive = existing.into();
            active.rating = Set(payload.rating);
            active.comment = Set(comment);
            active.updated_at = Set(now.into());
            (active.update(&txn).await?, 0, sum_delta)
        }
        None => {
            let review = ReviewActive {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.user_id),
                product_id: Set(product_id),
                rating: Set(payload.rating),
                comment: Set(comment),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(&txn)
            .await?;
            (review, 1, i64::from(payload.rating))
        }
    };

    let product =
        product_service::apply_review_delta(&txn, product_id, count_delta, sum_delta).await?;
    txn.commit().await?;

    cache::invalidate_catalog(state.cache.as_ref()).await;
    tracing::info!(
        %product_id,
        rating = review.rating,
        num_of_reviews = product.num_of_reviews,
        average_rating = product.average_rating,
        "review aggregate updated"
    );
    audit::record(
        &state.orm,
        Some(user.user_id),
        if count_delta == 0 { "review_update" } else { "review_create" },
        "reviews",
        serde_json::json!({ "review_id": review.id, "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Review saved",
        ReviewWithProduct {
            review: Review::from(review),
            product: Product::from(product),
        },
        Some(Meta::empty()),
    ))
}

pub async fn delete_review(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    let txn = state.orm.begin().await?;

    let review = Reviews::find()
        .filter(ReviewCol::UserId.eq(user.user_id))
        .filter(ReviewCol::ProductId.eq(product_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFoundMsg("Review not found".into()))?;

    let rating = review.rating;
    Reviews::delete_by_id(review.id).exec(&txn).await?;
    let product =
        product_service::apply_review_delta(&txn, product_id, -1, -i64::from(rating)).await?;
    txn.commit().await?;

    cache::invalidate_catalog(state.cache.as_ref()).await;
    tracing::info!(
        %product_id,
        num_of_reviews = product.num_of_reviews,
        average_rating = product.average_rating,
        "review removed"
    );
    audit::record(
        &state.orm,
        Some(user.user_id),
        "review_delete",
        "reviews",
        serde_json::json!({ "review_id": review.id, "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Review deleted",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn list_reviews(
    state: &AppState,
    product_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReviewList>> {
    let paging = pagination.normalize();

    let finder = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product_id))
        .order_by_desc(ReviewCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await?;
    let items = finder
        .limit(paging.limit)
        .offset(paging.offset())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Review::from)
        .collect();

    Ok(ApiResponse::success(
        "Reviews",
        ReviewList { items },
        Some(Meta::paged(&paging, total)),
    ))
}
