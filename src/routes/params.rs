use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::entity::orders::OrderStatus;

pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

/// Raw paging query as it arrives on the wire.
#[derive(Debug, Default, Clone, Deserialize, ToSchema, IntoParams)]
pub struct Pagination {
    /// Page number, starting at 1.
    pub page: Option<u64>,
    /// Items per page, 1..=100.
    pub limit: Option<u64>,
}

/// Paging after defaults and bounds are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: u64,
    pub limit: u64,
}

impl Paging {
    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.limit
    }
}

impl Pagination {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    pub fn normalize(&self) -> Paging {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        Paging { page, limit }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortBy {
    CreatedAt,
    Price,
    Name,
    Rating,
}

#[derive(Debug, Default, Clone, Deserialize, ToSchema, IntoParams)]
pub struct ProductQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Matches name or description.
    pub q: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub min_price: Option<rust_decimal::Decimal>,
    pub max_price: Option<rust_decimal::Decimal>,
    pub sort_by: Option<ProductSortBy>,
    pub sort_order: Option<SortOrder>,
}

impl ProductQuery {
    pub fn paging(&self) -> Paging {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
        .normalize()
    }

    /// Stable cache key for the request shape.
    pub fn cache_key(&self) -> String {
        let p = self.paging();
        format!(
            "catalog:list:p={}:l={}:q={}:c={}:s={}:min={}:max={}:sort={:?}:{:?}",
            p.page,
            p.limit,
            self.q.as_deref().unwrap_or(""),
            self.category.as_deref().unwrap_or(""),
            self.sub_category.as_deref().unwrap_or(""),
            self.min_price.map(|d| d.to_string()).unwrap_or_default(),
            self.max_price.map(|d| d.to_string()).unwrap_or_default(),
            self.sort_by,
            self.sort_order,
        )
    }
}

#[derive(Debug, Default, Clone, Deserialize, ToSchema, IntoParams)]
pub struct OrderListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<OrderStatus>,
    pub sort_order: Option<SortOrder>,
}

impl OrderListQuery {
    pub fn paging(&self) -> Paging {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
        .normalize()
    }
}
