//! Blog views, request bodies, and pagination.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Author fields embedded in a blog view (the populated `name`/`email`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Public representation of a blog with its author populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image: String,
    pub user: AuthorView,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBlogRequest {
    #[validate(length(min = 3, max = 200, message = "Title must be at least 3 characters long"))]
    pub title: String,
    #[validate(length(
        min = 10,
        max = 5000,
        message = "Description must be at least 10 characters long"
    ))]
    pub description: String,
    #[validate(url(message = "Please provide a valid image URL"))]
    pub image: String,
    /// Author id (the original's `user` body field).
    pub user: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBlogRequest {
    #[validate(length(min = 3, max = 200, message = "Title must be at least 3 characters long"))]
    pub title: String,
    #[validate(length(
        min = 10,
        max = 5000,
        message = "Description must be at least 10 characters long"
    ))]
    pub description: String,
    /// When absent, the stored image is kept.
    #[validate(url(message = "Please provide a valid image URL"))]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PageQuery {
    const MAX_LIMIT: u32 = 100;

    /// Clamped page number (1-based).
    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    /// Clamped page size.
    pub fn limit(&self) -> u32 {
        self.limit.clamp(1, Self::MAX_LIMIT)
    }

    /// `LIMIT`/`OFFSET` pair for the store.
    pub fn to_sql(&self) -> (i64, i64) {
        let limit = i64::from(self.limit());
        let offset = i64::from(self.page() - 1) * limit;
        (limit, offset)
    }
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl SearchQuery {
    /// The paging half of the query.
    pub fn paging(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }
}

/// Page metadata returned alongside every blog list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_blogs: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: &PageQuery, total: i64) -> Self {
        let current = page.page();
        let limit = i64::from(page.limit());
        let total_pages = ((total + limit - 1) / limit).max(0) as u32;
        Self {
            current_page: current,
            total_pages,
            total_blogs: total,
            has_next: current < total_pages,
            has_prev: current > 1 && total_pages > 0,
        }
    }
}
