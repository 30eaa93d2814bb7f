//! Blog handlers: CRUD, pagination, search, and stats. Every mutation
//! publishes its change event only after the database write has committed.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::db::repositories;
use crate::error::{AppError, AppResult};
use crate::handlers::http::AppState;
use crate::models::{
    BlogView, ChangeEvent, CreateBlogRequest, PageQuery, Pagination, SearchQuery,
    UpdateBlogRequest, UserWithBlogs,
};

/// GET /api/blog — all blogs, newest first, paginated.
pub async fn list_blogs(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let (limit, offset) = page.to_sql();
    let total = repositories::blogs_count(state.db()).await?;
    let blogs: Vec<BlogView> = repositories::blogs_list(state.db(), limit, offset)
        .await?
        .into_iter()
        .map(BlogView::from)
        .collect();

    Ok(Json(json!({
        "blogs": blogs,
        "pagination": Pagination::new(&page, total)
    })))
}

/// GET /api/blog/search — case-insensitive substring match on title or
/// description.
pub async fn search_blogs(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let term = params.query.as_deref().unwrap_or("").trim().to_string();
    if term.is_empty() {
        return Err(AppError::Validation("Search query is required".to_string()));
    }

    let pattern = format!("%{}%", term);
    let paging = params.paging();
    let (limit, offset) = paging.to_sql();
    let total = repositories::blogs_search_count(state.db(), &pattern).await?;
    let blogs: Vec<BlogView> = repositories::blogs_search(state.db(), &pattern, limit, offset)
        .await?
        .into_iter()
        .map(BlogView::from)
        .collect();

    Ok(Json(json!({
        "blogs": blogs,
        "searchQuery": term,
        "pagination": Pagination::new(&paging, total)
    })))
}

/// GET /api/blog/stats — totals, last-24h count, top five authors.
pub async fn blog_stats(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let total_blogs = repositories::blogs_count(state.db()).await?;
    let total_users = repositories::user_count(state.db()).await?;
    let recent_blogs = repositories::blogs_count_last_day(state.db()).await?;
    let top_authors: Vec<serde_json::Value> = repositories::top_authors(state.db(), 5)
        .await?
        .into_iter()
        .map(|a| json!({ "name": a.name, "blogCount": a.blog_count }))
        .collect();

    Ok(Json(json!({
        "stats": {
            "totalBlogs": total_blogs,
            "totalUsers": total_users,
            "recentBlogs": recent_blogs,
            "topAuthors": top_authors
        }
    })))
}

/// GET /api/blog/:id — one blog; counts the view.
pub async fn get_blog(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let blog = repositories::blog_get_and_count_view(state.db(), id)
        .await?
        .ok_or_else(|| AppError::NotFound("Blog not found".to_string()))?;
    Ok(Json(json!({ "blog": BlogView::from(blog) })))
}

/// POST /api/blog/add — create a blog. The insert and the author's blog
/// list update commit together; the event goes out only after that.
pub async fn create_blog(
    State(state): State<AppState>,
    Json(body): Json<CreateBlogRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let author = repositories::user_get_by_id(state.db(), body.user)
        .await?
        .ok_or_else(|| AppError::NotFound("Unable to find user by this id".to_string()))?;

    let blog = repositories::blog_create(
        state.db(),
        body.title.trim(),
        body.description.trim(),
        &body.image,
        author.id,
    )
    .await?;

    let view = blog.into_view(author.author_view());
    state.hub().publish(ChangeEvent::new_blog(view.clone()));

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "blog": view,
            "message": "Blog created successfully"
        })),
    ))
}

/// PUT /api/blog/update/:id — update title/description (and image when
/// provided), then notify watchers.
pub async fn update_blog(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateBlogRequest>,
) -> AppResult<Json<serde_json::Value>> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let row = repositories::blog_update(
        state.db(),
        id,
        body.title.trim(),
        body.description.trim(),
        body.image.as_deref(),
    )
    .await?
    .ok_or_else(|| AppError::NotFound("Unable to update the blog".to_string()))?;

    let view = BlogView::from(row);
    state.hub().publish(ChangeEvent::blog_updated(view.clone()));

    Ok(Json(json!({
        "blog": view,
        "message": "Blog updated successfully"
    })))
}

/// DELETE /api/blog/:id — delete a blog. The delete and the author's blog
/// list update commit together.
pub async fn delete_blog(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let blog = repositories::blog_delete(state.db(), id)
        .await?
        .ok_or_else(|| AppError::NotFound("Blog not found".to_string()))?;

    state
        .hub()
        .publish(ChangeEvent::blog_deleted(blog.id, &blog.title, blog.user_id));

    Ok(Json(json!({
        "message": "Blog deleted successfully",
        "deletedBlogId": blog.id
    })))
}

/// GET /api/blog/user/:id — one user's blogs, newest first, paginated.
pub async fn user_blogs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let user = repositories::user_get_by_id(state.db(), id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let (limit, offset) = page.to_sql();
    let total = repositories::blogs_count_by_user(state.db(), id).await?;
    let blogs: Vec<BlogView> = repositories::blogs_by_user(state.db(), id, limit, offset)
        .await?
        .into_iter()
        .map(BlogView::from)
        .collect();

    let detail = UserWithBlogs {
        user: user.into(),
        blogs,
    };
    Ok(Json(json!({
        "user": detail,
        "pagination": Pagination::new(&page, total)
    })))
}
