//! Repositories: users and blogs, including the two transactional
//! cross-entity writes (blog create/delete maintain the author's blog list).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{AuthorView, BlogView, UpdateProfileRequest, UserView};

use super::DbPool;

// ---- Users ----

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub blog_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserView {
    fn from(row: UserRow) -> Self {
        UserView {
            id: row.id,
            name: row.name,
            email: row.email,
            bio: row.bio,
            avatar: row.avatar,
            website: row.website,
            location: row.location,
            blog_count: row.blog_ids.len(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl UserRow {
    pub fn author_view(&self) -> AuthorView {
        AuthorView {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, bio, avatar, website, location, blog_ids, created_at, updated_at";

pub async fn user_create(
    pool: &DbPool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> AppResult<UserRow> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
        USER_COLUMNS
    ))
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn user_find_by_email(pool: &DbPool, email: &str) -> AppResult<Option<UserRow>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {} FROM users WHERE email = $1",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn user_get_by_id(pool: &DbPool, id: Uuid) -> AppResult<Option<UserRow>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {} FROM users WHERE id = $1",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn users_list(pool: &DbPool) -> AppResult<Vec<UserRow>> {
    let rows = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC",
        USER_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn user_count(pool: &DbPool) -> AppResult<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

/// Update profile fields; absent (`None`) fields keep their stored value.
pub async fn user_update_profile(
    pool: &DbPool,
    id: Uuid,
    update: &UpdateProfileRequest,
) -> AppResult<Option<UserRow>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        r#"
        UPDATE users
        SET name = COALESCE($2, name),
            bio = COALESCE($3, bio),
            avatar = COALESCE($4, avatar),
            website = COALESCE($5, website),
            location = COALESCE($6, location),
            updated_at = now()
        WHERE id = $1
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(id)
    .bind(update.name.as_deref())
    .bind(update.bio.as_deref())
    .bind(update.avatar.as_deref())
    .bind(update.website.as_deref())
    .bind(update.location.as_deref())
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

// ---- Blogs ----

#[derive(Debug, FromRow)]
pub struct BlogRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image: String,
    pub user_id: Uuid,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlogRow {
    /// Attach the author's public fields to build the API view.
    pub fn into_view(self, author: AuthorView) -> BlogView {
        BlogView {
            id: self.id,
            title: self.title,
            description: self.description,
            image: self.image,
            user: author,
            views: self.views,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A blog row joined with its author's public fields.
#[derive(Debug, FromRow)]
pub struct BlogWithAuthorRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image: String,
    pub user_id: Uuid,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author_name: String,
    pub author_email: String,
}

impl From<BlogWithAuthorRow> for BlogView {
    fn from(row: BlogWithAuthorRow) -> Self {
        BlogView {
            id: row.id,
            title: row.title,
            description: row.description,
            image: row.image,
            user: AuthorView {
                id: row.user_id,
                name: row.author_name,
                email: row.author_email,
            },
            views: row.views,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const BLOG_AUTHOR_COLUMNS: &str = "b.id, b.title, b.description, b.image, b.user_id, b.views, b.created_at, b.updated_at, u.name AS author_name, u.email AS author_email";

/// Create a blog and append it to the author's blog list in one
/// transaction. Both writes commit or neither does.
pub async fn blog_create(
    pool: &DbPool,
    title: &str,
    description: &str,
    image: &str,
    author_id: Uuid,
) -> AppResult<BlogRow> {
    let mut tx = pool.begin().await?;

    let blog = sqlx::query_as::<_, BlogRow>(
        r#"
        INSERT INTO blogs (title, description, image, user_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, title, description, image, user_id, views, created_at, updated_at
        "#,
    )
    .bind(title)
    .bind(description)
    .bind(image)
    .bind(author_id)
    .fetch_one(&mut *tx)
    .await?;

    let updated = sqlx::query(
        "UPDATE users SET blog_ids = array_append(blog_ids, $1), updated_at = now() WHERE id = $2",
    )
    .bind(blog.id)
    .bind(author_id)
    .execute(&mut *tx)
    .await?;
    if updated.rows_affected() == 0 {
        // tx dropped here, rolling back the insert
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tx.commit().await?;
    Ok(blog)
}

/// Delete a blog and remove it from the author's blog list in one
/// transaction. Returns the deleted row, or `None` if the id is unknown.
pub async fn blog_delete(pool: &DbPool, id: Uuid) -> AppResult<Option<BlogRow>> {
    let mut tx = pool.begin().await?;

    let blog = sqlx::query_as::<_, BlogRow>(
        "SELECT id, title, description, image, user_id, views, created_at, updated_at FROM blogs WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(blog) = blog else {
        return Ok(None);
    };

    sqlx::query(
        "UPDATE users SET blog_ids = array_remove(blog_ids, $1), updated_at = now() WHERE id = $2",
    )
    .bind(blog.id)
    .bind(blog.user_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM blogs WHERE id = $1")
        .bind(blog.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(Some(blog))
}

/// Update title/description (and image when provided), returning the row
/// with its author populated.
pub async fn blog_update(
    pool: &DbPool,
    id: Uuid,
    title: &str,
    description: &str,
    image: Option<&str>,
) -> AppResult<Option<BlogWithAuthorRow>> {
    let row = sqlx::query_as::<_, BlogWithAuthorRow>(
        r#"
        UPDATE blogs b
        SET title = $2, description = $3, image = COALESCE($4, b.image), updated_at = now()
        FROM users u
        WHERE b.id = $1 AND u.id = b.user_id
        RETURNING b.id, b.title, b.description, b.image, b.user_id, b.views, b.created_at, b.updated_at,
                  u.name AS author_name, u.email AS author_email
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(description)
    .bind(image)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Fetch one blog and bump its view counter in the same statement.
pub async fn blog_get_and_count_view(
    pool: &DbPool,
    id: Uuid,
) -> AppResult<Option<BlogWithAuthorRow>> {
    let row = sqlx::query_as::<_, BlogWithAuthorRow>(
        r#"
        UPDATE blogs b
        SET views = b.views + 1
        FROM users u
        WHERE b.id = $1 AND u.id = b.user_id
        RETURNING b.id, b.title, b.description, b.image, b.user_id, b.views, b.created_at, b.updated_at,
                  u.name AS author_name, u.email AS author_email
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn blogs_list(
    pool: &DbPool,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<BlogWithAuthorRow>> {
    let rows = sqlx::query_as::<_, BlogWithAuthorRow>(&format!(
        r#"
        SELECT {}
        FROM blogs b
        JOIN users u ON u.id = b.user_id
        ORDER BY b.created_at DESC
        LIMIT $1 OFFSET $2
        "#,
        BLOG_AUTHOR_COLUMNS
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn blogs_count(pool: &DbPool) -> AppResult<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM blogs")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

/// Case-insensitive substring search over title and description.
pub async fn blogs_search(
    pool: &DbPool,
    pattern: &str,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<BlogWithAuthorRow>> {
    let rows = sqlx::query_as::<_, BlogWithAuthorRow>(&format!(
        r#"
        SELECT {}
        FROM blogs b
        JOIN users u ON u.id = b.user_id
        WHERE b.title ILIKE $1 OR b.description ILIKE $1
        ORDER BY b.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
        BLOG_AUTHOR_COLUMNS
    ))
    .bind(pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn blogs_search_count(pool: &DbPool, pattern: &str) -> AppResult<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM blogs WHERE title ILIKE $1 OR description ILIKE $1",
    )
    .bind(pattern)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

pub async fn blogs_by_user(
    pool: &DbPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<BlogWithAuthorRow>> {
    let rows = sqlx::query_as::<_, BlogWithAuthorRow>(&format!(
        r#"
        SELECT {}
        FROM blogs b
        JOIN users u ON u.id = b.user_id
        WHERE b.user_id = $1
        ORDER BY b.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
        BLOG_AUTHOR_COLUMNS
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Every blog by one user, newest first, for the populated user view.
pub async fn user_blogs_all(pool: &DbPool, user_id: Uuid) -> AppResult<Vec<BlogWithAuthorRow>> {
    let rows = sqlx::query_as::<_, BlogWithAuthorRow>(&format!(
        r#"
        SELECT {}
        FROM blogs b
        JOIN users u ON u.id = b.user_id
        WHERE b.user_id = $1
        ORDER BY b.created_at DESC
        "#,
        BLOG_AUTHOR_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn blogs_count_by_user(pool: &DbPool, user_id: Uuid) -> AppResult<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM blogs WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

pub async fn blogs_count_last_day(pool: &DbPool) -> AppResult<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM blogs WHERE created_at >= now() - INTERVAL '24 hours'",
    )
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

#[derive(Debug, FromRow)]
pub struct TopAuthorRow {
    pub name: String,
    pub blog_count: i64,
}

pub async fn top_authors(pool: &DbPool, limit: i64) -> AppResult<Vec<TopAuthorRow>> {
    let rows = sqlx::query_as::<_, TopAuthorRow>(
        r#"
        SELECT u.name, COUNT(b.id) AS blog_count
        FROM blogs b
        JOIN users u ON u.id = b.user_id
        GROUP BY u.id, u.name
        ORDER BY COUNT(b.id) DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
