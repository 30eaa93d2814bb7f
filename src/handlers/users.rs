//! User handlers: list, signup, login, detail, profile update.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::auth::PasswordService;
use crate::db::repositories;
use crate::error::{AppError, AppResult};
use crate::handlers::http::AppState;
use crate::models::{
    BlogView, ChangeEvent, LoginRequest, SignupRequest, UpdateProfileRequest, UserView,
    UserWithBlogs,
};

/// GET /api/user
pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let users: Vec<UserView> = repositories::users_list(state.db())
        .await?
        .into_iter()
        .map(UserView::from)
        .collect();
    Ok(Json(json!({ "users": users })))
}

/// POST /api/user/signup — create an account and announce it to everyone.
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let email = body.email.trim().to_lowercase();

    if repositories::user_find_by_email(state.db(), &email)
        .await?
        .is_some()
    {
        return Err(AppError::Validation(
            "User already existed!! Login Instead".to_string(),
        ));
    }

    let hash = PasswordService::hash_password(&body.password)?;
    let user = repositories::user_create(state.db(), body.name.trim(), &email, &hash).await?;
    let user_count = repositories::user_count(state.db()).await?;

    let view = UserView::from(user);
    state
        .hub()
        .publish(ChangeEvent::user_registered(&view.name, user_count));

    Ok((StatusCode::CREATED, Json(json!({ "user": view }))))
}

/// POST /api/user/login — verify credentials and greet the user's room.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let email = body.email.trim().to_lowercase();
    let user = repositories::user_find_by_email(state.db(), &email)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("Couldn't find an account with this email".to_string())
        })?;

    if !PasswordService::verify_password(&body.password, &user.password_hash)? {
        return Err(AppError::Auth("Incorrect Password".to_string()));
    }

    state
        .hub()
        .publish(ChangeEvent::user_logged_in(user.id, &user.name));

    Ok(Json(json!({
        "message": "Login Successful!!",
        "user": UserView::from(user)
    })))
}

/// GET /api/user/:id — one user with their blogs populated.
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let user = repositories::user_get_by_id(state.db(), id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let blogs: Vec<BlogView> = repositories::user_blogs_all(state.db(), id)
        .await?
        .into_iter()
        .map(BlogView::from)
        .collect();

    let detail = UserWithBlogs {
        user: user.into(),
        blogs,
    };
    Ok(Json(json!({ "user": detail })))
}

/// PUT /api/user/update/:id — update profile fields and notify the user's
/// room. Absent fields are left untouched.
pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateProfileRequest>,
) -> AppResult<Json<serde_json::Value>> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = repositories::user_update_profile(state.db(), id, &body)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let view = UserView::from(user);
    state
        .hub()
        .publish(ChangeEvent::profile_updated(view.clone()));

    Ok(Json(json!({
        "user": view,
        "message": "Profile updated successfully"
    })))
}
