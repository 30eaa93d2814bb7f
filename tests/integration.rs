//! Integration tests: health, signup/login, blog CRUD, search, stats.
//!
//! Run with `cargo test`. Tests that need a database are skipped unless
//! `TEST_DATABASE_URL` is set (Postgres, run migrations first).

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bloggy::services::EventHub;
use bloggy::{create_app, db, AppState};
use tower::util::ServiceExt;

async fn test_app() -> Option<axum::Router> {
    let database_url = match std::env::var("TEST_DATABASE_URL") {
        Ok(u) => u,
        Err(_) => {
            eprintln!("Skip integration test: set TEST_DATABASE_URL");
            return None;
        }
    };
    let db_pool = match db::create_pool(&database_url).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Skip integration test: {}", e);
            return None;
        }
    };
    let hub = EventHub::start();
    Some(create_app(AppState::new(db_pool, hub)))
}

async fn request(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let res = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn unique_email(tag: &str) -> String {
    format!("{}-{}@example.com", tag, uuid::Uuid::new_v4())
}

async fn signup(app: &axum::Router, name: &str, email: &str) -> serde_json::Value {
    let body = serde_json::json!({ "name": name, "email": email, "password": "password123" });
    let (status, json) = request(app, "POST", "/api/user/signup", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "signup should succeed: {json}");
    json["user"].clone()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = match test_app().await {
        Some(app) => app,
        None => return,
    };
    let (status, json) = request(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.get("status").and_then(|v| v.as_str()), Some("ok"));
    assert_eq!(json.get("service").and_then(|v| v.as_str()), Some("bloggy"));
}

#[tokio::test]
async fn root_serves_the_api_banner() {
    let app = match test_app().await {
        Some(app) => app,
        None => return,
    };
    let (status, json) = request(&app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json.get("message").and_then(|v| v.as_str()),
        Some("BLOGGY API Server")
    );
    assert_eq!(json.get("status").and_then(|v| v.as_str()), Some("running"));
}

#[tokio::test]
async fn signup_login_and_profile_update() {
    let app = match test_app().await {
        Some(app) => app,
        None => return,
    };
    let email = unique_email("signup");

    let user = signup(&app, "Ada Lovelace", &email).await;
    assert_eq!(user["name"], "Ada Lovelace");
    assert_eq!(user["email"], email);
    assert!(user.get("password").is_none(), "password must never leave the server");
    let user_id = user["id"].as_str().unwrap().to_string();

    // The same email again is rejected.
    let body = serde_json::json!({ "name": "Ada Again", "email": email, "password": "password123" });
    let (status, json) = request(&app, "POST", "/api/user/signup", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "User already existed!! Login Instead");

    // Login happy path, then each failure mode.
    let body = serde_json::json!({ "email": email, "password": "password123" });
    let (status, json) = request(&app, "POST", "/api/user/login", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Login Successful!!");
    assert_eq!(json["user"]["id"].as_str(), Some(user_id.as_str()));

    let body = serde_json::json!({ "email": email, "password": "wrong-password" });
    let (status, json) = request(&app, "POST", "/api/user/login", Some(body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "Incorrect Password");

    let body = serde_json::json!({ "email": unique_email("ghost"), "password": "password123" });
    let (status, json) = request(&app, "POST", "/api/user/login", Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Couldn't find an account with this email");

    // Partial profile update leaves untouched fields alone.
    let body = serde_json::json!({ "bio": "Analyst and programmer." });
    let uri = format!("/api/user/update/{user_id}");
    let (status, json) = request(&app, "PUT", &uri, Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Profile updated successfully");
    assert_eq!(json["user"]["name"], "Ada Lovelace");
    assert_eq!(json["user"]["bio"], "Analyst and programmer.");

    let uri = format!("/api/user/{user_id}");
    let (status, json) = request(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["bio"], "Analyst and programmer.");
    assert!(json["user"]["blogs"].as_array().unwrap().is_empty());

    let (status, json) = request(&app, "GET", "/api/user/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["users"].as_array().unwrap().len() >= 1);
}

#[tokio::test]
async fn blog_crud_flow() {
    let app = match test_app().await {
        Some(app) => app,
        None => return,
    };
    let marker = uuid::Uuid::new_v4().simple().to_string();
    let user = signup(&app, "Blog Author", &unique_email("author")).await;
    let user_id = user["id"].as_str().unwrap().to_string();

    let body = serde_json::json!({
        "title": format!("Searchable {marker}"),
        "description": "A long enough description for the validator to accept.",
        "image": "https://example.com/cover.png",
        "user": user_id,
    });
    let (status, json) = request(&app, "POST", "/api/blog/add", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "create should succeed: {json}");
    assert_eq!(json["message"], "Blog created successfully");
    assert_eq!(json["blog"]["user"]["id"].as_str(), Some(user_id.as_str()));
    let blog_id = json["blog"]["id"].as_str().unwrap().to_string();

    // Every detail fetch counts a view.
    let uri = format!("/api/blog/{blog_id}");
    let (status, json) = request(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let first_views = json["blog"]["views"].as_i64().unwrap();
    let (_, json) = request(&app, "GET", &uri, None).await;
    assert_eq!(json["blog"]["views"].as_i64().unwrap(), first_views + 1);

    let body = serde_json::json!({
        "title": format!("Updated {marker}"),
        "description": "The revised description is still long enough.",
    });
    let uri = format!("/api/blog/update/{blog_id}");
    let (status, json) = request(&app, "PUT", &uri, Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Blog updated successfully");
    assert_eq!(json["blog"]["title"], format!("Updated {marker}"));
    assert_eq!(
        json["blog"]["image"], "https://example.com/cover.png",
        "omitted image keeps its old value"
    );

    let (status, json) = request(&app, "GET", "/api/blog/?page=1&limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["blogs"].as_array().unwrap().len() <= 5);
    assert_eq!(json["pagination"]["currentPage"], 1);
    assert!(json["pagination"]["totalBlogs"].as_i64().unwrap() >= 1);

    let uri = format!("/api/blog/search?query={marker}");
    let (status, json) = request(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["searchQuery"], marker);
    let hits = json["blogs"].as_array().unwrap();
    assert!(hits.iter().any(|b| b["id"] == blog_id.as_str()));

    let uri = format!("/api/blog/user/{user_id}");
    let (status, json) = request(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["id"].as_str(), Some(user_id.as_str()));
    let blogs = json["user"]["blogs"].as_array().unwrap();
    assert!(blogs.iter().any(|b| b["id"] == blog_id.as_str()));

    let (status, json) = request(&app, "GET", "/api/blog/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["stats"]["totalBlogs"].as_i64().unwrap() >= 1);
    assert!(json["stats"]["totalUsers"].as_i64().unwrap() >= 1);
    assert!(json["stats"]["topAuthors"].as_array().unwrap().len() >= 1);

    let uri = format!("/api/blog/{blog_id}");
    let (status, json) = request(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Blog deleted successfully");
    assert_eq!(json["deletedBlogId"].as_str(), Some(blog_id.as_str()));

    let (status, json) = request(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Blog not found");
}

#[tokio::test]
async fn create_blog_for_unknown_user_is_rejected() {
    let app = match test_app().await {
        Some(app) => app,
        None => return,
    };
    let body = serde_json::json!({
        "title": "Orphan blog",
        "description": "A long enough description for the validator to accept.",
        "image": "https://example.com/cover.png",
        "user": uuid::Uuid::new_v4(),
    });
    let (status, json) = request(&app, "POST", "/api/blog/add", Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Unable to find user by this id");
}

#[tokio::test]
async fn search_requires_a_query() {
    let app = match test_app().await {
        Some(app) => app,
        None => return,
    };
    let (status, json) = request(&app, "GET", "/api/blog/search", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Search query is required");
}
