use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use axum_extra::extract::cookie::SameSite;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    config::Config,
    repositories::{memory::MemoryRepo, user_repo::UserRepository},
    routes::create_routes,
    AppState,
};

const BOUNDARY: &str = "XTESTBOUNDARY";
const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

fn test_config() -> Config {
    Config {
        database_url: String::new(),
        jwt_secret: "test-secret".to_string(),
        jwt_maxage: 60,
        port: 0,
        cookie_secure: false,
        cookie_same_site: SameSite::Lax,
        upload_dir: std::env::temp_dir().join(format!("handlers-test-{}", Uuid::now_v7())),
        max_upload_kb: 2048,
        frontend_url: None,
    }
}

fn app() -> (Router, Arc<MemoryRepo>) {
    let repo = Arc::new(MemoryRepo::new());
    let state = AppState::new(test_config(), repo.clone());
    (create_routes(Arc::new(state)), repo)
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    TestResponse {
        status,
        headers,
        body,
    }
}

fn json_request(method: Method, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn multipart_request(
    method: Method,
    uri: &str,
    fields: &[(&str, &str)],
    image: Option<(&str, &[u8])>,
    token: Option<&str>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let mut builder = Request::builder().method(method).uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={}", BOUNDARY),
    );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

/// Registers a user over HTTP and logs in, returning the user id and token.
async fn register_and_login(app: &Router, email: &str) -> (String, String) {
    let created = send(
        app,
        json_request(
            Method::POST,
            "/api/users",
            json!({"name": "John", "email": email, "password": "secret123"}),
            None,
        ),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);

    let login = send(
        app,
        json_request(
            Method::POST,
            "/api/login",
            json!({"email": email, "password": "secret123"}),
            None,
        ),
    )
    .await;
    assert_eq!(login.status, StatusCode::OK);

    (
        created.body["id"].as_str().unwrap().to_string(),
        login.body["token"].as_str().unwrap().to_string(),
    )
}

fn set_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::SET_COOKIE)
        .map(|v| v.to_str().unwrap().to_string())
}

#[tokio::test]
async fn create_user_then_conflict_on_same_email() {
    let (app, _) = app();
    let body = json!({"name": "John", "email": "john@example.com", "password": "secret123"});

    let created = send(&app, json_request(Method::POST, "/api/users", body.clone(), None)).await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["email"], "john@example.com");
    assert!(created.body.get("password").is_none());

    let duplicate = send(&app, json_request(Method::POST, "/api/users", body, None)).await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn invalid_user_is_unprocessable() {
    let (app, _) = app();
    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/users",
            json!({"name": "", "email": "nope", "password": "1"}),
            None,
        ),
    )
    .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body["errors"]["email"].is_array());
    assert!(response.body["errors"]["password"].is_array());
}

#[tokio::test]
async fn missing_users_are_not_found() {
    let (app, _) = app();

    for uri in [
        format!("/api/users/{}", Uuid::now_v7()),
        "/api/users/not-a-uuid".to_string(),
        "/api/users/email/nobody@example.com".to_string(),
        format!("/api/users/email/nobody@example.com/id/{}", Uuid::now_v7()),
    ] {
        let response = send(&app, empty_request(Method::GET, &uri)).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(response.body["error"], "User not found");
    }
}

#[tokio::test]
async fn lookup_by_email_and_id() {
    let (app, _) = app();
    let (user_id, _) = register_and_login(&app, "jane@example.com").await;

    let uri = format!("/api/users/email/jane@example.com/id/{}", user_id);
    let response = send(&app, empty_request(Method::GET, &uri)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["id"], user_id.as_str());
}

#[tokio::test]
async fn wrong_password_sets_no_cookie() {
    let (app, _) = app();
    register_and_login(&app, "john@example.com").await;

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/login",
            json!({"email": "john@example.com", "password": "wrong-password"}),
            None,
        ),
    )
    .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "The provided credentials are incorrect.");
    assert!(set_cookie(&response.headers).is_none());
}

#[tokio::test]
async fn login_sets_http_only_cookie() {
    let (app, _) = app();
    register_and_login(&app, "john@example.com").await;

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/login",
            json!({"email": "john@example.com", "password": "secret123"}),
            None,
        ),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Login successful");
    assert_eq!(response.body["user"]["email"], "john@example.com");

    let cookie = set_cookie(&response.headers).unwrap();
    let token = response.body["token"].as_str().unwrap();
    assert!(cookie.starts_with(&format!("api_auth_token={}", token)));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=3600"));
}

#[tokio::test]
async fn cookie_only_logout_revokes_token() {
    let (app, repo) = app();
    let (user_id, token) = register_and_login(&app, "john@example.com").await;
    assert_eq!(repo.token_count().await, 1);

    let logout = Request::builder()
        .method(Method::POST)
        .uri("/api/logout")
        .header(header::COOKIE, format!("api_auth_token={}", token))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, logout).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Successfully logged out");
    assert!(set_cookie(&response.headers).unwrap().contains("Max-Age=0"));
    assert_eq!(repo.token_count().await, 0);

    let response = send(
        &app,
        json_request(
            Method::PATCH,
            &format!("/api/users/{}", user_id),
            json!({"name": "Johnny"}),
            Some(&token),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn users_may_only_edit_themselves() {
    let (app, _) = app();
    let (john_id, john_token) = register_and_login(&app, "john@example.com").await;
    let (jane_id, _) = register_and_login(&app, "jane@example.com").await;

    let uri = format!("/api/users/{}", jane_id);
    let response = send(
        &app,
        json_request(Method::PATCH, &uri, json!({"name": "Hacked"}), Some(&john_token)),
    )
    .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let uri = format!("/api/users/{}", john_id);
    let response = send(
        &app,
        json_request(Method::PATCH, &uri, json!({"name": "Johnny"}), Some(&john_token)),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["name"], "Johnny");
    assert_eq!(response.body["email"], "john@example.com");
}

#[tokio::test]
async fn delete_own_account() {
    let (app, _) = app();
    let (user_id, token) = register_and_login(&app, "john@example.com").await;

    let uri = format!("/api/users/{}", user_id);
    let mut request = empty_request(Method::DELETE, &uri);
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", token).parse().unwrap(),
    );
    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "User deleted successfully");

    let response = send(&app, empty_request(Method::GET, &uri)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn thirty_one_users_make_three_pages() {
    let (app, repo) = app();
    for i in 0..31 {
        repo.create_user(&format!("User {}", i), &format!("user{}@example.com", i), "hash")
            .await
            .unwrap();
    }

    let response = send(&app, empty_request(Method::GET, "/api/users?page=3")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 31);
    assert_eq!(response.body["total_pages"], 3);
    assert_eq!(response.body["page"], 3);
    assert_eq!(response.body["items"].as_array().unwrap().len(), 1);

    let response = send(&app, empty_request(Method::GET, "/api/users?page=0")).await;
    assert_eq!(response.body["page"], 1);
    assert_eq!(response.body["items"].as_array().unwrap().len(), 15);
}

#[tokio::test]
async fn huge_page_returns_empty_list() {
    let (app, repo) = app();
    repo.create_user("John", "john@example.com", "hash")
        .await
        .unwrap();

    for uri in [
        "/api/users?page=9223372036854775807",
        "/api/posts?page=9223372036854775807",
    ] {
        let response = send(&app, empty_request(Method::GET, uri)).await;
        assert_eq!(response.status, StatusCode::OK, "{}", uri);
        assert!(response.body["items"].as_array().unwrap().is_empty());
    }
}

#[tokio::test]
async fn invalid_user_filter_is_rejected() {
    let (app, _) = app();

    let response = send(&app, empty_request(Method::GET, "/api/users?created_month=13")).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = send(&app, empty_request(Method::GET, "/api/users?ids=abc")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn creating_post_requires_auth() {
    let (app, _) = app();
    let response = send(
        &app,
        multipart_request(
            Method::POST,
            "/api/posts",
            &[("title", "Hello"), ("content", "World")],
            None,
            None,
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_post_derives_slug() {
    let (app, _) = app();
    let (user_id, token) = register_and_login(&app, "john@example.com").await;

    let response = send(
        &app,
        multipart_request(
            Method::POST,
            "/api/posts",
            &[("title", "My First Post!"), ("content", "Hello world")],
            Some(("cover.png", PNG_MAGIC)),
            Some(&token),
        ),
    )
    .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["slug"], "my-first-post");
    assert_eq!(response.body["user_id"], user_id.as_str());
    assert!(response.body["image"]
        .as_str()
        .unwrap()
        .starts_with("uploads/"));

    let post_id = response.body["id"].as_str().unwrap();
    let fetched = send(&app, empty_request(Method::GET, &format!("/api/posts/{}", post_id))).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["title"], "My First Post!");
}

#[tokio::test]
async fn create_post_requires_title_and_content() {
    let (app, _) = app();
    let (_, token) = register_and_login(&app, "john@example.com").await;

    let response = send(
        &app,
        multipart_request(Method::POST, "/api/posts", &[], None, Some(&token)),
    )
    .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body["errors"]["title"].is_array());
    assert!(response.body["errors"]["content"].is_array());
}

#[tokio::test]
async fn disallowed_image_extension_is_rejected() {
    let (app, _) = app();
    let (_, token) = register_and_login(&app, "john@example.com").await;

    let response = send(
        &app,
        multipart_request(
            Method::POST,
            "/api/posts",
            &[("title", "Hello"), ("content", "World")],
            Some(("notes.pdf", &b"%PDF-1.4"[..])),
            Some(&token),
        ),
    )
    .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body["errors"]["image"].is_array());
}

#[tokio::test]
async fn form_and_image_errors_are_reported_together() {
    let (app, _) = app();
    let (_, token) = register_and_login(&app, "john@example.com").await;

    let response = send(
        &app,
        multipart_request(
            Method::POST,
            "/api/posts",
            &[("content", "World")],
            Some(("notes.pdf", &b"%PDF-1.4"[..])),
            Some(&token),
        ),
    )
    .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body["errors"]["title"].is_array());
    assert!(response.body["errors"]["image"].is_array());
    assert!(response.body["errors"].get("content").is_none());
}

#[tokio::test]
async fn patch_without_title_keeps_slug() {
    let (app, _) = app();
    let (_, token) = register_and_login(&app, "john@example.com").await;

    let created = send(
        &app,
        multipart_request(
            Method::POST,
            "/api/posts",
            &[("title", "My First Post!"), ("content", "Hello")],
            None,
            Some(&token),
        ),
    )
    .await;
    let uri = format!("/api/posts/{}", created.body["id"].as_str().unwrap());

    let patched = send(
        &app,
        multipart_request(Method::PATCH, &uri, &[("content", "Changed")], None, Some(&token)),
    )
    .await;
    assert_eq!(patched.status, StatusCode::OK);
    assert_eq!(patched.body["slug"], "my-first-post");
    assert_eq!(patched.body["content"], "Changed");

    let replaced = send(
        &app,
        multipart_request(
            Method::PUT,
            &uri,
            &[("title", "Brand New Title"), ("content", "Fresh")],
            None,
            Some(&token),
        ),
    )
    .await;
    assert_eq!(replaced.status, StatusCode::OK);
    assert_eq!(replaced.body["slug"], "brand-new-title");
}

#[tokio::test]
async fn only_owner_deletes_post() {
    let (app, _) = app();
    let (_, john_token) = register_and_login(&app, "john@example.com").await;
    let (_, jane_token) = register_and_login(&app, "jane@example.com").await;

    let created = send(
        &app,
        multipart_request(
            Method::POST,
            "/api/posts",
            &[("title", "Mine"), ("content", "Hello")],
            None,
            Some(&john_token),
        ),
    )
    .await;
    let uri = format!("/api/posts/{}", created.body["id"].as_str().unwrap());

    let response = send(
        &app,
        json_request(Method::DELETE, &uri, Value::Null, Some(&jane_token)),
    )
    .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = send(
        &app,
        json_request(Method::DELETE, &uri, Value::Null, Some(&john_token)),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Post deleted successfully");

    let response = send(&app, empty_request(Method::GET, &uri)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn post_list_is_paginated() {
    let (app, _) = app();
    let (_, token) = register_and_login(&app, "john@example.com").await;

    for i in 0..3 {
        let title = format!("Post {}", i);
        send(
            &app,
            multipart_request(
                Method::POST,
                "/api/posts",
                &[("title", title.as_str()), ("content", "Hello")],
                None,
                Some(&token),
            ),
        )
        .await;
    }

    let response = send(&app, empty_request(Method::GET, "/api/posts")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 3);
    assert_eq!(response.body["total_pages"], 1);
    assert_eq!(response.body["items"].as_array().unwrap().len(), 3);
}
