use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware, Extension, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::warn;

use crate::{
    config::Config,
    handlers::{auth::auth_handler, posts::posts_handler, user::users_handler},
    middleware::authorization_from_cookie,
    AppState,
};

/// Room for the text fields of a multipart form on top of the image.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn create_routes(app_state: Arc<AppState>) -> Router {
    let config = &app_state.config;
    let body_limit = config.max_upload_kb * 1024 + FORM_OVERHEAD_BYTES;

    let api_route = Router::new()
        .merge(auth_handler())
        .merge(users_handler())
        .merge(posts_handler());

    Router::new()
        .nest("/api", api_route)
        .nest_service("/storage", ServeDir::new(&config.upload_dir))
        .layer(middleware::from_fn(authorization_from_cookie))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(configure_cors(config))
        .layer(Extension(app_state))
}

pub fn configure_cors(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    let origin = config
        .frontend_url
        .as_deref()
        .and_then(|url| match HeaderValue::from_str(url) {
            Ok(origin) => Some(origin),
            Err(_) => {
                warn!(url, "Ignoring invalid FRONTEND_URL");
                None
            }
        });

    match origin {
        // Cookies cross origins only towards a known frontend.
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods(methods)
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any),
    }
}
