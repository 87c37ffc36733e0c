use std::sync::Arc;

use axum::{middleware, response::IntoResponse, routing::post, Extension, Json, Router};
use axum_extra::extract::{cookie::Cookie, CookieJar};
use validator::Validate;

use crate::{
    middleware::{auth, AuthenticatedUser, TOKEN_COOKIE},
    models::{
        response::Response,
        users::{FilterUserDto, LoginUserDto, UserLoginResponseDto},
    },
    AppState, Result,
};

pub fn auth_handler() -> Router {
    Router::new()
        .route("/logout", post(logout))
        .route_layer(middleware::from_fn(auth))
        .route("/login", post(login))
}

pub async fn login(
    Extension(app_state): Extension<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<LoginUserDto>,
) -> Result<impl IntoResponse> {
    body.validate()?;

    let (user, token) = app_state
        .auth_service
        .login(&body.email, &body.password)
        .await?;

    let config = &app_state.config;
    let cookie = Cookie::build((TOKEN_COOKIE, token.clone()))
        .path("/")
        .max_age(time::Duration::minutes(config.jwt_maxage))
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(config.cookie_same_site);

    let response = Json(UserLoginResponseDto {
        user: FilterUserDto::filter_user(&user),
        message: "Login successful".to_string(),
        token,
    });

    Ok((jar.add(cookie), response))
}

pub async fn logout(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(current): Extension<AuthenticatedUser>,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    app_state.auth_service.logout(current.token_id).await?;

    let mut cookie = Cookie::build((TOKEN_COOKIE, "")).path("/").build();
    cookie.make_removal();

    Ok((jar.add(cookie), Json(Response::new("Successfully logged out"))))
}
