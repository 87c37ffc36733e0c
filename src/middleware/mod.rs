use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use crate::{models::users::User, AppState, Error, Result};

pub const TOKEN_COOKIE: &str = "api_auth_token";

/// The authenticated caller, inserted into request extensions by [`auth`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub token_id: Uuid,
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Copies the token cookie into `Authorization: Bearer` when the request
/// has no bearer header of its own.
pub async fn authorization_from_cookie(mut req: Request, next: Next) -> Response {
    if bearer_token(req.headers()).is_none() {
        let cookies = CookieJar::from_headers(req.headers());
        let header_value = cookies
            .get(TOKEN_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|token| !token.is_empty())
            .and_then(|token| HeaderValue::from_str(&format!("Bearer {}", token)).ok());

        if let Some(value) = header_value {
            req.headers_mut().insert(header::AUTHORIZATION, value);
        }
    }

    next.run(req).await
}

pub async fn auth(mut req: Request, next: Next) -> Result<impl IntoResponse> {
    let app_state = req
        .extensions()
        .get::<Arc<AppState>>()
        .cloned()
        .ok_or(Error::InternalServerError)?;

    let token = bearer_token(req.headers()).ok_or(Error::Unauthorized)?;

    let (user, token_id) = app_state.auth_service.authenticate(&token).await?;

    req.extensions_mut()
        .insert(AuthenticatedUser { user, token_id });

    Ok(next.run(req).await)
}
