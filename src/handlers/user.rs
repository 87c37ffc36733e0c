use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    middleware::{auth, AuthenticatedUser},
    models::{
        query::UserListQuery,
        response::Response,
        users::{CreateUserDto, FilterUserDto, UpdateUserDto},
    },
    AppState, Error, Result,
};

use super::parse_id;

pub fn users_handler() -> Router {
    let public = Router::new()
        .route("/users", get(get_users).post(create_user))
        .route("/users/{id}", get(get_user))
        .route("/users/email/{email}", get(get_user_by_email))
        .route("/users/email/{email}/id/{id}", get(get_user_by_email_and_id));

    let protected = Router::new()
        .route(
            "/users/{id}",
            put(replace_user).patch(update_user).delete(delete_user),
        )
        .route_layer(middleware::from_fn(auth));

    public.merge(protected)
}

async fn get_users(
    Extension(app_state): Extension<Arc<AppState>>,
    Query(query): Query<UserListQuery>,
) -> Result<impl IntoResponse> {
    query.validate()?;

    let users = app_state.users_service.get_users(&query).await?;

    Ok(Json(users.map(|user| FilterUserDto::filter_user(&user))))
}

async fn get_user(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse> {
    let user_id = parse_id(&user_id, "User not found")?;
    let user = app_state.users_service.get_user(Some(user_id), None).await?;

    Ok(Json(FilterUserDto::filter_user(&user)))
}

async fn get_user_by_email(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<impl IntoResponse> {
    let user = app_state.users_service.get_user(None, Some(&email)).await?;

    Ok(Json(FilterUserDto::filter_user(&user)))
}

async fn get_user_by_email_and_id(
    Extension(app_state): Extension<Arc<AppState>>,
    Path((email, user_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let user_id = parse_id(&user_id, "User not found")?;
    let user = app_state
        .users_service
        .get_user(Some(user_id), Some(&email))
        .await?;

    Ok(Json(FilterUserDto::filter_user(&user)))
}

async fn create_user(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(new_user): Json<CreateUserDto>,
) -> Result<impl IntoResponse> {
    new_user.validate()?;

    let user = app_state.users_service.create_user(new_user).await?;

    Ok((StatusCode::CREATED, Json(FilterUserDto::filter_user(&user))))
}

async fn replace_user(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(current): Extension<AuthenticatedUser>,
    Path(user_id): Path<String>,
    Json(body): Json<CreateUserDto>,
) -> Result<impl IntoResponse> {
    let user_id = own_user_id(&current, &user_id)?;
    body.validate()?;

    let user = app_state
        .users_service
        .update_user(user_id, UpdateUserDto::from(body))
        .await?;

    Ok(Json(FilterUserDto::filter_user(&user)))
}

async fn update_user(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(current): Extension<AuthenticatedUser>,
    Path(user_id): Path<String>,
    Json(body): Json<UpdateUserDto>,
) -> Result<impl IntoResponse> {
    let user_id = own_user_id(&current, &user_id)?;
    body.validate()?;

    let user = app_state.users_service.update_user(user_id, body).await?;

    Ok(Json(FilterUserDto::filter_user(&user)))
}

async fn delete_user(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(current): Extension<AuthenticatedUser>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse> {
    let user_id = own_user_id(&current, &user_id)?;

    app_state.users_service.delete_user(user_id).await?;

    Ok(Json(Response::new("User deleted successfully")))
}

/// Users may only modify their own account.
fn own_user_id(current: &AuthenticatedUser, user_id: &str) -> Result<Uuid> {
    let user_id = parse_id(user_id, "User not found")?;
    if current.user.id != user_id {
        return Err(Error::Forbidden);
    }
    Ok(user_id)
}
