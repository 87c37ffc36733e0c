use std::collections::BTreeMap;

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;
use validator::ValidationErrors;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    NotFound(&'static str),
    Unauthorized,
    InvalidCredentials,
    Forbidden,
    BadRequest(String),
    PayloadTooLarge,
    Conflict(&'static str),
    Validation(ValidationErrors),
    InternalServerError,
    DatabaseError(sqlx::Error),
    InvalidHashFormat(argon2::password_hash::Error),
    Io(std::io::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if let Self::Validation(errors) = self {
            let body = Json(json!({
                "error": "Validation failed",
                "errors": field_messages(&errors),
            }));
            return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
        }

        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.to_string()),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthenticated".to_string()),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "The provided credentials are incorrect.".to_string(),
            ),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.to_string()),
            Self::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "The request body is too large.".to_string(),
            ),
            Self::InternalServerError | Self::Validation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
            Self::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            Self::InvalidHashFormat(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Invalid hash format".to_string(),
            ),
            Self::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Storage error".to_string(),
            ),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

fn field_messages(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("The {} field is invalid.", field))
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return Self::Conflict("Email already exists");
            }
        }
        error!("Database error: {:?}", err);
        Self::DatabaseError(err)
    }
}

impl From<argon2::password_hash::Error> for Error {
    fn from(err: argon2::password_hash::Error) -> Self {
        error!("Invalid hash format");
        Self::InvalidHashFormat(err)
    }
}

impl From<ValidationErrors> for Error {
    fn from(err: ValidationErrors) -> Self {
        Self::Validation(err)
    }
}

impl From<MultipartError> for Error {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::PayloadTooLarge;
        }
        Self::BadRequest(err.body_text())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        error!("Storage error: {:?}", err);
        Self::Io(err)
    }
}
