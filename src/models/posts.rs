use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref NON_ALPHANUMERIC_RUN: Regex = Regex::new(r"[^A-Za-z0-9]+").unwrap();
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Text fields of `POST /posts` and `PUT /posts/{id}`.
#[derive(Validate, Debug, Default, Clone)]
pub struct CreatePostDto {
    #[validate(
        required(message = "The title field is required."),
        length(min = 1, max = 255, message = "The title must be between 1 and 255 characters.")
    )]
    pub title: Option<String>,
    #[validate(
        required(message = "The content field is required."),
        length(min = 1, message = "The content field is required.")
    )]
    pub content: Option<String>,
}

/// Text fields of `PATCH /posts/{id}`: validated only when sent.
#[derive(Validate, Debug, Default, Clone)]
pub struct UpdatePostDto {
    #[validate(length(min = 1, max = 255, message = "The title must be between 1 and 255 characters."))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "The content field must not be empty."))]
    pub content: Option<String>,
}

/// Column changes applied by a post update. `image: None` leaves the
/// stored image alone, `Some(None)` clears it.
#[derive(Debug, Default, Clone)]
pub struct PostChanges {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub image: Option<Option<String>>,
}

pub fn slugify(title: &str) -> String {
    NON_ALPHANUMERIC_RUN
        .replace_all(title, "-")
        .trim_matches('-')
        .to_lowercase()
}
