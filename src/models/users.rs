use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub remember_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateUserDto {
    #[validate(length(min = 1, max = 255, message = "The name field is required and must not exceed 255 characters."))]
    pub name: String,
    #[validate(
        length(max = 255, message = "The email must not exceed 255 characters."),
        email(message = "The email must be a valid email address.")
    )]
    pub email: String,
    #[validate(length(min = 6, message = "The password must be at least 6 characters."))]
    pub password: String,
}

/// Body of `PATCH /users/{id}`; absent fields stay untouched.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateUserDto {
    #[validate(length(min = 1, max = 255, message = "The name must be between 1 and 255 characters."))]
    pub name: Option<String>,
    #[validate(
        length(max = 255, message = "The email must not exceed 255 characters."),
        email(message = "The email must be a valid email address.")
    )]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "The password must be at least 6 characters."))]
    pub password: Option<String>,
}

impl From<CreateUserDto> for UpdateUserDto {
    fn from(dto: CreateUserDto) -> Self {
        Self {
            name: Some(dto.name),
            email: Some(dto.email),
            password: Some(dto.password),
        }
    }
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginUserDto {
    #[validate(
        length(min = 1, message = "The email field is required."),
        email(message = "The email must be a valid email address.")
    )]
    pub email: String,
    #[validate(length(min = 1, message = "The password field is required."))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FilterUserDto {
    pub id: String,
    pub name: String,
    pub email: String,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FilterUserDto {
    pub fn filter_user(user: &User) -> Self {
        FilterUserDto {
            id: user.id.to_string(),
            name: user.name.to_owned(),
            email: user.email.to_owned(),
            email_verified_at: user.email_verified_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserLoginResponseDto {
    pub user: FilterUserDto,
    pub message: String,
    pub token: String,
}
