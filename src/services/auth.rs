use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    models::users::User,
    repositories::{token_repo::TokenRepository, user_repo::UserRepository},
    Error, Result,
};

#[derive(Clone)]
pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    token_repo: Arc<dyn TokenRepository>,
    jwt_secret: String,
    jwt_maxage: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub jti: String,
    pub iat: usize,
    pub exp: usize,
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string();
    Ok(password_hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash).map_err(|_| Error::InternalServerError)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        token_repo: Arc<dyn TokenRepository>,
        jwt_secret: String,
        jwt_maxage: i64,
    ) -> Self {
        Self {
            user_repo,
            token_repo,
            jwt_secret,
            jwt_maxage,
        }
    }

    /// Checks the credentials and mints a new bearer token for the user.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, String)> {
        let user = self
            .user_repo
            .get_user(None, Some(email))
            .await?
            .ok_or(Error::InvalidCredentials)?;

        if !verify_password(password, &user.password)? {
            debug!(user_id = %user.id, "Rejected login with wrong password");
            return Err(Error::InvalidCredentials);
        }

        let token_id = Uuid::now_v7();
        let expires_at = Utc::now() + Duration::minutes(self.jwt_maxage);
        self.token_repo
            .create_token(
                token_id,
                user.id,
                &format!("api_token_for_user_{}", user.id),
                expires_at,
            )
            .await?;

        let token = self.generate_token(user.id, token_id)?;
        info!(user_id = %user.id, "User logged in");

        Ok((user, token))
    }

    /// Revokes the token so it no longer authenticates.
    pub async fn logout(&self, token_id: Uuid) -> Result<()> {
        self.token_repo.delete_token(token_id).await?;
        Ok(())
    }

    /// Resolves a bearer token to its user and access token id.
    pub async fn authenticate(&self, token: &str) -> Result<(User, Uuid)> {
        let claims = self.decode_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| Error::Unauthorized)?;
        let token_id = Uuid::parse_str(&claims.jti).map_err(|_| Error::Unauthorized)?;

        let access_token = self
            .token_repo
            .find_token(token_id)
            .await?
            .filter(|t| t.user_id == user_id && !t.is_expired())
            .ok_or(Error::Unauthorized)?;

        let user = self
            .user_repo
            .get_user(Some(user_id), None)
            .await?
            .ok_or(Error::Unauthorized)?;

        Ok((user, access_token.id))
    }

    fn generate_token(&self, user_id: Uuid, token_id: Uuid) -> Result<String> {
        let now = Utc::now();
        let exp = (now + Duration::minutes(self.jwt_maxage)).timestamp() as usize;
        let iat = now.timestamp() as usize;
        let claims = Claims {
            sub: user_id.to_string(),
            jti: token_id.to_string(),
            iat,
            exp,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|_| Error::InternalServerError)
    }

    pub fn decode_token<T: AsRef<str>>(&self, token: T) -> Result<Claims> {
        let decoded = decode::<Claims>(
            token.as_ref(),
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|_| Error::Unauthorized)?;

        Ok(decoded.claims)
    }
}
