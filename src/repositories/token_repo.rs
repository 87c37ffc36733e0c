use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{models::tokens::AccessToken, Result};

use super::PostgresRepo;

#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn create_token(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        name: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<AccessToken>;
    async fn find_token(&self, token_id: Uuid) -> Result<Option<AccessToken>>;
    async fn delete_token(&self, token_id: Uuid) -> Result<bool>;
}

#[async_trait]
impl TokenRepository for PostgresRepo {
    async fn create_token(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        name: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<AccessToken> {
        let token = sqlx::query_as::<_, AccessToken>(
            r#"
            INSERT INTO access_tokens (id, user_id, name, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, name, expires_at, created_at
            "#,
        )
        .bind(token_id)
        .bind(user_id)
        .bind(name)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(token)
    }

    async fn find_token(&self, token_id: Uuid) -> Result<Option<AccessToken>> {
        let token = sqlx::query_as::<_, AccessToken>(
            r#"
            SELECT id, user_id, name, expires_at, created_at
            FROM access_tokens
            WHERE id = $1
            "#,
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    async fn delete_token(&self, token_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
