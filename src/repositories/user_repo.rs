use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    models::{query::Pagination, users::User},
    Result,
};

use super::{filter::Filter, PostgresRepo};

const USER_COLUMNS: &str =
    "id, name, email, password, email_verified_at, remember_token, created_at, updated_at";

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Looks a user up by id, by email, or by both at once.
    async fn get_user(&self, user_id: Option<Uuid>, email: Option<&str>) -> Result<Option<User>>;

    async fn list_users(&self, filter: &Filter, pagination: Pagination)
        -> Result<(Vec<User>, i64)>;

    async fn create_user(&self, name: &str, email: &str, password: &str) -> Result<User>;

    /// `None` fields keep their stored value.
    async fn update_user(
        &self,
        user_id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<Option<User>>;

    async fn delete_user(&self, user_id: Uuid) -> Result<bool>;
}

#[async_trait]
impl UserRepository for PostgresRepo {
    #[instrument(skip(self))]
    async fn get_user(&self, user_id: Option<Uuid>, email: Option<&str>) -> Result<Option<User>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users"));
        let filter = match (user_id, email) {
            (Some(user_id), None) => {
                tracing::debug!("Fetching user by ID: {}", user_id);
                Filter::new().where_eq("id", user_id)
            }
            (None, Some(email)) => {
                tracing::debug!("Fetching user by email: {}", email);
                Filter::new().where_eq("email", email)
            }
            (Some(user_id), Some(email)) => {
                tracing::debug!("Fetching user by email {} and ID {}", email, user_id);
                Filter::new().where_eq("email", email).where_eq("id", user_id)
            }
            (None, None) => {
                tracing::warn!("Invalid combination of parameters");
                return Ok(None);
            }
        };
        filter.push_where(&mut qb);

        let user = qb
            .build_query_as::<User>()
            .fetch_optional(&self.pool)
            .await?;

        tracing::info!(user_found = user.is_some(), "User query completed");

        Ok(user)
    }

    #[instrument(skip(self, filter))]
    async fn list_users(
        &self,
        filter: &Filter,
        pagination: Pagination,
    ) -> Result<(Vec<User>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        filter.push_where(&mut count);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users"));
        filter.push_where(&mut qb);
        qb.push(" ORDER BY created_at, id LIMIT ")
            .push_bind(pagination.per_page)
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        tracing::debug!("Executing query: {}", qb.sql());

        let users = qb.build_query_as::<User>().fetch_all(&self.pool).await?;

        Ok((users, total))
    }

    async fn create_user(&self, name: &str, email: &str, password: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, name, email, password)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(name)
        .bind(email)
        .bind(password)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_user(
        &self,
        user_id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                password = COALESCE($4, password),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(name)
        .bind(email)
        .bind(password)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
