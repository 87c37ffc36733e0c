use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    models::{
        posts::{Post, PostChanges},
        query::Pagination,
    },
    Result,
};

use super::{filter::Filter, PostgresRepo};

const POST_COLUMNS: &str = "id, user_id, slug, title, content, image, created_at, updated_at";

#[async_trait]
pub trait PostsRepository: Sync + Send {
    async fn get_posts(&self, filter: &Filter, pagination: Pagination)
        -> Result<(Vec<Post>, i64)>;
    async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>>;
    async fn create_post(
        &self,
        user_id: Uuid,
        slug: &str,
        title: &str,
        content: &str,
        image: Option<&str>,
    ) -> Result<Post>;
    async fn update_post(&self, post_id: Uuid, changes: &PostChanges) -> Result<Option<Post>>;
    async fn delete_post(&self, post_id: Uuid) -> Result<bool>;
    /// Stored image paths of every post the user owns.
    async fn user_post_images(&self, user_id: Uuid) -> Result<Vec<String>>;
}

#[async_trait]
impl PostsRepository for PostgresRepo {
    #[instrument(skip(self, filter))]
    async fn get_posts(
        &self,
        filter: &Filter,
        pagination: Pagination,
    ) -> Result<(Vec<Post>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts");
        filter.push_where(&mut count);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {POST_COLUMNS} FROM posts"));
        filter.push_where(&mut qb);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(pagination.per_page)
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let posts = qb.build_query_as::<Post>().fetch_all(&self.pool).await?;
        Ok((posts, total))
    }

    async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    async fn create_post(
        &self,
        user_id: Uuid,
        slug: &str,
        title: &str,
        content: &str,
        image: Option<&str>,
    ) -> Result<Post> {
        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (id, user_id, slug, title, content, image)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(slug)
        .bind(title)
        .bind(content)
        .bind(image)
        .fetch_one(&self.pool)
        .await?;

        Ok(post)
    }

    async fn update_post(&self, post_id: Uuid, changes: &PostChanges) -> Result<Option<Post>> {
        let (set_image, image) = match &changes.image {
            Some(image) => (true, image.as_deref()),
            None => (false, None),
        };

        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            UPDATE posts
            SET slug = COALESCE($2, slug),
                title = COALESCE($3, title),
                content = COALESCE($4, content),
                image = CASE WHEN $5 THEN $6 ELSE image END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(post_id)
        .bind(changes.slug.as_deref())
        .bind(changes.title.as_deref())
        .bind(changes.content.as_deref())
        .bind(set_image)
        .bind(image)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    async fn delete_post(&self, post_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn user_post_images(&self, user_id: Uuid) -> Result<Vec<String>> {
        let images = sqlx::query_scalar::<_, String>(
            "SELECT image FROM posts WHERE user_id = $1 AND image IS NOT NULL",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(images)
    }
}
