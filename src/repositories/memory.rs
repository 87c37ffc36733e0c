//! In-memory repositories backing the HTTP tests. Filters are not
//! evaluated here; they are covered by their SQL rendering tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    models::{
        posts::{Post, PostChanges},
        query::Pagination,
        tokens::AccessToken,
        users::User,
    },
    Error, Result,
};

use super::{
    filter::Filter, posts_repo::PostsRepository, token_repo::TokenRepository,
    user_repo::UserRepository,
};

#[derive(Default)]
pub struct MemoryRepo {
    users: RwLock<Vec<User>>,
    posts: RwLock<Vec<Post>>,
    tokens: RwLock<Vec<AccessToken>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn token_count(&self) -> usize {
        self.tokens.read().await.len()
    }
}

fn page<T: Clone>(items: &[T], pagination: Pagination) -> Vec<T> {
    items
        .iter()
        .skip(pagination.offset() as usize)
        .take(pagination.per_page as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl UserRepository for MemoryRepo {
    async fn get_user(&self, user_id: Option<Uuid>, email: Option<&str>) -> Result<Option<User>> {
        if user_id.is_none() && email.is_none() {
            return Ok(None);
        }
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|u| {
                user_id.map_or(true, |id| u.id == id) && email.map_or(true, |e| u.email == e)
            })
            .cloned())
    }

    async fn list_users(
        &self,
        _filter: &Filter,
        pagination: Pagination,
    ) -> Result<(Vec<User>, i64)> {
        let users = self.users.read().await;
        Ok((page(&users, pagination), users.len() as i64))
    }

    async fn create_user(&self, name: &str, email: &str, password: &str) -> Result<User> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == email) {
            return Err(Error::Conflict("Email already exists"));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::now_v7(),
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            email_verified_at: None,
            remember_token: None,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn update_user(
        &self,
        user_id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<Option<User>> {
        let mut users = self.users.write().await;
        if let Some(email) = email {
            if users.iter().any(|u| u.email == email && u.id != user_id) {
                return Err(Error::Conflict("Email already exists"));
            }
        }
        let Some(user) = users.iter_mut().find(|u| u.id == user_id) else {
            return Ok(None);
        };
        if let Some(name) = name {
            user.name = name.to_string();
        }
        if let Some(email) = email {
            user.email = email.to_string();
        }
        if let Some(password) = password {
            user.password = password.to_string();
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|u| u.id != user_id);
        let deleted = users.len() != before;
        if deleted {
            self.posts.write().await.retain(|p| p.user_id != user_id);
            self.tokens.write().await.retain(|t| t.user_id != user_id);
        }
        Ok(deleted)
    }
}

#[async_trait]
impl PostsRepository for MemoryRepo {
    async fn get_posts(
        &self,
        _filter: &Filter,
        pagination: Pagination,
    ) -> Result<(Vec<Post>, i64)> {
        let posts = self.posts.read().await;
        Ok((page(&posts, pagination), posts.len() as i64))
    }

    async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        let posts = self.posts.read().await;
        Ok(posts.iter().find(|p| p.id == post_id).cloned())
    }

    async fn create_post(
        &self,
        user_id: Uuid,
        slug: &str,
        title: &str,
        content: &str,
        image: Option<&str>,
    ) -> Result<Post> {
        let now = Utc::now();
        let post = Post {
            id: Uuid::now_v7(),
            user_id,
            slug: slug.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            image: image.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        self.posts.write().await.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, post_id: Uuid, changes: &PostChanges) -> Result<Option<Post>> {
        let mut posts = self.posts.write().await;
        let Some(post) = posts.iter_mut().find(|p| p.id == post_id) else {
            return Ok(None);
        };
        if let Some(slug) = &changes.slug {
            post.slug = slug.clone();
        }
        if let Some(title) = &changes.title {
            post.title = title.clone();
        }
        if let Some(content) = &changes.content {
            post.content = content.clone();
        }
        if let Some(image) = &changes.image {
            post.image = image.clone();
        }
        post.updated_at = Utc::now();
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, post_id: Uuid) -> Result<bool> {
        let mut posts = self.posts.write().await;
        let before = posts.len();
        posts.retain(|p| p.id != post_id);
        Ok(posts.len() != before)
    }

    async fn user_post_images(&self, user_id: Uuid) -> Result<Vec<String>> {
        let posts = self.posts.read().await;
        Ok(posts
            .iter()
            .filter(|p| p.user_id == user_id)
            .filter_map(|p| p.image.clone())
            .collect())
    }
}

#[async_trait]
impl TokenRepository for MemoryRepo {
    async fn create_token(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        name: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<AccessToken> {
        let token = AccessToken {
            id: token_id,
            user_id,
            name: name.to_string(),
            expires_at,
            created_at: Utc::now(),
        };
        self.tokens.write().await.push(token.clone());
        Ok(token)
    }

    async fn find_token(&self, token_id: Uuid) -> Result<Option<AccessToken>> {
        let tokens = self.tokens.read().await;
        Ok(tokens.iter().find(|t| t.id == token_id).cloned())
    }

    async fn delete_token(&self, token_id: Uuid) -> Result<bool> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|t| t.id != token_id);
        Ok(tokens.len() != before)
    }
}
