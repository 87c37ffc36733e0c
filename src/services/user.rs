use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::{
    models::{
        query::{Paginated, UserListQuery},
        users::{CreateUserDto, UpdateUserDto, User},
    },
    repositories::{posts_repo::PostsRepository, user_repo::UserRepository},
    Error, Result,
};

use super::{auth::hash_password, uploads::ImageStore};

#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    posts_repo: Arc<dyn PostsRepository>,
    images: ImageStore,
}

impl UserService {
    pub fn new(
        repo: Arc<dyn UserRepository>,
        posts_repo: Arc<dyn PostsRepository>,
        images: ImageStore,
    ) -> Self {
        Self {
            repo,
            posts_repo,
            images,
        }
    }

    pub async fn get_users(&self, query: &UserListQuery) -> Result<Paginated<User>> {
        let filter = query.to_filter()?;
        let pagination = query.pagination();
        let (users, total) = self.repo.list_users(&filter, pagination).await?;
        Ok(Paginated::new(users, total, pagination))
    }

    pub async fn get_user(&self, user_id: Option<Uuid>, email: Option<&str>) -> Result<User> {
        let user = self.repo.get_user(user_id, email).await?;
        user.ok_or(Error::NotFound("User not found"))
    }

    pub async fn create_user(&self, new_user: CreateUserDto) -> Result<User> {
        if self
            .repo
            .get_user(None, Some(&new_user.email))
            .await?
            .is_some()
        {
            return Err(Error::Conflict("Email already exists"));
        }

        let password_hash = hash_password(&new_user.password)?;
        let user = self
            .repo
            .create_user(&new_user.name, &new_user.email, &password_hash)
            .await?;

        info!(user_id = %user.id, "User created");
        Ok(user)
    }

    pub async fn update_user(&self, user_id: Uuid, changes: UpdateUserDto) -> Result<User> {
        if let Some(email) = changes.email.as_deref() {
            let taken = self.repo.get_user(None, Some(email)).await?;
            if taken.is_some_and(|other| other.id != user_id) {
                return Err(Error::Conflict("Email already exists"));
            }
        }

        let password_hash = changes
            .password
            .as_deref()
            .map(hash_password)
            .transpose()?;

        self.repo
            .update_user(
                user_id,
                changes.name.as_deref(),
                changes.email.as_deref(),
                password_hash.as_deref(),
            )
            .await?
            .ok_or(Error::NotFound("User not found"))
    }

    /// Deletes the user. Their posts go with them, so the images those
    /// posts stored are removed too.
    pub async fn delete_user(&self, user_id: Uuid) -> Result<()> {
        let images = self.posts_repo.user_post_images(user_id).await?;

        if !self.repo.delete_user(user_id).await? {
            return Err(Error::NotFound("User not found"));
        }
        for image in &images {
            self.images.delete(image).await?;
        }

        info!(user_id = %user_id, images = images.len(), "User deleted");
        Ok(())
    }
}
