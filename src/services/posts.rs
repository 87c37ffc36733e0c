use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::{
    models::{
        posts::{slugify, Post, PostChanges},
        query::{Paginated, PostListQuery},
        users::User,
    },
    repositories::posts_repo::PostsRepository,
    Error, Result,
};

use super::uploads::{ImageStore, UploadedImage};

/// What an update does with the post's image.
#[derive(Debug, Clone, Default)]
pub enum ImageUpdate {
    #[default]
    Keep,
    Remove,
    Replace(UploadedImage),
}

#[derive(Debug, Clone, Default)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image: ImageUpdate,
}

#[derive(Clone)]
pub struct PostsService {
    repo: Arc<dyn PostsRepository>,
    images: ImageStore,
}

impl PostsService {
    pub fn new(repo: Arc<dyn PostsRepository>, images: ImageStore) -> Self {
        Self { repo, images }
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub async fn get_posts(&self, query: &PostListQuery) -> Result<Paginated<Post>> {
        let pagination = query.pagination();
        let (posts, total) = self.repo.get_posts(&query.to_filter(), pagination).await?;
        Ok(Paginated::new(posts, total, pagination))
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<Post> {
        self.repo
            .get_post(post_id)
            .await?
            .ok_or(Error::NotFound("Post not found"))
    }

    pub async fn create_post(
        &self,
        author: &User,
        title: &str,
        content: &str,
        image: Option<UploadedImage>,
    ) -> Result<Post> {
        let image_path = match image {
            Some(image) => Some(self.save_image(&image).await?),
            None => None,
        };

        let post = self
            .repo
            .create_post(author.id, &slugify(title), title, content, image_path.as_deref())
            .await?;

        info!(post_id = %post.id, user_id = %author.id, slug = %post.slug, "Post created");
        Ok(post)
    }

    /// Applies a full or partial update. The slug follows the title only
    /// when a new title is given.
    pub async fn update_post(&self, author: &User, post_id: Uuid, update: PostUpdate) -> Result<Post> {
        let existing = self.owned_post(author, post_id).await?;

        let mut changes = PostChanges {
            slug: update.title.as_deref().map(slugify),
            title: update.title,
            content: update.content,
            image: None,
        };

        match &update.image {
            ImageUpdate::Keep => {}
            ImageUpdate::Remove => changes.image = Some(None),
            ImageUpdate::Replace(image) => {
                changes.image = Some(Some(self.save_image(image).await?));
            }
        }

        let post = match self.repo.update_post(post_id, &changes).await {
            Ok(Some(post)) => post,
            outcome => {
                if let Some(Some(stored)) = &changes.image {
                    self.images.delete(stored).await?;
                }
                return Err(outcome.err().unwrap_or(Error::NotFound("Post not found")));
            }
        };

        if changes.image.is_some() {
            if let Some(old) = existing.image.as_deref() {
                self.images.delete(old).await?;
            }
        }

        Ok(post)
    }

    pub async fn delete_post(&self, author: &User, post_id: Uuid) -> Result<()> {
        let existing = self.owned_post(author, post_id).await?;

        if !self.repo.delete_post(post_id).await? {
            return Err(Error::NotFound("Post not found"));
        }
        if let Some(image) = existing.image.as_deref() {
            self.images.delete(image).await?;
        }

        info!(post_id = %post_id, "Post deleted");
        Ok(())
    }

    async fn owned_post(&self, author: &User, post_id: Uuid) -> Result<Post> {
        let post = self.get_post(post_id).await?;
        if post.user_id != author.id {
            return Err(Error::Forbidden);
        }
        Ok(post)
    }

    async fn save_image(&self, image: &UploadedImage) -> Result<String> {
        let info = self.images.validate(image)?;
        self.images.store(image, &info).await
    }
}
