use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    middleware::{auth, AuthenticatedUser},
    models::{
        posts::{CreatePostDto, UpdatePostDto},
        query::PostListQuery,
        response::Response,
    },
    services::{
        posts::{ImageUpdate, PostUpdate},
        uploads::{ImageStore, UploadedImage},
    },
    AppState, Error, Result,
};

use super::parse_id;

pub fn posts_handler() -> Router {
    let public = Router::new()
        .route("/posts", get(get_posts))
        .route("/posts/{id}", get(get_post));

    let protected = Router::new()
        .route("/posts", post(create_post))
        .route(
            "/posts/{id}",
            put(replace_post).patch(update_post).delete(delete_post),
        )
        .route_layer(middleware::from_fn(auth));

    public.merge(protected)
}

/// Fields of a post form. `image` is `Keep` when the form has no image
/// part at all.
#[derive(Debug, Default)]
struct PostForm {
    title: Option<String>,
    content: Option<String>,
    image: ImageUpdate,
}

async fn read_post_form(mut multipart: Multipart) -> Result<PostForm> {
    let mut form = PostForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.title = Some(field.text().await?),
            "content" => form.content = Some(field.text().await?),
            "image" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|n| !n.is_empty());
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;

                form.image = match file_name {
                    Some(file_name) => ImageUpdate::Replace(UploadedImage {
                        file_name,
                        content_type,
                        bytes,
                    }),
                    None if bytes.is_empty() || &bytes[..] == b"null" => ImageUpdate::Remove,
                    None => {
                        let mut errors = ValidationErrors::new();
                        errors.add(
                            "image",
                            ValidationError::new("image")
                                .with_message("The image must be an image.".into()),
                        );
                        return Err(Error::Validation(errors));
                    }
                };
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Validates the text fields and an uploaded image together, so one
/// response lists every invalid field.
fn validate_form(body: &impl Validate, image: &ImageUpdate, images: &ImageStore) -> Result<()> {
    let mut errors = body.validate().err().unwrap_or_else(ValidationErrors::new);
    if let ImageUpdate::Replace(upload) = image {
        images.check(upload, &mut errors);
    }

    if errors.errors().is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}

async fn get_posts(
    Extension(app_state): Extension<Arc<AppState>>,
    Query(query): Query<PostListQuery>,
) -> Result<impl IntoResponse> {
    let posts = app_state.posts_service.get_posts(&query).await?;
    Ok(Json(posts))
}

async fn get_post(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(post_id): Path<String>,
) -> Result<impl IntoResponse> {
    let post_id = parse_id(&post_id, "Post not found")?;
    let post = app_state.posts_service.get_post(post_id).await?;
    Ok(Json(post))
}

async fn create_post(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(current): Extension<AuthenticatedUser>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let form = read_post_form(multipart).await?;
    let body = CreatePostDto {
        title: form.title,
        content: form.content,
    };
    validate_form(&body, &form.image, app_state.posts_service.images())?;

    let image = match form.image {
        ImageUpdate::Replace(image) => Some(image),
        ImageUpdate::Keep | ImageUpdate::Remove => None,
    };

    let post = app_state
        .posts_service
        .create_post(
            &current.user,
            body.title.as_deref().unwrap_or_default(),
            body.content.as_deref().unwrap_or_default(),
            image,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

async fn replace_post(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(current): Extension<AuthenticatedUser>,
    Path(post_id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let post_id = parse_id(&post_id, "Post not found")?;
    let form = read_post_form(multipart).await?;
    let body = CreatePostDto {
        title: form.title,
        content: form.content,
    };
    validate_form(&body, &form.image, app_state.posts_service.images())?;

    // A full update without an uploaded file drops the image.
    let image = match form.image {
        ImageUpdate::Replace(image) => ImageUpdate::Replace(image),
        ImageUpdate::Keep | ImageUpdate::Remove => ImageUpdate::Remove,
    };

    let post = app_state
        .posts_service
        .update_post(
            &current.user,
            post_id,
            PostUpdate {
                title: body.title,
                content: body.content,
                image,
            },
        )
        .await?;

    Ok(Json(post))
}

async fn update_post(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(current): Extension<AuthenticatedUser>,
    Path(post_id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let post_id = parse_id(&post_id, "Post not found")?;
    let form = read_post_form(multipart).await?;
    let body = UpdatePostDto {
        title: form.title,
        content: form.content,
    };
    validate_form(&body, &form.image, app_state.posts_service.images())?;

    let post = app_state
        .posts_service
        .update_post(
            &current.user,
            post_id,
            PostUpdate {
                title: body.title,
                content: body.content,
                image: form.image,
            },
        )
        .await?;

    Ok(Json(post))
}

async fn delete_post(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(current): Extension<AuthenticatedUser>,
    Path(post_id): Path<String>,
) -> Result<impl IntoResponse> {
    let post_id = parse_id(&post_id, "Post not found")?;

    app_state
        .posts_service
        .delete_post(&current.user, post_id)
        .await?;

    Ok(Json(Response::new("Post deleted successfully")))
}
