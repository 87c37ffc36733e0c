use std::path::{Component, Path, PathBuf};

use axum::body::Bytes;
use image::ImageFormat;
use tracing::{debug, warn};
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::{Error, Result};

pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpeg", "png", "jpg", "gif", "svg"];
const UPLOADS: &str = "uploads";

/// A file part received from a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: usize,
    pub extension: String,
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    max_bytes: usize,
}

fn image_error(errors: &mut ValidationErrors, code: &'static str, message: String) {
    errors.add("image", ValidationError::new(code).with_message(message.into()));
}

fn is_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    String::from_utf8_lossy(head).to_ascii_lowercase().contains("<svg")
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>, max_kb: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes: max_kb * 1024,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Checks extension, size and that the content really is an image.
    pub fn validate(&self, image: &UploadedImage) -> Result<ImageInfo> {
        let mut errors = ValidationErrors::new();
        self.check(image, &mut errors).ok_or(Error::Validation(errors))
    }

    /// Like [`ImageStore::validate`], but records failures under the
    /// `image` field of an existing error set.
    pub fn check(&self, image: &UploadedImage, errors: &mut ValidationErrors) -> Option<ImageInfo> {
        let Some(extension) = Path::new(&image.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
        else {
            image_error(
                errors,
                "mimes",
                format!(
                    "The image must be a file of type: {}.",
                    ALLOWED_EXTENSIONS.join(", ")
                ),
            );
            return None;
        };

        if image.bytes.len() > self.max_bytes {
            image_error(
                errors,
                "max",
                format!(
                    "The image must not be greater than {} kilobytes.",
                    self.max_bytes / 1024
                ),
            );
            return None;
        }

        let mime_type = if extension == "svg" {
            is_svg(&image.bytes).then(|| "image/svg+xml".to_string())
        } else {
            image::guess_format(&image.bytes)
                .ok()
                .filter(|f| matches!(f, ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif))
                .map(|f| f.to_mime_type().to_string())
        };
        let Some(mime_type) = mime_type else {
            image_error(errors, "image", "The image must be an image.".to_string());
            return None;
        };

        Some(ImageInfo {
            original_name: image.file_name.clone(),
            mime_type,
            size_bytes: image.bytes.len(),
            extension,
        })
    }

    /// Writes the image under `uploads/` and returns its path relative to
    /// the store root.
    pub async fn store(&self, image: &UploadedImage, info: &ImageInfo) -> Result<String> {
        let relative = format!("{}/{}.{}", UPLOADS, Uuid::now_v7(), info.extension);
        let target = self.root.join(&relative);

        tokio::fs::create_dir_all(self.root.join(UPLOADS)).await?;
        tokio::fs::write(&target, &image.bytes).await?;

        debug!(
            path = %relative,
            original = %info.original_name,
            mime = %info.mime_type,
            declared = ?image.content_type,
            size = info.size_bytes,
            "Stored uploaded image"
        );
        Ok(relative)
    }

    /// Removes a previously stored image. Missing files are ignored.
    pub async fn delete(&self, relative: &str) -> Result<()> {
        let path = Path::new(relative);
        let inside_uploads = path.starts_with(UPLOADS)
            && path.components().all(|c| matches!(c, Component::Normal(_)));
        if !inside_uploads {
            warn!(path = %relative, "Refusing to delete file outside the upload directory");
            return Ok(());
        }

        match tokio::fs::remove_file(self.root.join(path)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
