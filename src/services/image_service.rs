use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use log::{info, warn};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;

/// A file received from a client, already read into memory.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Where the media store put an upload.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMedia {
    pub url: String,
    pub remote_id: String,
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Invalid image format: {0}")]
    InvalidImageFormat(String),
    #[error("File is too large: {size} bytes (limit {max} bytes)")]
    TooLarge { size: usize, max: usize },
    #[error("Media store error: {0}")]
    Storage(String),
    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::InvalidImageFormat(_) | MediaError::TooLarge { .. } => {
                ApiError::Validation(err.to_string())
            }
            MediaError::Storage(_) | MediaError::Environment(_) => {
                ApiError::Upstream(err.to_string())
            }
        }
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, upload: MediaUpload, folder: &str) -> Result<StoredMedia, MediaError>;
    async fn destroy(&self, remote_id: &str) -> Result<(), MediaError>;
}

pub fn file_extension(content_type: &str) -> Result<&'static str, MediaError> {
    match content_type {
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/png" => Ok("png"),
        "image/gif" => Ok("gif"),
        "image/webp" => Ok("webp"),
        _ => Err(MediaError::InvalidImageFormat(format!(
            "Unsupported file type: {}",
            content_type
        ))),
    }
}

/// Accepts only images no bigger than `max_bytes`.
pub fn validate_image(upload: &MediaUpload, max_bytes: usize) -> Result<(), MediaError> {
    file_extension(&upload.content_type)?;
    if upload.bytes.is_empty() {
        return Err(MediaError::InvalidImageFormat("File is empty".to_string()));
    }
    if upload.bytes.len() > max_bytes {
        return Err(MediaError::TooLarge {
            size: upload.bytes.len(),
            max: max_bytes,
        });
    }
    Ok(())
}

/// Best-effort delete. A failure is logged and never propagated.
pub async fn release_quietly(media: &dyn MediaStore, remote_id: &str) {
    if let Err(err) = media.destroy(remote_id).await {
        warn!("Failed to release media {}: {}", remote_id, err);
    }
}

pub struct GcsMediaStore {
    client: Client,
    bucket_name: String,
}

impl GcsMediaStore {
    pub async fn new(bucket_name: String) -> Result<Self, MediaError> {
        if bucket_name.trim().is_empty() {
            return Err(MediaError::Environment("MEDIA_BUCKET not set".to_string()));
        }

        let config = ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| MediaError::Storage(format!("Failed to create GCS client: {}", e)))?;

        Ok(Self {
            client: Client::new(config),
            bucket_name,
        })
    }
}

#[async_trait]
impl MediaStore for GcsMediaStore {
    async fn upload(&self, upload: MediaUpload, folder: &str) -> Result<StoredMedia, MediaError> {
        let file_extension = file_extension(&upload.content_type)?;
        let timestamp = chrono::Utc::now().timestamp();
        let object_name = format!(
            "{}/{}-{}.{}",
            folder,
            timestamp,
            Uuid::new_v4(),
            file_extension
        );

        let mut media = Media::new(object_name.clone());
        media.content_type = upload.content_type.clone().into();
        let upload_type = UploadType::Simple(media);
        let upload_request = UploadObjectRequest {
            bucket: self.bucket_name.clone(),
            ..Default::default()
        };

        self.client
            .upload_object(&upload_request, upload.bytes, &upload_type)
            .await
            .map_err(|e| MediaError::Storage(format!("Failed to upload to GCS: {}", e)))?;

        info!("Uploaded {} as {}", upload.file_name, object_name);

        Ok(StoredMedia {
            url: format!(
                "https://storage.googleapis.com/{}/{}",
                self.bucket_name, object_name
            ),
            remote_id: object_name,
        })
    }

    async fn destroy(&self, remote_id: &str) -> Result<(), MediaError> {
        let request = DeleteObjectRequest {
            bucket: self.bucket_name.clone(),
            object: remote_id.to_string(),
            ..Default::default()
        };
        self.client
            .delete_object(&request)
            .await
            .map_err(|e| MediaError::Storage(format!("Failed to delete from GCS: {}", e)))
    }
}

/// Keeps objects in memory. Failures can be switched on to exercise the
/// error paths of callers.
#[derive(Default)]
pub struct MemoryMediaStore {
    objects: Mutex<HashMap<String, usize>>,
    fail_uploads: AtomicBool,
    fail_destroys: AtomicBool,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_destroys(&self, fail: bool) {
        self.fail_destroys.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, remote_id: &str) -> bool {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(remote_id)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn upload(&self, upload: MediaUpload, folder: &str) -> Result<StoredMedia, MediaError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(MediaError::Storage("upload rejected".to_string()));
        }
        let remote_id = format!(
            "{}/{}.{}",
            folder,
            Uuid::new_v4(),
            file_extension(&upload.content_type)?
        );
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(remote_id.clone(), upload.bytes.len());
        Ok(StoredMedia {
            url: format!("memory://{}", remote_id),
            remote_id,
        })
    }

    async fn destroy(&self, remote_id: &str) -> Result<(), MediaError> {
        if self.fail_destroys.load(Ordering::SeqCst) {
            return Err(MediaError::Storage("destroy rejected".to_string()));
        }
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(remote_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(content_type: &str, size: usize) -> MediaUpload {
        MediaUpload {
            file_name: "photo".into(),
            content_type: content_type.into(),
            bytes: vec![0u8; size],
        }
    }

    #[test]
    fn only_images_under_the_ceiling_pass() {
        assert!(validate_image(&upload("image/png", 10), 100).is_ok());
        assert!(matches!(
            validate_image(&upload("application/pdf", 10), 100),
            Err(MediaError::InvalidImageFormat(_))
        ));
        assert!(matches!(
            validate_image(&upload("image/jpeg", 101), 100),
            Err(MediaError::TooLarge { size: 101, max: 100 })
        ));
        assert!(validate_image(&upload("image/jpeg", 0), 100).is_err());
    }

    #[test]
    fn upstream_failures_map_to_server_errors() {
        assert!(matches!(
            ApiError::from(MediaError::Storage("down".into())),
            ApiError::Upstream(_)
        ));
        assert!(matches!(
            ApiError::from(MediaError::TooLarge { size: 2, max: 1 }),
            ApiError::Validation(_)
        ));
    }

    #[actix_rt::test]
    async fn release_quietly_swallows_failures() {
        let store = MemoryMediaStore::new();
        let stored = store.upload(upload("image/png", 3), "p1").await.unwrap();
        store.fail_destroys(true);
        release_quietly(&store, &stored.remote_id).await;
        assert!(store.contains(&stored.remote_id));

        store.fail_destroys(false);
        release_quietly(&store, &stored.remote_id).await;
        assert!(store.is_empty());
    }
}
