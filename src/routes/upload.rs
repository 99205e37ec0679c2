use actix_multipart::Multipart;
use futures::StreamExt;

use crate::error::ApiError;
use crate::services::image_service::{MediaError, MediaUpload};

/// Reads the file sent under `field_name`, refusing to buffer more than
/// `max_bytes`. Other fields are drained and ignored.
pub async fn read_file(
    mut payload: Multipart,
    field_name: &str,
    max_bytes: usize,
) -> Result<MediaUpload, ApiError> {
    while let Some(item) = payload.next().await {
        let mut field = item?;
        let disposition = field.content_disposition().cloned();
        let name = disposition.as_ref().and_then(|cd| cd.get_name());

        if name != Some(field_name) {
            while let Some(chunk) = field.next().await {
                chunk?;
            }
            continue;
        }

        let file_name = disposition
            .as_ref()
            .and_then(|cd| cd.get_filename())
            .unwrap_or(field_name)
            .to_string();
        let content_type = field
            .content_type()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_default();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            if bytes.len() + chunk.len() > max_bytes {
                return Err(MediaError::TooLarge {
                    size: bytes.len() + chunk.len(),
                    max: max_bytes,
                }
                .into());
            }
            bytes.extend_from_slice(&chunk);
        }

        return Ok(MediaUpload {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(ApiError::Validation(format!(
        "Please upload a file in the '{}' field",
        field_name
    )))
}
