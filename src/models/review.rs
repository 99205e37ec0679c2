use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

const MAX_COMMENT_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReply {
    pub text: String,
    pub replied_by: String,
    pub replied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: String,
    pub property: String,
    pub user: String,
    pub booking: String,
    pub rating: u8,
    pub comment: String,
    pub reply: Option<ReviewReply>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub booking: String,
    pub rating: u8,
    pub comment: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewPatch {
    pub rating: Option<u8>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyRequest {
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewQuery {
    pub property: Option<String>,
    pub user: Option<String>,
}

pub fn validate_rating(rating: u8) -> Result<(), ApiError> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(ApiError::validation("Rating must be between 1 and 5"))
    }
}

/// Shared by review comments and replies.
pub fn validate_text(field: &str, text: &str) -> Result<(), ApiError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ApiError::validation(format!("{} is required", field)));
    }
    if text.chars().count() > MAX_COMMENT_LEN {
        return Err(ApiError::validation(format!(
            "{} cannot exceed {} characters",
            field, MAX_COMMENT_LEN
        )));
    }
    Ok(())
}
