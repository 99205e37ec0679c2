use std::sync::Arc;

use chrono::Utc;
use log::info;

use crate::db::store::PropertyStore;
use crate::error::ApiError;
use crate::middleware::auth_context::Identity;
use crate::models::new_id;
use crate::models::property::{
    NewProperty, Property, PropertyPatch, PropertyQuery, Rating, MAX_PAGE,
};
use crate::services::image_service::{release_quietly, validate_image, MediaStore, MediaUpload};

#[derive(Clone)]
pub struct PropertyRegistry {
    properties: Arc<dyn PropertyStore>,
    media: Arc<dyn MediaStore>,
    max_upload_bytes: usize,
}

impl PropertyRegistry {
    pub fn new(
        properties: Arc<dyn PropertyStore>,
        media: Arc<dyn MediaStore>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            properties,
            media,
            max_upload_bytes,
        }
    }

    pub async fn get(&self, id: &str) -> Result<Property, ApiError> {
        self.properties
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Property"))
    }

    async fn get_managed(&self, id: &str, actor: &Identity) -> Result<Property, ApiError> {
        let property = self.get(id).await?;
        if !actor.can_manage(&property.created_by) {
            return Err(ApiError::forbidden("Not authorized to modify this property"));
        }
        Ok(property)
    }

    pub async fn list(&self, query: &PropertyQuery) -> Result<Vec<Property>, ApiError> {
        if query.page.map_or(false, |page| page > MAX_PAGE) {
            return Err(ApiError::Validation(format!(
                "page cannot exceed {}",
                MAX_PAGE
            )));
        }
        if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
            if min > max {
                return Err(ApiError::validation("minPrice cannot exceed maxPrice"));
            }
        }
        if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
            if start > end {
                return Err(ApiError::validation("endDate must not be before startDate"));
            }
        }
        Ok(self.properties.search(query).await?)
    }

    pub async fn create(&self, actor: &Identity, input: NewProperty) -> Result<Property, ApiError> {
        if !actor.role.can_list_properties() {
            return Err(ApiError::forbidden(format!(
                "User role {} is not authorized to list properties",
                actor.role
            )));
        }

        let now = Utc::now();
        let property = Property {
            id: new_id(),
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            price: input.price,
            address: input.address,
            features: input.features,
            images: Vec::new(),
            is_available: input.is_available.unwrap_or(true),
            created_by: actor.user_id.clone(),
            rating: Rating::baseline(),
            created_at: now,
            updated_at: now,
        };
        property.validate()?;

        self.properties.insert(&property).await?;
        info!("Property {} listed by {}", property.id, actor.user_id);
        Ok(property)
    }

    pub async fn update(
        &self,
        id: &str,
        actor: &Identity,
        patch: PropertyPatch,
    ) -> Result<Property, ApiError> {
        let mut property = self.get_managed(id, actor).await?;
        patch.apply(&mut property);
        property.validate()?;
        property.updated_at = Utc::now();

        if !self.properties.replace(&property).await? {
            return Err(ApiError::not_found("Property"));
        }
        Ok(property)
    }

    /// Removes the listing; stored photos are released on a best-effort basis.
    pub async fn delete(&self, id: &str, actor: &Identity) -> Result<(), ApiError> {
        let property = self.get_managed(id, actor).await?;
        if !self.properties.delete(&property.id).await? {
            return Err(ApiError::not_found("Property"));
        }
        for image in &property.images {
            release_quietly(self.media.as_ref(), &image.remote_id).await;
        }
        info!("Property {} deleted by {}", property.id, actor.user_id);
        Ok(())
    }

    pub async fn add_image(
        &self,
        id: &str,
        actor: &Identity,
        upload: MediaUpload,
    ) -> Result<Property, ApiError> {
        let mut property = self.get_managed(id, actor).await?;
        validate_image(&upload, self.max_upload_bytes)?;

        let stored = self
            .media
            .upload(upload, &format!("properties/{}", property.id))
            .await?;
        property.add_image(new_id(), stored.url, stored.remote_id.clone());
        property.updated_at = Utc::now();

        match self.properties.replace(&property).await {
            Ok(true) => Ok(property),
            Ok(false) => {
                release_quietly(self.media.as_ref(), &stored.remote_id).await;
                Err(ApiError::not_found("Property"))
            }
            Err(err) => {
                release_quietly(self.media.as_ref(), &stored.remote_id).await;
                Err(err.into())
            }
        }
    }

    pub async fn remove_image(
        &self,
        id: &str,
        image_id: &str,
        actor: &Identity,
    ) -> Result<Property, ApiError> {
        let mut property = self.get_managed(id, actor).await?;
        let removed = property
            .remove_image(image_id)
            .ok_or_else(|| ApiError::not_found("Image"))?;
        property.updated_at = Utc::now();

        if !self.properties.replace(&property).await? {
            return Err(ApiError::not_found("Property"));
        }
        release_quietly(self.media.as_ref(), &removed.remote_id).await;
        Ok(property)
    }

    pub async fn set_featured(
        &self,
        id: &str,
        image_id: &str,
        actor: &Identity,
    ) -> Result<Property, ApiError> {
        let mut property = self.get_managed(id, actor).await?;
        if !property.set_featured(image_id) {
            return Err(ApiError::not_found("Image"));
        }
        property.updated_at = Utc::now();

        if !self.properties.replace(&property).await? {
            return Err(ApiError::not_found("Property"));
        }
        Ok(property)
    }
}
