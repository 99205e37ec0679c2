use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Average reported for a property that has no reviews yet.
pub const BASELINE_RATING: f64 = 4.5;

const MAX_TITLE_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 2000;
const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
/// Deepest page a listing search may ask for.
pub const MAX_PAGE: u64 = 10_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    #[serde(default)]
    pub bedrooms: u32,
    #[serde(default)]
    pub bathrooms: u32,
    #[serde(default)]
    pub parking: bool,
    #[serde(default)]
    pub furnished: bool,
    pub available_from: NaiveDate,
    pub available_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyImage {
    pub id: String,
    pub url: String,
    /// Identifier of the object at the media store, used to release it.
    pub remote_id: String,
    pub is_featured: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub average: f64,
    pub count: u32,
}

impl Rating {
    pub fn baseline() -> Self {
        Self {
            average: BASELINE_RATING,
            count: 0,
        }
    }
}

impl Default for Rating {
    fn default() -> Self {
        Self::baseline()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    /// Nightly price.
    pub price: f64,
    pub address: Address,
    pub features: Features,
    #[serde(default)]
    pub images: Vec<PropertyImage>,
    pub is_available: bool,
    pub created_by: String,
    #[serde(default)]
    pub rating: Rating,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    pub fn validate(&self) -> Result<(), ApiError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ApiError::validation("Title is required"));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(ApiError::validation(format!(
                "Title cannot exceed {} characters",
                MAX_TITLE_LEN
            )));
        }
        let description = self.description.trim();
        if description.is_empty() {
            return Err(ApiError::validation("Description is required"));
        }
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ApiError::validation(format!(
                "Description cannot exceed {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ApiError::validation("Price must be a non-negative number"));
        }
        if self.address.city.trim().is_empty() {
            return Err(ApiError::validation("City is required"));
        }
        if let Some(available_to) = self.features.available_to {
            if available_to < self.features.available_from {
                return Err(ApiError::validation(
                    "availableTo must be on or after availableFrom",
                ));
            }
        }
        Ok(())
    }

    pub fn featured_image(&self) -> Option<&PropertyImage> {
        self.images.iter().find(|image| image.is_featured)
    }

    /// Appends an image; the first image of an empty gallery becomes featured.
    pub fn add_image(&mut self, id: String, url: String, remote_id: String) -> &PropertyImage {
        let is_featured = self.images.is_empty();
        self.images.push(PropertyImage {
            id,
            url,
            remote_id,
            is_featured,
        });
        &self.images[self.images.len() - 1]
    }

    /// Removes an image. When the featured image goes and others remain,
    /// the new first image takes over.
    pub fn remove_image(&mut self, image_id: &str) -> Option<PropertyImage> {
        let index = self.images.iter().position(|image| image.id == image_id)?;
        let removed = self.images.remove(index);
        if removed.is_featured && self.featured_image().is_none() {
            if let Some(first) = self.images.first_mut() {
                first.is_featured = true;
            }
        }
        Some(removed)
    }

    /// Makes `image_id` the single featured image. Returns false if no such image.
    pub fn set_featured(&mut self, image_id: &str) -> bool {
        if !self.images.iter().any(|image| image.id == image_id) {
            return false;
        }
        for image in self.images.iter_mut() {
            image.is_featured = image.id == image_id;
        }
        true
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProperty {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub address: Address,
    pub features: Features,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturesPatch {
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub parking: Option<bool>,
    pub furnished: Option<bool>,
    pub available_from: Option<NaiveDate>,
    pub available_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub address: Option<Address>,
    pub features: Option<FeaturesPatch>,
    pub is_available: Option<bool>,
}

impl PropertyPatch {
    pub fn apply(self, property: &mut Property) {
        if let Some(title) = self.title {
            property.title = title;
        }
        if let Some(description) = self.description {
            property.description = description;
        }
        if let Some(price) = self.price {
            property.price = price;
        }
        if let Some(address) = self.address {
            property.address = address;
        }
        if let Some(is_available) = self.is_available {
            property.is_available = is_available;
        }
        if let Some(features) = self.features {
            let current = &mut property.features;
            if let Some(bedrooms) = features.bedrooms {
                current.bedrooms = bedrooms;
            }
            if let Some(bathrooms) = features.bathrooms {
                current.bathrooms = bathrooms;
            }
            if let Some(parking) = features.parking {
                current.parking = parking;
            }
            if let Some(furnished) = features.furnished {
                current.furnished = furnished;
            }
            if let Some(available_from) = features.available_from {
                current.available_from = available_from;
            }
            if let Some(available_to) = features.available_to {
                current.available_to = Some(available_to);
            }
        }
    }
}

/// Listing search. Every filter is optional; dates select properties whose
/// availability window overlaps `[startDate, endDate]`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyQuery {
    pub city: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub keyword: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<u64>,
    pub limit: Option<i64>,
}

impl PropertyQuery {
    /// `(skip, limit)` with the page size clamped to a sane range.
    pub fn pagination(&self) -> (u64, i64) {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let page = self.page.unwrap_or(1).clamp(1, MAX_PAGE);
        ((page - 1).saturating_mul(limit as u64), limit)
    }

    pub fn matches(&self, property: &Property) -> bool {
        if let Some(city) = self.city.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            if !property
                .address
                .city
                .to_lowercase()
                .contains(&city.to_lowercase())
            {
                return false;
            }
        }
        if let Some(min) = self.min_price {
            if property.price < min {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if property.price > max {
                return false;
            }
        }
        if let Some(keyword) = self
            .keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
        {
            let keyword = keyword.to_lowercase();
            if !property.title.to_lowercase().contains(&keyword)
                && !property.description.to_lowercase().contains(&keyword)
            {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if property.features.available_from > end {
                return false;
            }
        }
        if let (Some(start), Some(available_to)) = (self.start_date, property.features.available_to) {
            if available_to < start {
                return false;
            }
        }
        true
    }
}
