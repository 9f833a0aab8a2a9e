//! Editorial chip upload: form validation and object key naming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::Chip;

pub const MAX_ADMIN_RATING: f64 = 5.0;
const KEY_PREFIX: &str = "chips";

/// Raw image bytes as received from a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// One entry of the upload form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewChip {
    pub name: String,
    pub brand: Option<String>,
    pub flavor: Option<String>,
    pub description: Option<String>,
    /// Free-text rating as typed by the curator.
    pub admin_rating: Option<String>,
    pub image: Option<ImageUpload>,
}

/// Parses the curator rating leniently: garbage becomes 0, values are
/// clamped into 0..=5.
pub fn parse_admin_rating(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, MAX_ADMIN_RATING))
        .unwrap_or(0.0)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Keeps the last path segment and replaces anything outside
/// `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `chips/{unix_millis}-{file name}`
pub fn object_key(file_name: &str, now: DateTime<Utc>) -> String {
    format!(
        "{KEY_PREFIX}/{}-{}",
        now.timestamp_millis(),
        sanitize_file_name(file_name)
    )
}

/// A validated upload, ready for storage and insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedChip {
    pub chip: Chip,
    pub image: ImageUpload,
    pub object_key: String,
}

impl NewChip {
    pub fn prepare(self, now: DateTime<Utc>) -> Result<PreparedChip> {
        let name = self.name.trim().to_string();
        let image = match self.image {
            Some(image) if !image.data.is_empty() => image,
            _ => {
                return Err(AppError::Validation(
                    "a chip needs at least a name and an image".into(),
                ))
            }
        };
        if name.is_empty() {
            return Err(AppError::Validation(
                "a chip needs at least a name and an image".into(),
            ));
        }

        let object_key = object_key(&image.file_name, now);
        let chip = Chip {
            id: Uuid::now_v7(),
            brand: non_blank(self.brand),
            name,
            flavor: non_blank(self.flavor),
            description: non_blank(self.description),
            admin_rating: parse_admin_rating(self.admin_rating.as_deref()),
            image_url: None,
            created_at: now,
        };
        Ok(PreparedChip {
            chip,
            image,
            object_key,
        })
    }
}

/// Outcome of a batch upload. Entries fail independently.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub created: Vec<Chip>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchFailure {
    pub index: usize,
    pub name: String,
    pub reason: String,
}
