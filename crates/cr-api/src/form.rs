//! Multipart parsing for the chip upload form.
//!
//! Single uploads use plain field names (`name`, `brand`, `flavor`,
//! `description`, `admin_rating`, `file`). Batch uploads suffix each field
//! with the entry index (`name.0`, `file.0`, `name.1`, ...).

use std::collections::BTreeMap;

use actix_multipart::{Field, Multipart};
use cr_core::upload::{ImageUpload, NewChip};
use cr_core::AppError;
use futures_util::TryStreamExt;
use tracing::debug;

/// Splits `name.3` into `("name", 3)`; unsuffixed names belong to entry 0.
fn split_field(raw: &str) -> (&str, usize) {
    match raw.rsplit_once('.') {
        Some((field, index)) => match index.parse() {
            Ok(i) => (field, i),
            Err(_) => (raw, 0),
        },
        None => (raw, 0),
    }
}

fn multipart_error(e: impl std::fmt::Display) -> AppError {
    AppError::Validation(format!("malformed upload form: {e}"))
}

async fn read_field(field: &mut Field, budget: &mut usize) -> Result<Vec<u8>, AppError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
        if chunk.len() > *budget {
            return Err(AppError::Validation("upload exceeds the size limit".into()));
        }
        *budget -= chunk.len();
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

fn text(bytes: Vec<u8>) -> Result<String, AppError> {
    String::from_utf8(bytes).map_err(|_| AppError::Validation("form fields must be UTF-8".into()))
}

/// Collects every form entry keyed by index. `max_bytes` bounds the whole
/// payload.
pub async fn read_chip_form(
    mut payload: Multipart,
    max_bytes: usize,
) -> Result<BTreeMap<usize, NewChip>, AppError> {
    let mut entries: BTreeMap<usize, NewChip> = BTreeMap::new();
    let mut budget = max_bytes;

    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        let disposition = field.content_disposition().clone();
        let Some(raw_name) = disposition.get_name() else {
            continue;
        };
        let (name, index) = split_field(raw_name);
        let bytes = read_field(&mut field, &mut budget).await?;
        let entry = entries.entry(index).or_default();

        match name {
            "name" => entry.name = text(bytes)?,
            "brand" => entry.brand = Some(text(bytes)?),
            "flavor" => entry.flavor = Some(text(bytes)?),
            "description" => entry.description = Some(text(bytes)?),
            "admin_rating" => entry.admin_rating = Some(text(bytes)?),
            "file" => {
                let file_name = disposition.get_filename().unwrap_or("upload").to_string();
                let content_type = match field.content_type() {
                    Some(mime) if mime.type_() != "application" => mime.to_string(),
                    _ => mime_guess::from_path(&file_name)
                        .first_or_octet_stream()
                        .to_string(),
                };
                entry.image = Some(ImageUpload {
                    file_name,
                    content_type,
                    data: bytes,
                });
            }
            other => debug!(field = %other, "ignoring unknown form field"),
        }
    }
    Ok(entries)
}
