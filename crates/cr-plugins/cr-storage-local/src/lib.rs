//! # cr-storage-local
//!
//! Local filesystem implementation of `MediaStore`.
//! Buckets are directories under the root; object keys may contain `/`
//! and map onto subdirectories. Objects are write-once.

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context};
use async_trait::async_trait;
use cr_core::traits::MediaStore;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

pub struct LocalMediaStore {
    /// Root directory for all buckets (e.g., "./data/uploads")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/static/uploads")
    url_prefix: String,
    max_bytes: usize,
}

impl LocalMediaStore {
    pub fn new(root: PathBuf, url_prefix: String, max_bytes: usize) -> Self {
        Self {
            root_path: root,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Maps bucket + key to a path, refusing anything that could escape the root.
    fn object_path(&self, bucket: &str, key: &str) -> anyhow::Result<PathBuf> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket.starts_with('.') {
            bail!("invalid bucket name {bucket:?}");
        }
        let key_path = Path::new(key);
        let clean = !key.is_empty()
            && !key.contains('\\')
            && key_path
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            bail!("invalid object key {key:?}");
        }

        let mut path = self.root_path.join(bucket);
        path.push(key_path);
        Ok(path)
    }
}

/// Removes a half-written object unless `keep` is called, so a failed or
/// cancelled upload does not leave the key permanently taken.
struct PartialObject(Option<PathBuf>);

impl PartialObject {
    fn keep(mut self) {
        self.0 = None;
    }
}

impl Drop for PartialObject {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => warn!(path = %path.display(), "removed partial upload"),
                Err(e) => warn!(path = %path.display(), error = %e, "could not remove partial upload"),
            }
        }
    }
}

/// Accepts only payloads whose bytes identify as an image.
fn check_image(data: &[u8], content_type: &str) -> anyhow::Result<()> {
    if !content_type.starts_with("image/") {
        bail!("unsupported content type {content_type}");
    }
    image::guess_format(data).context("upload is not a recognised image")?;
    Ok(())
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> anyhow::Result<()> {
        if data.len() > self.max_bytes {
            bail!("upload of {} bytes exceeds the {} byte limit", data.len(), self.max_bytes);
        }
        check_image(&data, content_type)?;

        let target_path = self.object_path(bucket, key)?;
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // create_new: an existing object is an error, never overwritten
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target_path)
            .await
            .with_context(|| format!("object {bucket}/{key} could not be created"))?;
        // Until the write completes, dropping this guard removes the file.
        let partial = PartialObject(Some(target_path));
        file.write_all(&data).await?;
        file.flush().await?;
        partial.keep();

        info!(%bucket, %key, bytes = data.len(), "object stored");
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        let url = format!("{}/{}/{}", self.url_prefix, bucket, key);
        debug!(%url, "resolved public url");
        url
    }
}
