//! # RankingService
//!
//! Coordinates the ports for every user-facing action. Local checks
//! (validation, then authorization) run before any write reaches the store,
//! and every port call is bounded by the configured timeout.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::call::{bounded, DEFAULT_CALL_TIMEOUT};
use crate::comment::{validate_comment, DEFAULT_COMMENT_LIMIT};
use crate::error::{AppError, Result};
use crate::models::{Chip, ChipStats, Comment, Session, UserProfile, Vote};
use crate::strength::{matches_search, rank_by_admin_rating, rank_by_strength, RankedChip};
use crate::traits::{AuthProvider, ChipRepo, MediaStore};
use crate::upload::{BatchFailure, BatchReport, NewChip};
use crate::vote::validate_score;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub call_timeout: Duration,
    pub comment_limit: usize,
    pub image_bucket: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            comment_limit: DEFAULT_COMMENT_LIMIT,
            image_bucket: "chip-images".to_string(),
        }
    }
}

/// Optional profile fields collected at sign-up.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileInput {
    pub username: Option<String>,
    pub display_name: Option<String>,
}

pub struct RankingService {
    repo: Arc<dyn ChipRepo>,
    media: Arc<dyn MediaStore>,
    auth: Arc<dyn AuthProvider>,
    settings: ServiceSettings,
}

impl RankingService {
    pub fn new(
        repo: Arc<dyn ChipRepo>,
        media: Arc<dyn MediaStore>,
        auth: Arc<dyn AuthProvider>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            repo,
            media,
            auth,
            settings,
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn auth(&self) -> &Arc<dyn AuthProvider> {
        &self.auth
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    /// The editorial list, curator rating descending.
    pub async fn admin_ranking(&self, search: Option<&str>) -> Result<Vec<Chip>> {
        let chips = bounded(self.settings.call_timeout, self.repo.list_chips_by_admin_rating()).await?;
        let term = search.unwrap_or("");
        let filtered = chips.into_iter().filter(|c| matches_search(c, term)).collect();
        Ok(rank_by_admin_rating(filtered))
    }

    /// The crowd list, strength descending.
    pub async fn public_ranking(&self, search: Option<&str>) -> Result<Vec<RankedChip>> {
        let rows = bounded(self.settings.call_timeout, self.repo.list_chip_stats()).await?;
        let term = search.unwrap_or("");
        let filtered = rows.into_iter().filter(|s| matches_search(&s.chip, term)).collect();
        Ok(rank_by_strength(filtered))
    }

    pub async fn recent_comments(&self, chip_id: Uuid) -> Result<Vec<Comment>> {
        bounded(
            self.settings.call_timeout,
            self.repo.recent_comments(chip_id, self.settings.comment_limit as i64),
        )
        .await
    }

    // ── Auth ─────────────────────────────────────────────────────────────────

    /// Resolves a bearer token to a live session.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Session> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("please sign in first".into()))?;
        bounded(self.settings.call_timeout, self.auth.session(token))
            .await?
            .ok_or_else(|| AppError::Unauthorized("session is invalid or expired".into()))
    }

    pub async fn sign_up(&self, email: &str, password: &str, profile: ProfileInput) -> Result<Uuid> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AppError::Validation("email and password are required".into()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let user_id = bounded(self.settings.call_timeout, self.auth.sign_up(email, password)).await?;

        let username = profile.username.filter(|s| !s.trim().is_empty());
        let display_name = profile
            .display_name
            .filter(|s| !s.trim().is_empty())
            .or_else(|| username.clone());
        let row = UserProfile {
            user_id,
            username,
            display_name,
            avatar_url: None,
        };
        bounded(self.settings.call_timeout, self.repo.insert_profile(row))
            .await
            .map_err(|e| AppError::Backend(format!("signed up, but writing the profile failed: {e}")))?;

        info!(%user_id, "user signed up");
        Ok(user_id)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::Validation("email and password are required".into()));
        }
        bounded(self.settings.call_timeout, self.auth.sign_in(email.trim(), password)).await
    }

    pub async fn sign_out(&self, token: Option<&str>) -> Result<()> {
        let session = self.authenticate(token).await?;
        bounded(self.settings.call_timeout, self.auth.sign_out(&session.token)).await
    }

    // ── Writes ───────────────────────────────────────────────────────────────

    /// Records (or overwrites) the caller's score and returns the
    /// authoritative aggregate read back after the write.
    pub async fn vote(&self, token: Option<&str>, chip_id: Uuid, score: i32) -> Result<ChipStats> {
        validate_score(score)?;
        let session = self.authenticate(token).await?;
        let timeout = self.settings.call_timeout;

        if bounded(timeout, self.repo.chip_stats(chip_id)).await?.is_none() {
            return Err(AppError::NotFound("Chip".into(), chip_id.to_string()));
        }

        let vote = Vote {
            chip_id,
            user_id: session.user_id,
            score,
        };
        bounded(timeout, self.repo.upsert_vote(vote)).await?;
        info!(%chip_id, user_id = %session.user_id, score, "vote recorded");

        bounded(timeout, self.repo.chip_stats(chip_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Chip".into(), chip_id.to_string()))
    }

    /// Appends a comment, then returns the refreshed newest-first list.
    pub async fn comment(&self, token: Option<&str>, chip_id: Uuid, raw: &str) -> Result<Vec<Comment>> {
        let content = validate_comment(raw)?;
        let session = self.authenticate(token).await?;

        if bounded(self.settings.call_timeout, self.repo.chip_stats(chip_id)).await?.is_none() {
            return Err(AppError::NotFound("Chip".into(), chip_id.to_string()));
        }

        let comment = Comment {
            id: Uuid::now_v7(),
            chip_id,
            user_id: session.user_id,
            content,
            created_at: Utc::now(),
        };
        bounded(self.settings.call_timeout, self.repo.insert_comment(comment)).await?;
        info!(%chip_id, user_id = %session.user_id, "comment added");

        self.recent_comments(chip_id).await
    }

    /// Uploads the image, resolves its public URL and inserts the chip.
    pub async fn upload_chip(&self, token: Option<&str>, new_chip: NewChip) -> Result<Chip> {
        let prepared = new_chip.prepare(Utc::now())?;
        self.authenticate(token).await?;
        self.store_chip(prepared).await
    }

    /// Each entry succeeds or fails on its own; failures are reported, not
    /// fatal. Entries carry the caller's own index, which failures echo back.
    pub async fn upload_batch(
        &self,
        token: Option<&str>,
        entries: Vec<(usize, NewChip)>,
    ) -> Result<BatchReport> {
        self.authenticate(token).await?;

        let mut report = BatchReport::default();
        for (index, entry) in entries {
            let name = entry.name.clone();
            let outcome = match entry.prepare(Utc::now()) {
                Ok(prepared) => self.store_chip(prepared).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(chip) => report.created.push(chip),
                Err(e) => {
                    warn!(index, %name, error = %e, "batch entry skipped");
                    report.failed.push(BatchFailure {
                        index,
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    async fn store_chip(&self, prepared: crate::upload::PreparedChip) -> Result<Chip> {
        let timeout = self.settings.call_timeout;
        let bucket = self.settings.image_bucket.as_str();
        let mut chip = prepared.chip;
        let image = prepared.image;

        bounded(
            timeout,
            self.media
                .upload(bucket, &prepared.object_key, image.data, &image.content_type),
        )
        .await?;
        chip.image_url = Some(self.media.public_url(bucket, &prepared.object_key));

        bounded(timeout, self.repo.insert_chip(chip.clone())).await?;
        info!(chip_id = %chip.id, %bucket, key = %prepared.object_key, "chip uploaded");
        Ok(chip)
    }

    pub async fn delete_chip(&self, token: Option<&str>, chip_id: Uuid) -> Result<()> {
        let session = self.authenticate(token).await?;
        let deleted = bounded(self.settings.call_timeout, self.repo.delete_chip(chip_id)).await?;
        if !deleted {
            return Err(AppError::NotFound("Chip".into(), chip_id.to_string()));
        }
        info!(%chip_id, user_id = %session.user_id, "chip deleted");
        Ok(())
    }
}
