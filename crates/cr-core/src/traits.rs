//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Chip, ChipStats, Comment, Credentials, Session, SessionEvent, UserProfile, Vote};

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

/// Data persistence contract for chips, votes, comments and profiles.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait ChipRepo: Send + Sync {
    // Chip Operations
    /// Editorial list, ordered by `admin_rating` descending.
    async fn list_chips_by_admin_rating(&self) -> anyhow::Result<Vec<Chip>>;
    async fn insert_chip(&self, chip: Chip) -> anyhow::Result<()>;
    /// Returns `false` when no chip with this id existed.
    async fn delete_chip(&self, id: Uuid) -> anyhow::Result<bool>;

    // Aggregate Operations
    /// Every chip with its vote aggregate, in storage order.
    async fn list_chip_stats(&self) -> anyhow::Result<Vec<ChipStats>>;
    async fn chip_stats(&self, chip_id: Uuid) -> anyhow::Result<Option<ChipStats>>;

    // Vote Operations
    /// Insert or overwrite the vote keyed on (user_id, chip_id).
    async fn upsert_vote(&self, vote: Vote) -> anyhow::Result<()>;
    async fn user_votes(&self, user_id: Uuid) -> anyhow::Result<Vec<Vote>>;

    // Comment Operations
    async fn insert_comment(&self, comment: Comment) -> anyhow::Result<()>;
    /// Newest first, at most `limit` rows.
    async fn recent_comments(&self, chip_id: Uuid, limit: i64) -> anyhow::Result<Vec<Comment>>;

    // Profile Operations
    async fn insert_profile(&self, profile: UserProfile) -> anyhow::Result<()>;
}

/// Login material persistence, used by AuthProvider implementations.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn insert_credentials(&self, credentials: Credentials) -> anyhow::Result<()>;
    async fn find_credentials(&self, email: &str) -> anyhow::Result<Option<Credentials>>;
}

/// Object storage contract for chip images.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stores `data` under `key` inside `bucket`. Fails if the key already exists.
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> anyhow::Result<()>;
    /// Resolves a stored key to a publicly fetchable URL.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// Identity contract. Errors carry the taxonomy the caller must surface
/// (bad credentials are `Unauthorized`, a taken email is `Conflict`).
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Registers credentials and returns the new user id.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Uuid>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;
    /// Resolves a token to a live session. Expired sessions resolve to `None`.
    async fn session(&self, token: &str) -> Result<Option<Session>>;
    async fn sign_out(&self, token: &str) -> Result<()>;
    /// Session-change notifications (sign-in, sign-out, expiry).
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}
