//! # cr-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `cr-core` domain models. Aggregates come from the `chip_vote_stats`
//! view, so every read reflects the store's current state.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use cr_core::models::{Chip, ChipStats, Comment, Credentials, UserProfile, Vote};
use cr_core::traits::{ChipRepo, CredentialStore};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &str = include_str!("../migrations/0001_schema.sql");

const CHIP_COLUMNS: &str = "id, brand, name, flavor, description, admin_rating, image_url, created_at";

pub struct SqliteChipRepo {
    pool: SqlitePool,
}

// Helper for UUID conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> anyhow::Result<Uuid> {
    Ok(Uuid::from_slice(blob)?)
}

fn chip_from_row(row: &SqliteRow) -> anyhow::Result<Chip> {
    Ok(Chip {
        id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id")?)?,
        brand: row.try_get("brand")?,
        name: row.try_get("name")?,
        flavor: row.try_get("flavor")?,
        description: row.try_get("description")?,
        admin_rating: row.try_get("admin_rating")?,
        image_url: row.try_get("image_url")?,
        created_at: row.try_get("created_at")?,
    })
}

fn stats_from_row(row: &SqliteRow) -> anyhow::Result<ChipStats> {
    Ok(ChipStats {
        chip: chip_from_row(row)?,
        weighted_avg_score: row.try_get("weighted_avg_score")?,
        vote_count: row.try_get("vote_count")?,
        comment_count: row.try_get("comment_count")?,
    })
}

fn comment_from_row(row: &SqliteRow) -> anyhow::Result<Comment> {
    Ok(Comment {
        id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id")?)?,
        chip_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("chip_id")?)?,
        user_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("user_id")?)?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
    })
}

impl SqliteChipRepo {
    /// Connects and applies the schema. `sqlite::memory:` gets a single
    /// connection, since every in-memory connection is its own database.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = if database_url.contains(":memory:") {
            // Closing the only connection would drop the database.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        }
        .connect_with(options)
        .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        info!(database_url, "sqlite schema ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl ChipRepo for SqliteChipRepo {
    async fn list_chips_by_admin_rating(&self) -> anyhow::Result<Vec<Chip>> {
        let sql = format!("SELECT {CHIP_COLUMNS} FROM chips ORDER BY admin_rating DESC, created_at ASC");
        sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(chip_from_row)
            .collect()
    }

    async fn insert_chip(&self, chip: Chip) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO chips (id, brand, name, flavor, description, admin_rating, image_url, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)")
            .bind(uuid_to_blob(chip.id))
            .bind(chip.brand)
            .bind(chip.name)
            .bind(chip.flavor)
            .bind(chip.description)
            .bind(chip.admin_rating)
            .bind(chip.image_url)
            .bind(chip.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Votes and comments go with the chip (ON DELETE CASCADE).
    async fn delete_chip(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM chips WHERE id = ?")
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_chip_stats(&self) -> anyhow::Result<Vec<ChipStats>> {
        sqlx::query("SELECT * FROM chip_vote_stats ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(stats_from_row)
            .collect()
    }

    async fn chip_stats(&self, chip_id: Uuid) -> anyhow::Result<Option<ChipStats>> {
        let row = sqlx::query("SELECT * FROM chip_vote_stats WHERE id = ?")
            .bind(uuid_to_blob(chip_id))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(stats_from_row).transpose()
    }

    /// One row per (user, chip): a repeat vote overwrites the score.
    async fn upsert_vote(&self, vote: Vote) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO votes (chip_id, user_id, score, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (user_id, chip_id) DO UPDATE SET score = excluded.score, updated_at = excluded.updated_at",
        )
        .bind(uuid_to_blob(vote.chip_id))
        .bind(uuid_to_blob(vote.user_id))
        .bind(vote.score)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        debug!(chip_id = %vote.chip_id, user_id = %vote.user_id, "vote upserted");
        Ok(())
    }

    async fn user_votes(&self, user_id: Uuid) -> anyhow::Result<Vec<Vote>> {
        sqlx::query("SELECT chip_id, user_id, score FROM votes WHERE user_id = ?")
            .bind(uuid_to_blob(user_id))
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| {
                Ok(Vote {
                    chip_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("chip_id")?)?,
                    user_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("user_id")?)?,
                    score: row.try_get("score")?,
                })
            })
            .collect()
    }

    async fn insert_comment(&self, comment: Comment) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO chip_comments (id, chip_id, user_id, content, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(uuid_to_blob(comment.id))
            .bind(uuid_to_blob(comment.chip_id))
            .bind(uuid_to_blob(comment.user_id))
            .bind(comment.content)
            .bind(comment.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn recent_comments(&self, chip_id: Uuid, limit: i64) -> anyhow::Result<Vec<Comment>> {
        // v7 ids are time-ordered, so they break created_at ties.
        sqlx::query(
            "SELECT id, chip_id, user_id, content, created_at FROM chip_comments
             WHERE chip_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(uuid_to_blob(chip_id))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(comment_from_row)
        .collect()
    }

    async fn insert_profile(&self, profile: UserProfile) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO users_profile (user_id, username, display_name, avatar_url) VALUES (?, ?, ?, ?)")
            .bind(uuid_to_blob(profile.user_id))
            .bind(profile.username)
            .bind(profile.display_name)
            .bind(profile.avatar_url)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for SqliteChipRepo {
    async fn insert_credentials(&self, credentials: Credentials) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO credentials (user_id, email, password_hash) VALUES (?, ?, ?)")
            .bind(uuid_to_blob(credentials.user_id))
            .bind(credentials.email)
            .bind(credentials.password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_credentials(&self, email: &str) -> anyhow::Result<Option<Credentials>> {
        let row = sqlx::query("SELECT user_id, email, password_hash FROM credentials WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Credentials {
                user_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("user_id")?)?,
                email: row.try_get("email")?,
                password_hash: row.try_get("password_hash")?,
            })),
            None => Ok(None),
        }
    }
}
