//! # Domain Models
//!
//! These structs represent the core entities of the chip ranking.
//! We use UUID v7 for time-ordered, globally unique identification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A ranked product entry, one row of the `chips` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chip {
    pub id: Uuid,
    pub brand: Option<String>,
    pub name: String,
    pub flavor: Option<String>,
    pub description: Option<String>,
    /// Curator score (0-5), assigned out of band.
    pub admin_rating: f64,
    /// Publicly fetchable URL resolved by the MediaStore at upload time
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A chip joined with its public vote aggregate (the `chip_vote_stats` view).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChipStats {
    #[serde(flatten)]
    pub chip: Chip,
    /// Mean of all user scores, `None` until the first vote lands.
    pub weighted_avg_score: Option<f64>,
    pub vote_count: i64,
    pub comment_count: i64,
}

impl ChipStats {
    pub fn id(&self) -> Uuid {
        self.chip.id
    }
}

/// A user's score for a chip. At most one per (user, chip).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub chip_id: Uuid,
    pub user_id: Uuid,
    pub score: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub chip_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Optional public profile written at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Stored login material. The hash is a PHC string, never a raw password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
}

/// An authenticated session handed out by the AuthProvider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Session lifecycle notifications broadcast by the AuthProvider.
/// Sign-ins carry only the user id; live tokens never go on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { user_id: Uuid },
    SignedOut { token: String },
    Expired { token: String },
}
