//! # RankingClient
//!
//! Per-session client state for the public ranking: cached aggregates, the
//! current user's own scores, comment feeds and comment drafts. Votes are
//! applied optimistically and then reconciled against the store, or rolled
//! back when the write fails.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use dashmap::{DashMap, DashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::call::{bounded, DEFAULT_CALL_TIMEOUT};
use crate::comment::{validate_comment, CommentFeed, DEFAULT_COMMENT_LIMIT};
use crate::error::{AppError, Result};
use crate::models::{ChipStats, Comment, Vote};
use crate::session::SessionContext;
use crate::strength::{rank_by_strength, RankedChip};
use crate::traits::ChipRepo;
use crate::vote::{validate_score, VoteCommand};

pub struct RankingClient {
    repo: Arc<dyn ChipRepo>,
    session: SessionContext,
    call_timeout: Duration,
    comment_limit: usize,
    chips: DashMap<Uuid, ChipStats>,
    /// Load order of the last refresh, so strength ties stay stable.
    order: RwLock<Vec<Uuid>>,
    my_votes: DashMap<Uuid, i32>,
    comments: DashMap<Uuid, CommentFeed>,
    drafts: DashMap<Uuid, String>,
    in_flight: DashSet<Uuid>,
}

/// Clears the in-flight flag for a chip when the vote finishes, however it ends.
struct InFlight<'a> {
    set: &'a DashSet<Uuid>,
    chip_id: Uuid,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.chip_id);
    }
}

impl RankingClient {
    pub fn new(repo: Arc<dyn ChipRepo>, session: SessionContext) -> Self {
        Self {
            repo,
            session,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            comment_limit: DEFAULT_COMMENT_LIMIT,
            chips: DashMap::new(),
            order: RwLock::new(Vec::new()),
            my_votes: DashMap::new(),
            comments: DashMap::new(),
            drafts: DashMap::new(),
            in_flight: DashSet::new(),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_comment_limit(mut self, limit: usize) -> Self {
        self.comment_limit = limit;
        self
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    // ── Aggregates ───────────────────────────────────────────────────────────

    /// Re-reads every aggregate and returns the ranked list.
    pub async fn refresh(&self) -> Result<Vec<RankedChip>> {
        let rows = bounded(self.call_timeout, self.repo.list_chip_stats()).await?;
        let ids: Vec<Uuid> = rows.iter().map(ChipStats::id).collect();
        self.chips.clear();
        for row in rows {
            self.chips.insert(row.id(), row);
        }
        *self.order.write().unwrap_or_else(|p| p.into_inner()) = ids;
        debug!(count = self.chips.len(), "public ranking refreshed");
        Ok(self.ranked())
    }

    /// The cached rows ranked by strength, including any tentative votes.
    pub fn ranked(&self) -> Vec<RankedChip> {
        let order = self.order.read().unwrap_or_else(|p| p.into_inner());
        let rows = order
            .iter()
            .filter_map(|id| self.chips.get(id).map(|r| r.value().clone()))
            .collect();
        rank_by_strength(rows)
    }

    pub fn stats(&self, chip_id: Uuid) -> Option<ChipStats> {
        self.chips.get(&chip_id).map(|r| r.value().clone())
    }

    // ── Votes ────────────────────────────────────────────────────────────────

    /// Loads the signed-in user's existing scores.
    pub async fn load_my_votes(&self) -> Result<()> {
        let session = self.session.require()?;
        let votes = bounded(self.call_timeout, self.repo.user_votes(session.user_id)).await?;
        self.my_votes.clear();
        for vote in votes {
            self.my_votes.insert(vote.chip_id, vote.score);
        }
        Ok(())
    }

    pub fn my_score(&self, chip_id: Uuid) -> Option<i32> {
        self.my_votes.get(&chip_id).map(|r| *r.value())
    }

    pub fn is_voting(&self, chip_id: Uuid) -> bool {
        self.in_flight.contains(&chip_id)
    }

    /// Optimistic vote. Returns the row now displayed for the chip.
    pub async fn vote(&self, chip_id: Uuid, score: i32) -> Result<ChipStats> {
        validate_score(score)?;
        let session = self.session.require()?;

        if !self.in_flight.insert(chip_id) {
            return Err(AppError::Conflict(format!("a vote for chip {chip_id} is already in flight")));
        }
        let _guard = InFlight {
            set: &self.in_flight,
            chip_id,
        };

        let current = self
            .stats(chip_id)
            .ok_or_else(|| AppError::NotFound("Chip".into(), chip_id.to_string()))?;
        let previous = self.my_score(chip_id);
        let command = VoteCommand::prepare(&current, previous, score)?;

        self.chips.insert(chip_id, command.tentative.clone());
        self.my_votes.insert(chip_id, score);

        let vote = Vote {
            chip_id,
            user_id: session.user_id,
            score,
        };
        if let Err(e) = bounded(self.call_timeout, self.repo.upsert_vote(vote)).await {
            warn!(%chip_id, error = %e, "vote failed, rolling back");
            let (snapshot, previous) = command.rollback();
            self.chips.insert(chip_id, snapshot);
            match previous {
                Some(prev) => self.my_votes.insert(chip_id, prev),
                None => self.my_votes.remove(&chip_id).map(|(_, s)| s),
            };
            return Err(e);
        }

        // The write landed; a failed re-read only means we keep the tentative row.
        let authoritative = match bounded(self.call_timeout, self.repo.chip_stats(chip_id)).await {
            Ok(row) => row,
            Err(e) => {
                warn!(%chip_id, error = %e, "reconcile read failed, keeping tentative aggregate");
                None
            }
        };
        let settled = command.commit(authoritative);
        self.chips.insert(chip_id, settled.clone());
        info!(%chip_id, score, votes = settled.vote_count, "vote reconciled");
        Ok(settled)
    }

    // ── Comments ─────────────────────────────────────────────────────────────

    pub fn set_draft(&self, chip_id: Uuid, text: impl Into<String>) {
        self.drafts.insert(chip_id, text.into());
    }

    pub fn draft(&self, chip_id: Uuid) -> String {
        self.drafts
            .get(&chip_id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    pub fn comments(&self, chip_id: Uuid) -> Vec<Comment> {
        self.comments
            .get(&chip_id)
            .map(|f| f.as_slice().to_vec())
            .unwrap_or_default()
    }

    pub async fn refresh_comments(&self, chip_id: Uuid) -> Result<Vec<Comment>> {
        let fetched = bounded(
            self.call_timeout,
            self.repo.recent_comments(chip_id, self.comment_limit as i64),
        )
        .await?;
        let mut feed = CommentFeed::new(self.comment_limit);
        feed.replace(fetched);
        let shown = feed.as_slice().to_vec();
        self.comments.insert(chip_id, feed);
        Ok(shown)
    }

    /// Posts the current draft. Blank drafts are rejected without touching
    /// the store or the local state.
    pub async fn submit_comment(&self, chip_id: Uuid) -> Result<Vec<Comment>> {
        let content = validate_comment(&self.draft(chip_id))?;
        let session = self.session.require()?;

        let comment = Comment {
            id: Uuid::now_v7(),
            chip_id,
            user_id: session.user_id,
            content,
            created_at: Utc::now(),
        };
        bounded(self.call_timeout, self.repo.insert_comment(comment.clone())).await?;
        self.drafts.remove(&chip_id);

        match self.refresh_comments(chip_id).await {
            Ok(shown) => Ok(shown),
            Err(e) => {
                // Inserted but not re-read: show it locally instead.
                warn!(%chip_id, error = %e, "comment re-fetch failed, prepending locally");
                let mut feed = self
                    .comments
                    .entry(chip_id)
                    .or_insert_with(|| CommentFeed::new(self.comment_limit));
                feed.push_newest(comment);
                Ok(feed.as_slice().to_vec())
            }
        }
    }
}
