//! # Optimistic voting
//!
//! A vote is applied locally first, then persisted, then either reconciled
//! against the authoritative aggregate or rolled back to the exact snapshot
//! taken before the tentative update.

use crate::error::{AppError, Result};
use crate::models::ChipStats;

pub const MIN_SCORE: i32 = 1;
pub const MAX_SCORE: i32 = 5;

pub fn validate_score(score: i32) -> Result<()> {
    if (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "score must be between {MIN_SCORE} and {MAX_SCORE}, got {score}"
        )))
    }
}

/// Count and mean of an item's votes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    pub count: i64,
    pub avg: Option<f64>,
}

impl Aggregate {
    pub fn of(stats: &ChipStats) -> Self {
        Self {
            count: stats.vote_count,
            avg: stats.weighted_avg_score,
        }
    }

    /// The aggregate after `new` replaces `previous` (or is added, when the
    /// user had not voted yet).
    pub fn apply_vote(self, previous: Option<i32>, new: i32) -> Self {
        let total = self.avg.unwrap_or(0.0) * self.count as f64;
        let (count, total) = match previous {
            // A count of 0 alongside a prior vote means the cache is stale;
            // treat the vote as new instead of dividing by zero.
            Some(prev) if self.count > 0 => (self.count, total - prev as f64 + new as f64),
            _ => (self.count + 1, total + new as f64),
        };
        Self {
            count,
            avg: Some(total / count as f64),
        }
    }

    pub fn write_to(self, stats: &mut ChipStats) {
        stats.vote_count = self.count;
        stats.weighted_avg_score = self.avg;
    }
}

/// A tentative vote: the state to show now and the state to restore on failure.
#[derive(Debug, Clone)]
pub struct VoteCommand {
    pub score: i32,
    pub previous_score: Option<i32>,
    pub snapshot: ChipStats,
    pub tentative: ChipStats,
}

impl VoteCommand {
    pub fn prepare(current: &ChipStats, previous_score: Option<i32>, score: i32) -> Result<Self> {
        validate_score(score)?;
        let mut tentative = current.clone();
        Aggregate::of(current)
            .apply_vote(previous_score, score)
            .write_to(&mut tentative);
        Ok(Self {
            score,
            previous_score,
            snapshot: current.clone(),
            tentative,
        })
    }

    /// The authoritative row wins. If the store no longer knows the chip,
    /// keep the tentative state.
    pub fn commit(self, authoritative: Option<ChipStats>) -> ChipStats {
        authoritative.unwrap_or(self.tentative)
    }

    pub fn rollback(self) -> (ChipStats, Option<i32>) {
        (self.snapshot, self.previous_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chip;
    use chrono::Utc;
    use uuid::Uuid;

    fn stats(avg: Option<f64>, count: i64) -> ChipStats {
        ChipStats {
            chip: Chip {
                id: Uuid::now_v7(),
                brand: None,
                name: "Salt & Vinegar".into(),
                flavor: None,
                description: None,
                admin_rating: 4.0,
                image_url: None,
                created_at: Utc::now(),
            },
            weighted_avg_score: avg,
            vote_count: count,
            comment_count: 0,
        }
    }

    #[test]
    fn first_vote_adds() {
        let agg = Aggregate { count: 0, avg: None }.apply_vote(None, 4);
        assert_eq!(agg, Aggregate { count: 1, avg: Some(4.0) });
    }

    #[test]
    fn new_voter_extends_the_mean() {
        let agg = Aggregate { count: 2, avg: Some(3.0) }.apply_vote(None, 5);
        assert_eq!(agg.count, 3);
        assert!((agg.avg.unwrap() - 11.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn revote_replaces_without_counting_twice() {
        let agg = Aggregate { count: 2, avg: Some(3.0) }.apply_vote(Some(2), 5);
        assert_eq!(agg.count, 2);
        assert_eq!(agg.avg, Some(4.5));
    }

    #[test]
    fn stale_previous_with_zero_count_is_treated_as_new() {
        let agg = Aggregate { count: 0, avg: None }.apply_vote(Some(3), 2);
        assert_eq!(agg, Aggregate { count: 1, avg: Some(2.0) });
    }

    #[test]
    fn out_of_range_scores_are_rejected() {
        assert!(matches!(validate_score(0), Err(AppError::Validation(_))));
        assert!(matches!(validate_score(6), Err(AppError::Validation(_))));
        assert!(validate_score(1).is_ok());
        assert!(validate_score(5).is_ok());
        assert!(VoteCommand::prepare(&stats(None, 0), None, 9).is_err());
    }

    #[test]
    fn rollback_restores_snapshot_exactly() {
        let current = stats(Some(3.5), 4);
        let cmd = VoteCommand::prepare(&current, Some(3), 5).unwrap();
        assert_ne!(cmd.tentative, current);
        let (restored, prev) = cmd.rollback();
        assert_eq!(restored, current);
        assert_eq!(prev, Some(3));
    }

    #[test]
    fn commit_prefers_authoritative_row() {
        let current = stats(Some(3.0), 1);
        let cmd = VoteCommand::prepare(&current, None, 5).unwrap();
        let mut fresh = current.clone();
        fresh.vote_count = 7;
        fresh.weighted_avg_score = Some(4.1);
        assert_eq!(cmd.clone().commit(Some(fresh.clone())), fresh);
        assert_eq!(cmd.commit(None).vote_count, 2);
    }
}
