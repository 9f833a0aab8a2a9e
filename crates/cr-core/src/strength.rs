//! # Strength
//!
//! Combines the public average, the curator rating and a vote-count
//! confidence term into one comparable ranking scalar:
//!
//! `strength = 0.6 * avg + 0.3 * my_score + 0.1 * ln(1 + votes)`
//!
//! Inputs are validated rather than trusted: a missing, negative, NaN or
//! infinite field counts as 0, so the result is always finite and >= 0.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::{Chip, ChipStats};

pub const ALPHA: f64 = 0.6;
pub const BETA: f64 = 0.3;
pub const GAMMA: f64 = 0.1;

/// The three observed signals for an item.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StrengthInput {
    /// Public weighted average score (0-5)
    pub avg: Option<f64>,
    /// Editorial score (0-5)
    pub my_score: Option<f64>,
    pub votes: Option<i64>,
}

impl From<&ChipStats> for StrengthInput {
    fn from(stats: &ChipStats) -> Self {
        Self {
            avg: stats.weighted_avg_score,
            my_score: Some(stats.chip.admin_rating),
            votes: Some(stats.vote_count),
        }
    }
}

fn coalesce(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

pub fn calculate_strength(input: &StrengthInput) -> f64 {
    let avg = coalesce(input.avg);
    let my_score = coalesce(input.my_score);
    let votes = input.votes.unwrap_or(0).max(0) as f64;

    ALPHA * avg + BETA * my_score + GAMMA * votes.ln_1p()
}

/// A public-ranking row with its derived strength attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedChip {
    #[serde(flatten)]
    pub stats: ChipStats,
    pub strength: f64,
}

impl From<ChipStats> for RankedChip {
    fn from(stats: ChipStats) -> Self {
        let strength = calculate_strength(&StrengthInput::from(&stats));
        Self { stats, strength }
    }
}

/// Orders by descending strength. Equal strengths keep their input order.
pub fn rank_by_strength(items: Vec<ChipStats>) -> Vec<RankedChip> {
    rank_by_strength_with(items, |_, _| Ordering::Equal)
}

/// Like [`rank_by_strength`], breaking strength ties with `secondary`
/// before falling back to input order.
pub fn rank_by_strength_with<F>(items: Vec<ChipStats>, mut secondary: F) -> Vec<RankedChip>
where
    F: FnMut(&ChipStats, &ChipStats) -> Ordering,
{
    let mut ranked: Vec<RankedChip> = items.into_iter().map(RankedChip::from).collect();
    // `sort_by` is stable
    ranked.sort_by(|a, b| {
        b.strength
            .total_cmp(&a.strength)
            .then_with(|| secondary(&a.stats, &b.stats))
    });
    ranked
}

/// Editorial ordering: highest curator rating first, stable on ties.
pub fn rank_by_admin_rating(mut chips: Vec<Chip>) -> Vec<Chip> {
    chips.sort_by(|a, b| b.admin_rating.total_cmp(&a.admin_rating));
    chips
}

/// Search box filter: case-insensitive on the name, plain substring on
/// description and brand. An empty term matches everything.
pub fn matches_search(chip: &Chip, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    let lowered = term.to_lowercase();
    chip.name.to_lowercase().contains(&lowered)
        || chip.description.as_deref().is_some_and(|d| d.contains(term))
        || chip.brand.as_deref().is_some_and(|b| b.contains(term))
}
