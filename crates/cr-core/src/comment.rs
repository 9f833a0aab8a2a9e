//! Comment validation and the bounded newest-first feed kept per chip.

use crate::error::{AppError, Result};
use crate::models::Comment;

/// How many comments a chip shows by default.
pub const DEFAULT_COMMENT_LIMIT: usize = 3;
pub const MAX_COMMENT_LEN: usize = 1000;

/// Trims `raw` and rejects blank or oversized content.
pub fn validate_comment(raw: &str) -> Result<String> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(AppError::Validation("comment must not be empty".into()));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::Validation(format!(
            "comment exceeds {MAX_COMMENT_LEN} characters"
        )));
    }
    Ok(content.to_string())
}

/// The most recent comments for one chip, newest first.
#[derive(Debug, Clone)]
pub struct CommentFeed {
    limit: usize,
    comments: Vec<Comment>,
}

impl CommentFeed {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            comments: Vec::with_capacity(limit),
        }
    }

    /// Replaces the contents with a fresh read.
    pub fn replace(&mut self, mut fetched: Vec<Comment>) {
        fetched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        fetched.truncate(self.limit);
        self.comments = fetched;
    }

    /// Local prepend of a just-inserted comment, dropping the oldest overflow.
    pub fn push_newest(&mut self, comment: Comment) {
        self.comments.insert(0, comment);
        self.comments.truncate(self.limit);
    }

    pub fn as_slice(&self) -> &[Comment] {
        &self.comments
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }
}

impl Default for CommentFeed {
    fn default() -> Self {
        Self::new(DEFAULT_COMMENT_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn comment(content: &str, age_secs: i64) -> Comment {
        Comment {
            id: Uuid::now_v7(),
            chip_id: Uuid::nil(),
            user_id: Uuid::nil(),
            content: content.into(),
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn blank_comments_are_rejected() {
        assert!(matches!(validate_comment(""), Err(AppError::Validation(_))));
        assert!(matches!(validate_comment("  \n\t "), Err(AppError::Validation(_))));
        assert_eq!(validate_comment("  tasty  ").unwrap(), "tasty");
    }

    #[test]
    fn oversized_comments_are_rejected() {
        let long = "a".repeat(MAX_COMMENT_LEN + 1);
        assert!(validate_comment(&long).is_err());
        assert!(validate_comment(&"a".repeat(MAX_COMMENT_LEN)).is_ok());
    }

    #[test]
    fn feed_keeps_newest_first_within_limit() {
        let mut feed = CommentFeed::default();
        feed.replace(vec![
            comment("old", 300),
            comment("newest", 1),
            comment("middle", 100),
            comment("older", 200),
        ]);
        let contents: Vec<_> = feed.as_slice().iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, ["newest", "middle", "older"]);

        feed.push_newest(comment("fresh", 0));
        let contents: Vec<_> = feed.as_slice().iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, ["fresh", "newest", "middle"]);
        assert_eq!(feed.len(), DEFAULT_COMMENT_LIMIT);
    }
}
