//! Core data types for harvested posts and the persisted store document.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current version of the persisted store document.
pub const DOCUMENT_VERSION: &str = "1.0";

/// Thumbs-up on the signed tri-state scale used by the rating UI.
pub const RATING_UP: f64 = 1.0;

/// Thumbs-down on the signed tri-state scale used by the rating UI.
pub const RATING_DOWN: f64 = -1.0;

/// A stored post, one per captured feed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    /// Either the signed tri-state (+1 / -1) or the legacy 1–10 scale.
    /// The store does not validate the range.
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_post_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_unique_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub screenshot_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Post {
    pub fn is_rated(&self) -> bool {
        self.rating.is_some()
    }
}

/// A post as offered to [`crate::PostStore::add_post`], before an id and
/// timestamp are assigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPost {
    pub description: String,
    pub screenshot_path: String,
    pub rating: Option<f64>,
    pub platform: Option<String>,
    pub original_post_id: Option<String>,
    pub platform_unique_id: Option<String>,
    pub content_hash: Option<String>,
    pub category: Option<String>,
}

impl NewPost {
    pub fn new(description: impl Into<String>, screenshot_path: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            screenshot_path: screenshot_path.into(),
            ..Self::default()
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_platform_unique_id(mut self, id: impl Into<String>) -> Self {
        self.platform_unique_id = Some(id.into());
        self
    }

    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn with_original_post_id(mut self, id: impl Into<String>) -> Self {
        self.original_post_id = Some(id.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }
}

/// An item produced by one feed capture run. Not persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedItem {
    pub unique_id: String,
    pub image_path: PathBuf,
    pub platform: String,
    /// Position within the capture run, starting at 1.
    pub ordinal: usize,
    /// Truncated sha256 of the snapshot bytes.
    pub content_hash: String,
    /// Whether `unique_id` identifies the post across sessions (it came from
    /// platform metadata or the post text rather than a random token).
    #[serde(default)]
    pub stable_id: bool,
}

/// The whole persisted store document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostStoreState {
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub current_index: usize,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

impl Default for PostStoreState {
    fn default() -> Self {
        Self {
            posts: Vec::new(),
            current_index: 0,
            version: default_version(),
        }
    }
}

impl PostStoreState {
    /// Pull `current_index` back into `[0, len-1]` (or 0 when empty).
    /// Returns true when the pointer had to move.
    pub fn clamp_index(&mut self) -> bool {
        let max = self.posts.len().saturating_sub(1);
        if self.current_index > max {
            self.current_index = max;
            true
        } else {
            false
        }
    }
}

/// Result of [`crate::PostStore::add_post`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new post was appended and persisted.
    Added(String),
    /// The candidate matched an existing post; nothing changed.
    Duplicate { existing_id: String },
}

impl AddOutcome {
    pub fn id(&self) -> &str {
        match self {
            AddOutcome::Added(id) => id,
            AddOutcome::Duplicate { existing_id } => existing_id,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, AddOutcome::Duplicate { .. })
    }
}

/// Result of a relative pointer move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved { from: usize, to: usize },
    /// Already at the boundary in the requested direction.
    AtBoundary { index: usize },
    /// Zero steps requested.
    Stayed { index: usize },
}

impl MoveOutcome {
    pub fn index(&self) -> usize {
        match *self {
            MoveOutcome::Moved { to, .. } => to,
            MoveOutcome::AtBoundary { index } | MoveOutcome::Stayed { index } => index,
        }
    }

    pub fn moved(&self) -> bool {
        matches!(self, MoveOutcome::Moved { .. })
    }
}

/// Where the navigation pointer currently sits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub current_index: usize,
    pub total: usize,
    pub post: Option<Post>,
}

/// A window of posts around the navigation pointer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostWindow {
    /// Posts in the window, newest first.
    pub posts: Vec<Post>,
    pub total_posts: usize,
    pub current_index: usize,
    /// First sequence index covered by the window.
    pub start: usize,
    /// One past the last sequence index covered by the window.
    pub end: usize,
    pub has_more: bool,
    pub has_previous: bool,
}

/// A page of posts from the category filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPage {
    pub posts: Vec<Post>,
    pub category: String,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub has_more: bool,
}

/// Aggregate statistics over the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_posts: usize,
    pub rated_posts: usize,
    pub unrated_posts: usize,
    pub by_platform: BTreeMap<String, usize>,
    pub by_rating: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
}

/// Errors that can occur in the store layer.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to persist {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid document {path}: {reason}")]
    InvalidDocument { path: PathBuf, reason: String },

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Rating {0} cannot be stored")]
    InvalidRating(f64),
}

/// Convenience result type.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_serializes_camel_case() {
        let post = Post {
            id: "x_1_0".into(),
            description: "a cat".into(),
            timestamp: Utc::now(),
            rating: None,
            platform: Some("x".into()),
            original_post_id: None,
            platform_unique_id: Some("1".into()),
            content_hash: None,
            screenshot_path: "shots/x/x_1_1.png".into(),
            category: None,
        };
        let json = serde_json::to_value(&post).unwrap();
        assert!(json.get("platformUniqueId").is_some());
        assert!(json.get("screenshotPath").is_some());
        // rating is always present, null when unrated
        assert!(json.get("rating").unwrap().is_null());
        assert!(json.get("category").is_none());
    }

    #[test]
    fn test_legacy_document_defaults() {
        let state: PostStoreState = serde_json::from_str(r#"{"posts": []}"#).unwrap();
        assert_eq!(state.current_index, 0);
        assert_eq!(state.version, DOCUMENT_VERSION);
    }

    #[test]
    fn test_clamp_index() {
        let mut state = PostStoreState {
            current_index: 4,
            ..PostStoreState::default()
        };
        assert!(state.clamp_index());
        assert_eq!(state.current_index, 0);
        assert!(!state.clamp_index());
    }

    #[test]
    fn test_move_outcome_accessors() {
        let moved = MoveOutcome::Moved { from: 1, to: 3 };
        assert!(moved.moved());
        assert_eq!(moved.index(), 3);
        let stuck = MoveOutcome::AtBoundary { index: 0 };
        assert!(!stuck.moved());
        assert_eq!(stuck.index(), 0);
        let stayed = MoveOutcome::Stayed { index: 2 };
        assert!(!stayed.moved());
        assert_eq!(stayed.index(), 2);
    }
}
