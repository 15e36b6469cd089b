//! The post store: deduplicating, order-preserving, with a persisted
//! navigation pointer.
//!
//! The entire [`PostStoreState`] lives in memory and every mutation rewrites
//! the whole document. A mutation is applied to a copy of the state first;
//! the in-memory state only changes once the document has been written, so
//! a failed write leaves the store exactly as it was.
//!
//! Two pagination schemes exist and are deliberately separate:
//! - [`PostStore::get_posts`] returns a window centered on the pointer.
//! - [`PostStore::posts_by_category_paginated`] is plain offset paging over
//!   one category and ignores the pointer.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::slug::slugify;
use crate::storage::{DocumentReader, DocumentWriter};
use crate::types::{
    AddOutcome, CategoryPage, MoveOutcome, NewPost, Position, Post, PostStoreState, PostWindow,
    StoreError, StoreResult, StoreStats,
};

/// Longest description slug used in generated ids.
const MAX_ID_SLUG: usize = 40;

/// Platform bucket in [`StoreStats::by_platform`] for posts without one.
pub const UNKNOWN_PLATFORM: &str = "unknown";

/// JSON-document-backed post store.
pub struct PostStore {
    path: PathBuf,
    state: PostStoreState,
}

impl PostStore {
    /// Open the store at `path`, or start an empty one if no document
    /// exists yet. Nothing is written until the first mutation.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let state = if path.exists() {
            let state = DocumentReader::read_from_file(&path)?;
            tracing::info!(
                "Opened post store {} ({} posts, pointer at {})",
                path.display(),
                state.posts.len(),
                state.current_index
            );
            state
        } else {
            tracing::info!("Creating new post store: {}", path.display());
            PostStoreState::default()
        };
        Ok(Self { path, state })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &PostStoreState {
        &self.state
    }

    pub fn len(&self) -> usize {
        self.state.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.posts.is_empty()
    }

    /// Write `next` and make it the live state.
    fn commit(&mut self, next: PostStoreState) -> StoreResult<()> {
        DocumentWriter::write_to_file(&next, &self.path)?;
        self.state = next;
        Ok(())
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.state.posts.iter().position(|p| p.id == id)
    }

    // ───────────────────────── mutation ─────────────────────────

    /// Add a post unless it duplicates one already stored.
    ///
    /// A NaN or infinite rating is rejected: JSON has no encoding for it.
    pub fn add_post(&mut self, candidate: NewPost) -> StoreResult<AddOutcome> {
        if let Some(rating) = candidate.rating.filter(|r| !r.is_finite()) {
            return Err(StoreError::InvalidRating(rating));
        }
        if let Some(existing) = self.find_duplicate(&candidate) {
            tracing::debug!(
                "Duplicate post skipped: matches {} (platform id {:?})",
                existing.id,
                candidate.platform_unique_id
            );
            return Ok(AddOutcome::Duplicate {
                existing_id: existing.id.clone(),
            });
        }

        let now = Utc::now();
        let id = self.generate_id(&candidate, now);
        let post = Post {
            id: id.clone(),
            description: candidate.description,
            timestamp: now,
            rating: candidate.rating,
            platform: candidate.platform,
            original_post_id: candidate.original_post_id,
            platform_unique_id: candidate.platform_unique_id,
            content_hash: candidate.content_hash,
            screenshot_path: candidate.screenshot_path,
            category: candidate.category,
        };

        let mut next = self.state.clone();
        next.posts.push(post);
        self.commit(next)?;

        tracing::debug!("Added post {id} ({} total)", self.len());
        Ok(AddOutcome::Added(id))
    }

    /// The stored post `candidate` would duplicate, if any.
    pub fn find_duplicate(&self, candidate: &NewPost) -> Option<&Post> {
        self.state
            .posts
            .iter()
            .find(|existing| is_duplicate_of(candidate, existing))
    }

    /// Set or clear the rating. Returns false for an unknown id or a
    /// rating that is NaN or infinite.
    pub fn update_rating(&mut self, id: &str, rating: Option<f64>) -> StoreResult<bool> {
        if rating.is_some_and(|r| !r.is_finite()) {
            tracing::warn!("Ignoring non-finite rating {rating:?} for {id}");
            return Ok(false);
        }
        let Some(idx) = self.index_of(id) else {
            return Ok(false);
        };
        let mut next = self.state.clone();
        next.posts[idx].rating = rating;
        self.commit(next)?;
        Ok(true)
    }

    /// Set or clear the category label. Returns false for an unknown id.
    pub fn update_category(&mut self, id: &str, category: Option<String>) -> StoreResult<bool> {
        let Some(idx) = self.index_of(id) else {
            return Ok(false);
        };
        let mut next = self.state.clone();
        next.posts[idx].category = category;
        self.commit(next)?;
        Ok(true)
    }

    /// Remove a post. Returns false for an unknown id.
    pub fn delete_post(&mut self, id: &str) -> StoreResult<bool> {
        let Some(idx) = self.index_of(id) else {
            return Ok(false);
        };
        let mut next = self.state.clone();
        next.posts.remove(idx);
        next.clamp_index();
        self.commit(next)?;
        tracing::debug!("Deleted post {id}; pointer at {}", self.state.current_index);
        Ok(true)
    }

    /// Remove every post and reset the pointer.
    pub fn clear_all(&mut self) -> StoreResult<()> {
        let next = PostStoreState {
            version: self.state.version.clone(),
            ..PostStoreState::default()
        };
        self.commit(next)?;
        tracing::info!("Cleared post store {}", self.path.display());
        Ok(())
    }

    // ───────────────────────── navigation ─────────────────────────

    /// Jump to an absolute index. Returns false when out of range.
    pub fn go_to_index(&mut self, index: usize) -> StoreResult<bool> {
        if index >= self.len() {
            return Ok(false);
        }
        self.set_index(index)?;
        Ok(true)
    }

    /// Move the pointer towards the end, stopping at the last post.
    pub fn move_forward(&mut self, steps: usize) -> StoreResult<MoveOutcome> {
        let from = self.state.current_index;
        if steps == 0 {
            return Ok(MoveOutcome::Stayed { index: from });
        }
        let last = self.len().saturating_sub(1);
        let to = from.saturating_add(steps).min(last);
        self.move_to(from, to)
    }

    /// Move the pointer towards the start, stopping at the first post.
    pub fn move_backward(&mut self, steps: usize) -> StoreResult<MoveOutcome> {
        let from = self.state.current_index;
        if steps == 0 {
            return Ok(MoveOutcome::Stayed { index: from });
        }
        let to = from.saturating_sub(steps);
        self.move_to(from, to)
    }

    fn move_to(&mut self, from: usize, to: usize) -> StoreResult<MoveOutcome> {
        if from == to {
            return Ok(MoveOutcome::AtBoundary { index: from });
        }
        self.set_index(to)?;
        Ok(MoveOutcome::Moved { from, to })
    }

    fn set_index(&mut self, index: usize) -> StoreResult<()> {
        let mut next = self.state.clone();
        next.current_index = index;
        self.commit(next)
    }

    pub fn current_position(&self) -> Position {
        Position {
            current_index: self.state.current_index,
            total: self.len(),
            post: self.state.posts.get(self.state.current_index).cloned(),
        }
    }

    // ───────────────────────── pagination ─────────────────────────

    /// A window of up to `page_size` posts centered on
    /// `current_index + offset_from_current`, newest first.
    ///
    /// Near the end of the sequence the window slides back so it stays
    /// full. Never moves the pointer.
    pub fn get_posts(&self, page_size: usize, offset_from_current: i64) -> PostWindow {
        let total = self.len();
        let current_index = self.state.current_index;
        if total == 0 {
            return PostWindow {
                posts: Vec::new(),
                total_posts: 0,
                current_index,
                start: 0,
                end: 0,
                has_more: false,
                has_previous: false,
            };
        }

        let page_size = page_size.max(1);
        let target = (current_index as i64)
            .saturating_add(offset_from_current)
            .clamp(0, total as i64 - 1) as usize;
        let half = page_size / 2;

        let start = target.saturating_sub(half);
        let start = start.min(total.saturating_sub(page_size));
        let end = total.min(start + page_size);

        let mut posts = self.state.posts[start..end].to_vec();
        sort_newest_first(&mut posts);

        PostWindow {
            posts,
            total_posts: total,
            current_index,
            start,
            end,
            has_more: end < total,
            has_previous: start > 0,
        }
    }

    /// Offset paging over one category, newest first. `page` is zero-based.
    pub fn posts_by_category_paginated(
        &self,
        category: &str,
        page_size: usize,
        page: usize,
    ) -> CategoryPage {
        let page_size = page_size.max(1);
        let matching: Vec<Post> = self
            .posts_by_category(category)
            .into_iter()
            .cloned()
            .collect();
        let total = matching.len();
        let start = page.saturating_mul(page_size).min(total);
        let end = total.min(start.saturating_add(page_size));

        CategoryPage {
            posts: matching[start..end].to_vec(),
            category: category.to_string(),
            page,
            page_size,
            total,
            has_more: end < total,
        }
    }

    // ───────────────────────── queries ─────────────────────────

    pub fn get_post(&self, id: &str) -> Option<&Post> {
        self.state.posts.iter().find(|p| p.id == id)
    }

    /// Every post, newest first.
    pub fn all_posts(&self) -> Vec<&Post> {
        self.filtered(|_| true)
    }

    /// Posts with exactly this rating; `None` selects unrated posts.
    pub fn posts_by_rating(&self, rating: Option<f64>) -> Vec<&Post> {
        self.filtered(|p| p.rating == rating)
    }

    pub fn posts_by_platform(&self, platform: &str) -> Vec<&Post> {
        self.filtered(|p| p.platform.as_deref() == Some(platform))
    }

    pub fn posts_by_category(&self, category: &str) -> Vec<&Post> {
        self.filtered(|p| p.category.as_deref() == Some(category))
    }

    /// Distinct category labels, sorted.
    pub fn all_categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .state
            .posts
            .iter()
            .filter_map(|p| p.category.clone())
            .collect();
        categories.sort();
        categories.dedup();
        categories
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            total_posts: self.len(),
            ..StoreStats::default()
        };

        for post in &self.state.posts {
            let platform = post.platform.as_deref().unwrap_or(UNKNOWN_PLATFORM);
            *stats.by_platform.entry(platform.to_string()).or_default() += 1;

            match post.rating {
                Some(rating) => {
                    stats.rated_posts += 1;
                    *stats.by_rating.entry(rating.to_string()).or_default() += 1;
                }
                None => stats.unrated_posts += 1,
            }

            if let Some(category) = &post.category {
                *stats.by_category.entry(category.clone()).or_default() += 1;
            }
        }

        stats
    }

    fn filtered(&self, keep: impl Fn(&Post) -> bool) -> Vec<&Post> {
        let mut posts: Vec<&Post> = self.state.posts.iter().filter(|p| keep(p)).collect();
        posts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        posts
    }

    // ───────────────────────── ids ─────────────────────────

    fn generate_id(&self, candidate: &NewPost, now: DateTime<Utc>) -> String {
        let millis = now.timestamp_millis();
        let base = match (
            non_empty(&candidate.platform),
            non_empty(&candidate.platform_unique_id),
        ) {
            (Some(platform), Some(unique_id)) => format!("{platform}_{unique_id}_{millis}"),
            _ => {
                let source = if candidate.description.trim().is_empty() {
                    &candidate.screenshot_path
                } else {
                    &candidate.description
                };
                let slug = slugify(source, MAX_ID_SLUG);
                let slug = if slug.is_empty() { "post".to_string() } else { slug };
                format!("{slug}_{millis}")
            }
        };

        if self.get_post(&base).is_none() {
            return base;
        }
        // Same slug within the same millisecond.
        let mut n = 2;
        loop {
            let id = format!("{base}_{n}");
            if self.get_post(&id).is_none() {
                return id;
            }
            n += 1;
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Platform ids decide when both sides have one; otherwise content hashes
/// decide when both sides have one; otherwise `(description, screenshot)`.
fn is_duplicate_of(candidate: &NewPost, existing: &Post) -> bool {
    if let (Some(a), Some(b)) = (
        non_empty(&candidate.platform_unique_id),
        non_empty(&existing.platform_unique_id),
    ) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (
        non_empty(&candidate.content_hash),
        non_empty(&existing.content_hash),
    ) {
        return a == b;
    }
    candidate.description == existing.description
        && candidate.screenshot_path == existing.screenshot_path
}

fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
