//! CLI subcommand implementations for the feedreel binary.

pub mod harvest_cmd;
pub mod nav_cmd;
pub mod output;
pub mod posts_cmd;
pub mod stats_cmd;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use feedreel::{Post, PostStore};
use feedreel_runtime::config::{resolve_store_path, HarvestConfig};

/// Resolved configuration shared by every command.
pub struct CliContext {
    pub config: HarvestConfig,
    pub store_path: PathBuf,
}

impl CliContext {
    pub fn load(store: Option<&Path>, config_file: Option<&Path>) -> Result<Self> {
        let config = HarvestConfig::load(config_file)?;
        let store_path = resolve_store_path(store, config.store_path.as_deref());
        Ok(Self { config, store_path })
    }

    pub fn open_store(&self) -> Result<PostStore> {
        PostStore::open(&self.store_path)
            .with_context(|| format!("failed to open store {}", self.store_path.display()))
    }
}

/// One-line human summary of a post.
pub(crate) fn post_line(post: &Post) -> String {
    let rating = post
        .rating
        .map(|r| format!("{r:>4}"))
        .unwrap_or_else(|| "   -".to_string());
    format!(
        "{:<36} {rating}  {:<9} {:<14} {}",
        post.id,
        post.platform.as_deref().unwrap_or("-"),
        post.category.as_deref().unwrap_or("-"),
        output::truncate(&post.description, 60)
    )
}
