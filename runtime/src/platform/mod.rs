//! Per-platform feed rules.
//!
//! A [`PlatformStrategy`] tells the capture engine which elements are feed
//! items, how to derive a stable id for one, and how to expand truncated
//! content. The engine only talks to the trait.

pub mod linkedin;
pub mod x;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::renderer::{ElementHandle, RenderContext};

pub use linkedin::LinkedInStrategy;
pub use x::XStrategy;

/// Longest text slug used as an item id.
const MAX_TEXT_ID_LEN: usize = 48;

/// Where an item id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdSource {
    /// Platform metadata (status id, activity URN).
    Native,
    /// Slug of the rendered text.
    TextSlug,
    /// Random token; not stable across sessions.
    Random,
}

/// A derived item id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemId {
    pub value: String,
    pub source: IdSource,
}

impl ItemId {
    /// Whether the id identifies the post across sessions.
    pub fn is_stable(&self) -> bool {
        self.source != IdSource::Random
    }
}

/// Stable platform id, else a slug of the visible text, else a random token.
pub fn derive_unique_id(native: Option<&str>, text: Option<&str>) -> ItemId {
    if let Some(native) = native.map(str::trim).filter(|s| !s.is_empty()) {
        return ItemId {
            value: native.to_string(),
            source: IdSource::Native,
        };
    }
    let slug = text
        .map(|t| feedreel::slugify(t, MAX_TEXT_ID_LEN))
        .unwrap_or_default();
    if !slug.is_empty() {
        return ItemId {
            value: slug,
            source: IdSource::TextSlug,
        };
    }
    ItemId {
        value: format!("rand_{}", uuid::Uuid::new_v4().simple()),
        source: IdSource::Random,
    }
}

/// Rules for one platform's feed.
#[async_trait]
pub trait PlatformStrategy: Send + Sync {
    /// Short lowercase name, used in paths and as the stored `platform`.
    fn name(&self) -> &str;

    /// Page that shows the feed.
    fn feed_url(&self) -> &str;

    /// Primary selector for feed items.
    fn item_selector(&self) -> &str;

    /// Tried in order when the primary selector finds nothing.
    fn fallback_selectors(&self) -> &[&'static str] {
        &[]
    }

    /// How long to wait for the primary selector.
    fn timeout(&self) -> Duration;

    /// Extra settle time after a successful expansion.
    fn expand_delay(&self) -> Duration {
        Duration::ZERO
    }

    fn supports_expansion(&self) -> bool {
        false
    }

    async fn unique_id(&self, page: &dyn RenderContext, item: &ElementHandle) -> Result<ItemId>;

    /// Reveal truncated content. Returns whether anything changed.
    async fn expand_content(
        &self,
        _page: &dyn RenderContext,
        _item: &ElementHandle,
    ) -> Result<bool> {
        Ok(false)
    }
}

/// Supported platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    X,
    LinkedIn,
}

impl Platform {
    pub fn all() -> &'static [Platform] {
        &[Platform::X, Platform::LinkedIn]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::X => "x",
            Platform::LinkedIn => "linkedin",
        }
    }

    pub fn strategy(&self) -> Box<dyn PlatformStrategy> {
        match self {
            Platform::X => Box::new(XStrategy::default()),
            Platform::LinkedIn => Box::new(LinkedInStrategy::default()),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" | "twitter" => Ok(Platform::X),
            "linkedin" => Ok(Platform::LinkedIn),
            other => Err(format!("unknown platform '{other}' (expected x or linkedin)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_unique_id_prefers_native() {
        let id = derive_unique_id(Some(" 12345 "), Some("Hello world"));
        assert_eq!(id.value, "12345");
        assert_eq!(id.source, IdSource::Native);
    }

    #[test]
    fn test_derive_unique_id_falls_back_to_text() {
        let id = derive_unique_id(Some(""), Some("Hello, World!"));
        assert_eq!(id.value, "hello_world");
        assert_eq!(id.source, IdSource::TextSlug);
        assert!(id.is_stable());
    }

    #[test]
    fn test_derive_unique_id_random_when_nothing_usable() {
        let a = derive_unique_id(None, Some("!!!"));
        let b = derive_unique_id(None, None);
        assert_eq!(a.source, IdSource::Random);
        assert!(!a.is_stable());
        assert_ne!(a.value, b.value);
    }

    #[test]
    fn test_platform_parse() {
        assert_eq!("X".parse::<Platform>().unwrap(), Platform::X);
        assert_eq!("twitter".parse::<Platform>().unwrap(), Platform::X);
        assert_eq!("LinkedIn".parse::<Platform>().unwrap(), Platform::LinkedIn);
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn test_strategy_names_match_platform() {
        for platform in Platform::all() {
            assert_eq!(platform.strategy().name(), platform.as_str());
        }
    }
}
