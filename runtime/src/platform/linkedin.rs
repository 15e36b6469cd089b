//! LinkedIn home feed.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use super::{derive_unique_id, ItemId, PlatformStrategy};
use crate::renderer::{ElementHandle, RenderContext};

pub const LINKEDIN_FEED_URL: &str = "https://www.linkedin.com/feed/";
pub const LINKEDIN_ITEM_SELECTOR: &str = "div.feed-shared-update-v2";
const LINKEDIN_FALLBACK_SELECTORS: &[&str] = &[
    r#"div[data-urn^="urn:li:activity"]"#,
    r#"div[data-id^="urn:li:activity"]"#,
];
pub const LINKEDIN_SEE_MORE_SELECTOR: &str =
    ".feed-shared-inline-show-more-text__see-more-less-toggle";

#[derive(Debug, Clone)]
pub struct LinkedInStrategy {
    feed_url: String,
    timeout: Duration,
    expand_delay: Duration,
}

impl Default for LinkedInStrategy {
    fn default() -> Self {
        Self {
            feed_url: LINKEDIN_FEED_URL.to_string(),
            timeout: Duration::from_secs(20),
            expand_delay: Duration::from_millis(800),
        }
    }
}

impl LinkedInStrategy {
    pub fn with_feed_url(mut self, url: impl Into<String>) -> Self {
        self.feed_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_expand_delay(mut self, delay: Duration) -> Self {
        self.expand_delay = delay;
        self
    }
}

#[async_trait]
impl PlatformStrategy for LinkedInStrategy {
    fn name(&self) -> &str {
        "linkedin"
    }

    fn feed_url(&self) -> &str {
        &self.feed_url
    }

    fn item_selector(&self) -> &str {
        LINKEDIN_ITEM_SELECTOR
    }

    fn fallback_selectors(&self) -> &[&'static str] {
        LINKEDIN_FALLBACK_SELECTORS
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn expand_delay(&self) -> Duration {
        self.expand_delay
    }

    fn supports_expansion(&self) -> bool {
        true
    }

    async fn unique_id(&self, page: &dyn RenderContext, item: &ElementHandle) -> Result<ItemId> {
        let mut native = None;
        for attr in ["data-urn", "data-id"] {
            if let Some(value) = page.attribute_within(item, None, attr).await? {
                if !value.trim().is_empty() {
                    native = Some(value);
                    break;
                }
            }
        }
        let text = match native {
            Some(_) => None,
            None => page.element_text(item).await?,
        };
        Ok(derive_unique_id(native.as_deref(), text.as_deref()))
    }

    async fn expand_content(&self, page: &dyn RenderContext, item: &ElementHandle) -> Result<bool> {
        page.click_within(item, LINKEDIN_SEE_MORE_SELECTOR).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::IdSource;
    use crate::renderer::scripted::{FeedScript, ScriptedItem, ScriptedPage};

    #[tokio::test]
    async fn test_unique_id_prefers_urn() {
        let script = FeedScript::new(
            LINKEDIN_ITEM_SELECTOR,
            vec![
                ScriptedItem::new("Hiring!")
                    .with_attribute(None, "data-urn", "urn:li:activity:7001")
                    .with_attribute(None, "data-id", "urn:li:activity:other"),
                ScriptedItem::new("Update").with_attribute(None, "data-id", "urn:li:activity:7002"),
                ScriptedItem::new("No metadata at all"),
            ],
        );
        let page = ScriptedPage::with_feed(script);
        let items = page.query_all(LINKEDIN_ITEM_SELECTOR).await.unwrap();
        let strategy = LinkedInStrategy::default();

        let ids: Vec<ItemId> = futures::future::try_join_all(
            items.iter().map(|item| strategy.unique_id(&page, item)),
        )
        .await
        .unwrap();
        assert_eq!(ids[0].value, "urn:li:activity:7001");
        assert_eq!(ids[1].value, "urn:li:activity:7002");
        assert_eq!(ids[2].value, "no_metadata_at_all");
        assert_eq!(ids[2].source, IdSource::TextSlug);
    }

    #[tokio::test]
    async fn test_expand_content_clicks_see_more() {
        let script = FeedScript::new(
            LINKEDIN_ITEM_SELECTOR,
            vec![
                ScriptedItem::new("long").expandable(LINKEDIN_SEE_MORE_SELECTOR),
                ScriptedItem::new("short"),
            ],
        );
        let page = ScriptedPage::with_feed(script);
        let items = page.query_all(LINKEDIN_ITEM_SELECTOR).await.unwrap();
        let strategy = LinkedInStrategy::default();

        assert!(strategy.expand_content(&page, &items[0]).await.unwrap());
        assert!(!strategy.expand_content(&page, &items[1]).await.unwrap());
    }
}
