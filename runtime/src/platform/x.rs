//! X (Twitter) home timeline.

use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;

use super::{derive_unique_id, ItemId, PlatformStrategy};
use crate::renderer::{ElementHandle, RenderContext};

pub const X_FEED_URL: &str = "https://x.com/home";
pub const X_ITEM_SELECTOR: &str = r#"article[data-testid="tweet"]"#;
const X_FALLBACK_SELECTORS: &[&str] = &[
    r#"article[role="article"]"#,
    r#"div[data-testid="cellInnerDiv"] article"#,
];
/// The permalink anchor wraps the timestamp.
pub const X_STATUS_LINK_SELECTOR: &str = r#"a[href*="/status/"]:has(time)"#;

fn status_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/status/(\d+)").expect("status id regex is valid"))
}

/// Numeric status id from a permalink such as `/jack/status/20`.
pub fn status_id_from_href(href: &str) -> Option<String> {
    status_id_re()
        .captures(href)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[derive(Debug, Clone)]
pub struct XStrategy {
    feed_url: String,
    timeout: Duration,
}

impl Default for XStrategy {
    fn default() -> Self {
        Self {
            feed_url: X_FEED_URL.to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl XStrategy {
    pub fn with_feed_url(mut self, url: impl Into<String>) -> Self {
        self.feed_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl PlatformStrategy for XStrategy {
    fn name(&self) -> &str {
        "x"
    }

    fn feed_url(&self) -> &str {
        &self.feed_url
    }

    fn item_selector(&self) -> &str {
        X_ITEM_SELECTOR
    }

    fn fallback_selectors(&self) -> &[&'static str] {
        X_FALLBACK_SELECTORS
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn unique_id(&self, page: &dyn RenderContext, item: &ElementHandle) -> Result<ItemId> {
        let native = page
            .attribute_within(item, Some(X_STATUS_LINK_SELECTOR), "href")
            .await?
            .as_deref()
            .and_then(status_id_from_href);
        let text = match native {
            Some(_) => None,
            None => page.element_text(item).await?,
        };
        Ok(derive_unique_id(native.as_deref(), text.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::IdSource;
    use crate::renderer::scripted::{FeedScript, ScriptedItem, ScriptedPage};

    #[test]
    fn test_status_id_from_href() {
        assert_eq!(
            status_id_from_href("/jack/status/20").as_deref(),
            Some("20")
        );
        assert_eq!(
            status_id_from_href("https://x.com/a/status/1790000000000000001/photo/1").as_deref(),
            Some("1790000000000000001")
        );
        assert_eq!(status_id_from_href("/a/likes"), None);
    }

    #[tokio::test]
    async fn test_unique_id_from_permalink_then_text() {
        let script = FeedScript::new(
            X_ITEM_SELECTOR,
            vec![
                ScriptedItem::new("gm").with_attribute(
                    Some(X_STATUS_LINK_SELECTOR),
                    "href",
                    "/someone/status/42",
                ),
                ScriptedItem::new("Promoted: buy things"),
            ],
        );
        let page = ScriptedPage::with_feed(script);
        let items = page.query_all(X_ITEM_SELECTOR).await.unwrap();
        let strategy = XStrategy::default();

        let first = strategy.unique_id(&page, &items[0]).await.unwrap();
        assert_eq!(first.value, "42");
        assert_eq!(first.source, IdSource::Native);

        let second = strategy.unique_id(&page, &items[1]).await.unwrap();
        assert_eq!(second.value, "promoted_buy_things");
        assert_eq!(second.source, IdSource::TextSlug);
    }
}
