//! Renderer abstraction for browser-driven feed pages.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (Chromium via chromiumoxide, or the in-memory
//! scripted feed used by tests).
//!
//! Only a handful of `RenderContext` methods are required. The element
//! helpers (`element_top`, `attribute_within`, `click_within`, ...) and the
//! page helpers (`scroll_by`, `wait_for_selector`, ...) have provided
//! implementations built on `evaluate_on_element` / `execute_js`.

pub mod chromium;
#[cfg(any(test, feature = "test-support"))]
pub mod scripted;

use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How often `wait_for_selector` re-checks the page.
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// Opaque reference to an element returned by [`RenderContext::query_all`].
///
/// Handles are only valid until the next `query_all` on the same context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    pub key: u64,
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab).
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the current URL.
    async fn get_url(&self) -> Result<String>;
    /// All elements matching `selector`, in document order.
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>>;
    /// Evaluate a JS function expression with `this` bound to the element.
    /// The return value must be JSON-serializable.
    async fn evaluate_on_element(
        &self,
        element: &ElementHandle,
        function: &str,
    ) -> Result<serde_json::Value>;
    /// PNG snapshot clipped to the element's bounds.
    async fn screenshot_element(&self, element: &ElementHandle) -> Result<Vec<u8>>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;

    /// Number of elements currently matching `selector`.
    async fn count_matching(&self, selector: &str) -> Result<usize> {
        let script = format!(
            "document.querySelectorAll({}).length",
            js_string(selector)
        );
        let value = self.execute_js(&script).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| anyhow!("unexpected count result: {value}"))
    }

    /// Poll until `selector` matches something or `timeout` elapses.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.count_matching(selector).await {
                Ok(n) if n > 0 => return Ok(true),
                Ok(_) => {}
                // The page may still be navigating.
                Err(e) => tracing::debug!("selector poll failed for {selector}: {e}"),
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn viewport_height(&self) -> Result<f64> {
        let value = self.execute_js("window.innerHeight").await?;
        value
            .as_f64()
            .ok_or_else(|| anyhow!("unexpected viewport height: {value}"))
    }

    async fn scroll_by(&self, dy: i64) -> Result<()> {
        self.execute_js(&format!("window.scrollBy(0, {dy}); true"))
            .await
            .map(|_| ())
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.execute_js("window.scrollTo(0, document.body.scrollHeight); true")
            .await
            .map(|_| ())
    }

    /// Top edge of the element relative to the viewport, in CSS pixels.
    async fn element_top(&self, element: &ElementHandle) -> Result<f64> {
        let value = self
            .evaluate_on_element(element, "function() { return this.getBoundingClientRect().top; }")
            .await?;
        value
            .as_f64()
            .ok_or_else(|| anyhow!("unexpected bounding rect: {value}"))
    }

    async fn scroll_into_center(&self, element: &ElementHandle) -> Result<()> {
        self.evaluate_on_element(
            element,
            "function() { this.scrollIntoView({ block: 'center', inline: 'nearest' }); return true; }",
        )
        .await
        .map(|_| ())
    }

    /// Rendered text of the element.
    async fn element_text(&self, element: &ElementHandle) -> Result<Option<String>> {
        let value = self
            .evaluate_on_element(
                element,
                "function() { return this.innerText || this.textContent || null; }",
            )
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    /// Attribute `name` of the first descendant matching `selector`, or of
    /// the element itself when `selector` is `None`.
    async fn attribute_within(
        &self,
        element: &ElementHandle,
        selector: Option<&str>,
        name: &str,
    ) -> Result<Option<String>> {
        let selector = selector.map(js_string).unwrap_or_else(|| "null".to_string());
        let function = format!(
            "function() {{ const n = {selector} ? this.querySelector({selector}) : this; \
             return n ? n.getAttribute({}) : null; }}",
            js_string(name)
        );
        let value = self.evaluate_on_element(element, &function).await?;
        Ok(value.as_str().map(str::to_string))
    }

    /// Click the first visible, not-yet-expanded descendant matching
    /// `selector`, then drop focus so the snapshot has no focus ring.
    /// Returns whether anything was clicked.
    async fn click_within(&self, element: &ElementHandle, selector: &str) -> Result<bool> {
        let function = format!(
            "function() {{ \
               const btn = Array.from(this.querySelectorAll({})) \
                 .find(b => b.offsetParent !== null && b.getAttribute('aria-expanded') !== 'true'); \
               if (!btn) return false; \
               btn.click(); \
               const active = document.activeElement; \
               if (active && active !== document.body) active.blur(); \
               return true; \
             }}",
            js_string(selector)
        );
        let value = self.evaluate_on_element(element, &function).await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}

/// Quote `raw` as a JS string literal.
pub fn js_string(raw: &str) -> String {
    serde_json::Value::String(raw.to_string()).to_string()
}
