//! Chromium-based renderer using chromiumoxide.

use super::{ElementHandle, NavigationResult, RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. FEEDREEL_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("FEEDREEL_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// How to launch Chromium.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Explicit binary; discovered with [`find_chromium`] when `None`.
    pub chromium_path: Option<PathBuf>,
    /// Profile directory. Point this at a profile that is already logged
    /// in to the feeds being harvested.
    pub user_data_dir: Option<PathBuf>,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            chromium_path: None,
            user_data_dir: None,
            headless: true,
            window_width: 1280,
            window_height: 900,
        }
    }
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Browser,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a Chromium instance.
    pub async fn new(options: &LaunchOptions) -> Result<Self> {
        let chrome_path = match &options.chromium_path {
            Some(path) => path.clone(),
            None => find_chromium()
                .context("Chromium not found. Set FEEDREEL_CHROMIUM_PATH or install Chrome.")?,
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(options.window_width, options.window_height)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking");

        if options.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        if let Some(dir) = &options.user_data_dir {
            builder = builder.user_data_dir(dir);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Spawn the handler task
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        tracing::info!(
            "Chromium launched (headless: {}, profile: {})",
            options.headless,
            options
                .user_data_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "temporary".to_string())
        );

        Ok(Self {
            browser,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            elements: Mutex::new(HashMap::new()),
            next_key: AtomicU64::new(1),
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        // Browser is dropped when ChromiumRenderer is dropped
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    /// Elements from the latest `query_all`, by handle key.
    elements: Mutex<HashMap<u64, Element>>,
    next_key: AtomicU64,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            self.page.goto(url),
        )
        .await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_response)) => {
                // Wait for page to be loaded
                let _ = self.page.wait_for_navigation().await;

                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn get_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let found = self
            .page
            .find_elements(selector)
            .await
            .with_context(|| format!("query failed: {selector}"))?;

        let mut elements = self.elements.lock().await;
        elements.clear();
        let mut handles = Vec::with_capacity(found.len());
        for element in found {
            let key = self.next_key.fetch_add(1, Ordering::Relaxed);
            elements.insert(key, element);
            handles.push(ElementHandle { key });
        }
        Ok(handles)
    }

    async fn evaluate_on_element(
        &self,
        element: &ElementHandle,
        function: &str,
    ) -> Result<serde_json::Value> {
        // Round-trip through JSON.stringify so objects come back by value.
        let wrapped = format!(
            "async function() {{ const r = await ({function}).call(this); \
             return r === undefined ? null : JSON.stringify(r); }}"
        );

        let elements = self.elements.lock().await;
        let el = elements
            .get(&element.key)
            .with_context(|| format!("stale element handle {}", element.key))?;
        let returns = el
            .call_js_fn(wrapped, true)
            .await
            .context("element JS evaluation failed")?;

        match returns.result.value {
            Some(serde_json::Value::String(json)) => {
                serde_json::from_str(&json).context("element JS returned invalid JSON")
            }
            _ => Ok(serde_json::Value::Null),
        }
    }

    async fn screenshot_element(&self, element: &ElementHandle) -> Result<Vec<u8>> {
        let elements = self.elements.lock().await;
        let el = elements
            .get(&element.key)
            .with_context(|| format!("stale element handle {}", element.key))?;
        el.screenshot(CaptureScreenshotFormat::Png)
            .await
            .context("element screenshot failed")
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_query_and_snapshot() {
        let renderer = ChromiumRenderer::new(&LaunchOptions::default())
            .await
            .expect("failed to create renderer");
        let mut ctx = renderer
            .new_context()
            .await
            .expect("failed to create context");

        ctx.navigate(
            "data:text/html,<article data-id='a1' style='height:200px'>Hello</article>\
             <article data-id='a2' style='height:200px'>World</article>",
            10000,
        )
        .await
        .expect("navigation failed");

        assert!(ctx
            .wait_for_selector("article", std::time::Duration::from_secs(5))
            .await
            .unwrap());

        let items = ctx.query_all("article").await.expect("query failed");
        assert_eq!(items.len(), 2);

        let id = ctx
            .attribute_within(&items[1], None, "data-id")
            .await
            .expect("attribute lookup failed");
        assert_eq!(id.as_deref(), Some("a2"));

        let text = ctx.element_text(&items[0]).await.unwrap();
        assert_eq!(text.as_deref(), Some("Hello"));

        let png = ctx.screenshot_element(&items[0]).await.expect("screenshot failed");
        assert!(feedreel::snapshot_dimensions(&png).is_ok());

        ctx.close().await.expect("close failed");
        assert_eq!(renderer.active_contexts(), 0);

        renderer.shutdown().await.expect("shutdown failed");
    }
}
