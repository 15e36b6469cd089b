//! In-memory feed page that behaves like a lazily loading feed.
//!
//! Items are laid out vertically at a fixed height. Scrolling near the
//! bottom renders the next batch. No JavaScript runs: every element helper
//! of [`RenderContext`] is answered from the script directly, and
//! `execute_js` / `evaluate_on_element` return errors.

use super::{ElementHandle, NavigationResult, RenderContext, Renderer};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One rendered feed item.
#[derive(Debug, Clone, Default)]
pub struct ScriptedItem {
    pub text: String,
    /// `(descendant selector or None for the item itself, attribute, value)`.
    pub attributes: Vec<(Option<String>, String, String)>,
    /// Selector of a "show more" control inside the item.
    pub expand_selector: Option<String>,
    /// Screenshots of this item fail.
    pub fail_screenshot: bool,
    /// Clicking the "show more" control fails.
    pub fail_expand: bool,
}

impl ScriptedItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, selector: Option<&str>, name: &str, value: &str) -> Self {
        self.attributes
            .push((selector.map(str::to_string), name.to_string(), value.to_string()));
        self
    }

    pub fn expandable(mut self, selector: &str) -> Self {
        self.expand_selector = Some(selector.to_string());
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_screenshot = true;
        self
    }

    pub fn failing_expansion(mut self) -> Self {
        self.fail_expand = true;
        self
    }
}

/// The content of one scripted feed.
#[derive(Debug, Clone)]
pub struct FeedScript {
    /// Selectors that match feed items. Anything else matches nothing.
    pub selectors: Vec<String>,
    pub items: Vec<ScriptedItem>,
    /// Items rendered before any scrolling.
    pub initially_rendered: usize,
    /// Items added each time a scroll reaches the bottom region.
    pub batch: usize,
    pub viewport_height: f64,
    pub item_height: f64,
}

impl FeedScript {
    pub fn new(selector: &str, items: Vec<ScriptedItem>) -> Self {
        Self {
            selectors: vec![selector.to_string()],
            initially_rendered: items.len(),
            items,
            batch: 0,
            viewport_height: 800.0,
            item_height: 300.0,
        }
    }

    pub fn lazy(mut self, initially_rendered: usize, batch: usize) -> Self {
        self.initially_rendered = initially_rendered.min(self.items.len());
        self.batch = batch;
        self
    }

    pub fn with_item_height(mut self, px: f64) -> Self {
        self.item_height = px;
        self
    }
}

/// Counters for assertions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptedStats {
    pub scrolls: u32,
    pub bottom_scrolls: u32,
    pub expansions: u32,
    pub screenshots: u32,
}

#[derive(Debug, Default)]
struct PageState {
    url: String,
    script: Option<FeedScript>,
    rendered: usize,
    scroll_y: f64,
    expanded: HashSet<usize>,
    stats: ScriptedStats,
}

impl PageState {
    fn load(&mut self, script: Option<FeedScript>) {
        self.rendered = script.as_ref().map_or(0, |s| s.initially_rendered);
        self.script = script;
        self.scroll_y = 0.0;
        self.expanded.clear();
    }

    fn script(&self) -> Result<&FeedScript> {
        self.script.as_ref().ok_or_else(|| anyhow!("blank page"))
    }

    fn item(&self, element: &ElementHandle) -> Result<(usize, &ScriptedItem)> {
        let idx = element.key as usize;
        if idx >= self.rendered {
            bail!("stale element handle {}", element.key);
        }
        let item = self
            .script()?
            .items
            .get(idx)
            .ok_or_else(|| anyhow!("stale element handle {}", element.key))?;
        Ok((idx, item))
    }

    fn max_scroll(&self) -> f64 {
        self.script.as_ref().map_or(0.0, |s| {
            (self.rendered as f64 * s.item_height - s.viewport_height).max(0.0)
        })
    }

    fn set_scroll(&mut self, y: f64) {
        self.scroll_y = y.clamp(0.0, self.max_scroll());
    }

    /// Render the next batch when the viewport is within one item of the end.
    fn maybe_load_more(&mut self) {
        let Some(script) = &self.script else {
            return;
        };
        let content = self.rendered as f64 * script.item_height;
        if self.scroll_y + script.viewport_height >= content - script.item_height {
            self.rendered = (self.rendered + script.batch).min(script.items.len());
        }
    }

    fn matches(&self, selector: &str) -> bool {
        self.script
            .as_ref()
            .is_some_and(|s| s.selectors.iter().any(|sel| sel == selector))
    }
}

/// A page backed by [`FeedScript`]s instead of a browser.
pub struct ScriptedPage {
    feeds: Arc<HashMap<String, FeedScript>>,
    state: Mutex<PageState>,
    active_count: Option<Arc<AtomicUsize>>,
}

impl ScriptedPage {
    /// A page already showing `script`.
    pub fn with_feed(script: FeedScript) -> Self {
        let mut state = PageState::default();
        state.load(Some(script));
        Self {
            feeds: Arc::new(HashMap::new()),
            state: Mutex::new(state),
            active_count: None,
        }
    }

    pub fn stats(&self) -> ScriptedStats {
        self.lock().stats
    }

    pub fn rendered(&self) -> usize {
        self.lock().rendered
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RenderContext for ScriptedPage {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        let script = self.feeds.get(url).cloned();
        let mut state = self.lock();
        state.url = url.to_string();
        state.load(script);
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 0,
        })
    }

    async fn execute_js(&self, _script: &str) -> Result<serde_json::Value> {
        bail!("scripted page does not run JavaScript")
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self.lock().url.clone())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let state = self.lock();
        if !state.matches(selector) {
            return Ok(Vec::new());
        }
        Ok((0..state.rendered)
            .map(|i| ElementHandle { key: i as u64 })
            .collect())
    }

    async fn evaluate_on_element(
        &self,
        _element: &ElementHandle,
        _function: &str,
    ) -> Result<serde_json::Value> {
        bail!("scripted page does not run JavaScript")
    }

    async fn screenshot_element(&self, element: &ElementHandle) -> Result<Vec<u8>> {
        let mut state = self.lock();
        let (idx, item) = state.item(element)?;
        if item.fail_screenshot {
            bail!("screenshot failed for item {idx}");
        }
        let png = render_png(&item.text, state.expanded.contains(&idx))?;
        state.stats.screenshots += 1;
        Ok(png)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        if let Some(count) = &self.active_count {
            count.fetch_sub(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn count_matching(&self, selector: &str) -> Result<usize> {
        let state = self.lock();
        Ok(if state.matches(selector) { state.rendered } else { 0 })
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<bool> {
        Ok(self.count_matching(selector).await? > 0)
    }

    async fn viewport_height(&self) -> Result<f64> {
        Ok(self.lock().script()?.viewport_height)
    }

    async fn scroll_by(&self, dy: i64) -> Result<()> {
        let mut state = self.lock();
        let y = state.scroll_y + dy as f64;
        state.set_scroll(y);
        state.maybe_load_more();
        state.stats.scrolls += 1;
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        let mut state = self.lock();
        let y = state.max_scroll();
        state.set_scroll(y);
        state.maybe_load_more();
        state.stats.bottom_scrolls += 1;
        Ok(())
    }

    async fn element_top(&self, element: &ElementHandle) -> Result<f64> {
        let state = self.lock();
        let (idx, _) = state.item(element)?;
        Ok(idx as f64 * state.script()?.item_height - state.scroll_y)
    }

    async fn scroll_into_center(&self, element: &ElementHandle) -> Result<()> {
        let mut state = self.lock();
        let (idx, _) = state.item(element)?;
        let script = state.script()?;
        let y = idx as f64 * script.item_height + script.item_height / 2.0
            - script.viewport_height / 2.0;
        state.set_scroll(y);
        Ok(())
    }

    async fn element_text(&self, element: &ElementHandle) -> Result<Option<String>> {
        let state = self.lock();
        let (_, item) = state.item(element)?;
        Ok(Some(item.text.clone()).filter(|t| !t.is_empty()))
    }

    async fn attribute_within(
        &self,
        element: &ElementHandle,
        selector: Option<&str>,
        name: &str,
    ) -> Result<Option<String>> {
        let state = self.lock();
        let (_, item) = state.item(element)?;
        Ok(item
            .attributes
            .iter()
            .find(|(sel, attr, _)| sel.as_deref() == selector && attr == name)
            .map(|(_, _, value)| value.clone()))
    }

    async fn click_within(&self, element: &ElementHandle, selector: &str) -> Result<bool> {
        let mut state = self.lock();
        let (idx, item) = state.item(element)?;
        let clickable = item.expand_selector.as_deref() == Some(selector);
        if clickable && item.fail_expand {
            bail!("click on {selector} in item {idx} was intercepted");
        }
        if !clickable || state.expanded.contains(&idx) {
            return Ok(false);
        }
        state.expanded.insert(idx);
        state.stats.expansions += 1;
        Ok(true)
    }
}

/// Hands out [`ScriptedPage`]s that load a registered feed on `navigate`.
pub struct ScriptedRenderer {
    feeds: Arc<HashMap<String, FeedScript>>,
    active_count: Arc<AtomicUsize>,
}

impl ScriptedRenderer {
    /// `feeds` maps a URL to the feed shown after navigating there.
    /// Unregistered URLs show a blank page.
    pub fn new(feeds: HashMap<String, FeedScript>) -> Self {
        Self {
            feeds: Arc::new(feeds),
            active_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        self.active_count.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(ScriptedPage {
            feeds: Arc::clone(&self.feeds),
            state: Mutex::new(PageState::default()),
            active_count: Some(Arc::clone(&self.active_count)),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// Solid-color PNG derived from `seed`; expanded items render taller.
fn render_png(seed: &str, expanded: bool) -> Result<Vec<u8>> {
    let hash = seed
        .bytes()
        .fold(0x811c_9dc5_u32, |h, b| (h ^ u32::from(b)).wrapping_mul(0x0100_0193));
    let [r, g, b, _] = hash.to_le_bytes();
    let height = if expanded { 8 } else { 4 };
    let img = image::RgbImage::from_pixel(8, height, image::Rgb([r, g, b]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}
