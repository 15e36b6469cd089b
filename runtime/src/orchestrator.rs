//! Harvest orchestration: capture each platform's feed, classify every
//! snapshot, and add the results to the shared store.
//!
//! Platforms run as independent tokio tasks, each on its own page. All
//! store writes go through one `Arc<Mutex<PostStore>>`. A failing platform
//! is reported and never affects the others.

use std::sync::Arc;

use anyhow::{Context, Result};
use feedreel::{CapturedItem, NewPost, PostStore};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::capture::{AbortReason, CaptureConfig, CaptureOutcome, FeedScrollCapture};
use crate::classifier::{fallback_description, Classifier, Review};
use crate::platform::PlatformStrategy;
use crate::progress::{CancelFlag, ProgressSender};
use crate::renderer::Renderer;

/// Per-platform result of a harvest.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HarvestReport {
    pub platform: String,
    pub captured: usize,
    pub added: usize,
    pub duplicates: usize,
    pub element_failures: usize,
    pub classifier_failures: usize,
    /// Set when capture ended before the target.
    pub abort_reason: Option<AbortReason>,
    /// Set when the platform failed outright.
    pub error: Option<String>,
}

impl HarvestReport {
    fn new(platform: &str) -> Self {
        Self {
            platform: platform.to_string(),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs harvests against one renderer, classifier and store.
#[derive(Clone)]
pub struct Orchestrator {
    renderer: Arc<dyn Renderer>,
    classifier: Arc<dyn Classifier>,
    store: Arc<Mutex<PostStore>>,
    capture: CaptureConfig,
    categories: Arc<Vec<String>>,
    navigation_timeout_ms: u64,
    progress: Option<ProgressSender>,
    cancel: CancelFlag,
}

impl Orchestrator {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        classifier: Arc<dyn Classifier>,
        store: Arc<Mutex<PostStore>>,
        capture: CaptureConfig,
    ) -> Self {
        Self {
            renderer,
            classifier,
            store,
            capture,
            categories: Arc::new(Vec::new()),
            navigation_timeout_ms: 30_000,
            progress: None,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = Arc::new(categories);
        self
    }

    pub fn with_navigation_timeout(mut self, timeout_ms: u64) -> Self {
        self.navigation_timeout_ms = timeout_ms;
        self
    }

    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Harvest every platform concurrently. Reports come back in input order.
    pub async fn run(&self, strategies: Vec<Box<dyn PlatformStrategy>>) -> Vec<HarvestReport> {
        let mut names = Vec::with_capacity(strategies.len());
        let mut handles = Vec::with_capacity(strategies.len());
        for strategy in strategies {
            names.push(strategy.name().to_string());
            let this = self.clone();
            let strategy: Arc<dyn PlatformStrategy> = Arc::from(strategy);
            handles.push(tokio::spawn(async move {
                this.harvest_platform(strategy.as_ref()).await
            }));
        }

        let results = futures::future::join_all(handles).await;
        names
            .into_iter()
            .zip(results)
            .map(|(name, joined)| match joined {
                Ok(report) => report,
                Err(e) => {
                    warn!("{name}: harvest task failed: {e}");
                    HarvestReport {
                        error: Some(format!("harvest task failed: {e}")),
                        ..HarvestReport::new(&name)
                    }
                }
            })
            .collect()
    }

    /// Harvest one platform. Failures end up in the report.
    pub async fn harvest_platform(&self, strategy: &dyn PlatformStrategy) -> HarvestReport {
        let mut report = HarvestReport::new(strategy.name());
        if let Err(e) = self.try_harvest(strategy, &mut report).await {
            warn!("{}: harvest failed: {e:#}", strategy.name());
            report.error = Some(format!("{e:#}"));
        }
        info!(
            "{}: captured {}, added {}, duplicates {}",
            report.platform, report.captured, report.added, report.duplicates
        );
        report
    }

    async fn try_harvest(
        &self,
        strategy: &dyn PlatformStrategy,
        report: &mut HarvestReport,
    ) -> Result<()> {
        let mut page = self
            .renderer
            .new_context()
            .await
            .context("failed to open a page")?;

        let captured = async {
            page.navigate(strategy.feed_url(), self.navigation_timeout_ms)
                .await
                .with_context(|| format!("failed to open {}", strategy.feed_url()))?;

            let mut capture = FeedScrollCapture::new(&*page, strategy, self.capture.clone())
                .with_cancel(self.cancel.clone());
            if let Some(tx) = &self.progress {
                capture = capture.with_progress(tx.clone());
            }
            capture.run().await.map_err(anyhow::Error::from)
        }
        .await;

        if let Err(e) = page.close().await {
            debug!("{}: page close failed: {e:#}", strategy.name());
        }

        let outcome: CaptureOutcome = captured?;
        report.captured = outcome.items.len();
        report.element_failures = outcome.element_failures;
        report.abort_reason = outcome.abort_reason().cloned();

        for item in &outcome.items {
            self.ingest(item, report).await?;
        }
        Ok(())
    }

    /// Classify one item and add it to the store.
    async fn ingest(&self, item: &CapturedItem, report: &mut HarvestReport) -> Result<()> {
        let review = match self.classifier.review(&item.image_path, &self.categories).await {
            Ok(review) => review,
            Err(e) => {
                warn!(
                    "{}: classifier {} failed for {}: {e:#}",
                    item.platform,
                    self.classifier.name(),
                    item.unique_id
                );
                report.classifier_failures += 1;
                Review {
                    description: fallback_description(&item.platform, &item.unique_id),
                    category: None,
                }
            }
        };

        let mut post = NewPost::new(review.description, item.image_path.display().to_string())
            .with_platform(item.platform.clone())
            .with_content_hash(item.content_hash.clone());
        if item.stable_id {
            post = post
                .with_platform_unique_id(item.unique_id.clone())
                .with_original_post_id(item.unique_id.clone());
        }
        if let Some(category) = review.category {
            post = post.with_category(category);
        }

        let outcome = self.store.lock().await.add_post(post)?;
        if outcome.is_duplicate() {
            debug!("{}: {} already stored as {}", item.platform, item.unique_id, outcome.id());
            report.duplicates += 1;
        } else {
            report.added += 1;
        }
        Ok(())
    }
}
