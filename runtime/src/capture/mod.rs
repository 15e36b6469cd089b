//! Feed scroll capture: walks an infinite-scroll feed one item at a time.
//!
//! A run moves through
//! `Init → WaitForFeed → CaptureRound ⇄ ScrollForMore → Done | Aborted`.
//! Each round snapshots every not-yet-captured item near the viewport, then
//! scrolls to make the feed render more. The run ends when the target count
//! is reached, the feed stops growing, rounds stop yielding new items, or the
//! run is cancelled. Ending early is not an error: whatever was captured is
//! returned.

pub mod config;
pub mod error;

pub use config::CaptureConfig;
pub use error::CaptureError;

use std::collections::HashSet;
use std::time::Instant;

use feedreel::{content_hash, snapshot_dimensions, snapshot_path, write_snapshot, CapturedItem};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::platform::{ItemId, PlatformStrategy};
use crate::progress::{self, CancelFlag, ProgressEventKind, ProgressSender};
use crate::renderer::{ElementHandle, RenderContext};

/// Where a capture run is.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Init,
    WaitForFeed,
    CaptureRound,
    ScrollForMore,
    Done,
    Aborted(AbortReason),
}

/// Why a run ended before reaching its target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AbortReason {
    /// `rounds` consecutive rounds captured nothing new.
    Stalled { rounds: u32 },
    /// Scrolling no longer renders more items.
    FeedExhausted,
    Cancelled,
    /// The page failed after the feed was found.
    PageError { message: String },
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stalled { rounds } => write!(f, "stalled after {rounds} empty rounds"),
            Self::FeedExhausted => write!(f, "feed exhausted"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::PageError { message } => write!(f, "page error: {message}"),
        }
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EndState {
    Done,
    Aborted(AbortReason),
}

/// Result of a capture run.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureOutcome {
    pub platform: String,
    /// Captured items in capture order.
    pub items: Vec<CapturedItem>,
    pub end_state: EndState,
    pub rounds: u32,
    pub element_failures: usize,
}

impl CaptureOutcome {
    pub fn abort_reason(&self) -> Option<&AbortReason> {
        match &self.end_state {
            EndState::Aborted(reason) => Some(reason),
            EndState::Done => None,
        }
    }
}

/// Captured-set and results of a single run.
#[derive(Debug, Default)]
pub struct CaptureSession {
    seen: HashSet<String>,
    items: Vec<CapturedItem>,
    target: usize,
}

impl CaptureSession {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    pub fn is_seen(&self, unique_id: &str) -> bool {
        self.seen.contains(unique_id)
    }

    pub fn record(&mut self, item: CapturedItem) {
        self.seen.insert(item.unique_id.clone());
        self.items.push(item);
    }

    pub fn is_complete(&self) -> bool {
        self.items.len() >= self.target
    }

    /// Ordinal for the next captured item, starting at 1.
    pub fn next_ordinal(&self) -> usize {
        self.items.len() + 1
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<CapturedItem> {
        self.items
    }
}

/// Whether an element with top edge `top` is close enough to the viewport
/// to be centered and captured now.
pub fn within_visibility_window(top: f64, viewport_height: f64, margin: f64) -> bool {
    top >= -margin && top <= viewport_height + margin
}

/// Drives one page through capture rounds for one platform.
pub struct FeedScrollCapture<'a> {
    page: &'a dyn RenderContext,
    strategy: &'a dyn PlatformStrategy,
    config: CaptureConfig,
    progress: Option<ProgressSender>,
    cancel: CancelFlag,
    seq: u64,
}

impl<'a> FeedScrollCapture<'a> {
    /// The page must already show the feed URL.
    pub fn new(
        page: &'a dyn RenderContext,
        strategy: &'a dyn PlatformStrategy,
        config: CaptureConfig,
    ) -> Self {
        Self {
            page,
            strategy,
            config,
            progress: None,
            cancel: CancelFlag::new(),
            seq: 0,
        }
    }

    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run until done or aborted.
    ///
    /// Only a feed that never appears (or a page that fails before it does)
    /// is an error.
    pub async fn run(mut self) -> Result<CaptureOutcome, CaptureError> {
        let started = Instant::now();
        let platform = self.strategy.name().to_string();
        let mut session = CaptureSession::new(self.config.target_count);
        let mut state = CaptureState::Init;
        let mut selector = String::new();
        let mut rounds = 0u32;
        let mut stalled_rounds = 0u32;
        let mut element_failures = 0usize;

        let end_state = loop {
            debug!("{platform}: state {state:?}");
            state = match state {
                CaptureState::Init => {
                    if session.is_complete() {
                        CaptureState::Done
                    } else {
                        CaptureState::WaitForFeed
                    }
                }
                CaptureState::WaitForFeed => {
                    selector = self.wait_for_feed().await?;
                    CaptureState::CaptureRound
                }
                CaptureState::CaptureRound => {
                    if self.cancel.is_cancelled() {
                        CaptureState::Aborted(AbortReason::Cancelled)
                    } else {
                        rounds += 1;
                        match self
                            .capture_round(&selector, &mut session, &mut element_failures)
                            .await
                        {
                            Err(e) => CaptureState::Aborted(AbortReason::PageError {
                                message: format!("{e:#}"),
                            }),
                            Ok(processed) => {
                                self.emit(ProgressEventKind::RoundCompleted {
                                    round: rounds,
                                    processed,
                                    total_captured: session.len(),
                                });
                                if session.is_complete() {
                                    CaptureState::Done
                                } else if processed == 0 {
                                    stalled_rounds += 1;
                                    self.emit(ProgressEventKind::Stalled {
                                        consecutive_rounds: stalled_rounds,
                                    });
                                    if stalled_rounds >= self.config.max_stall_rounds {
                                        CaptureState::Aborted(AbortReason::Stalled {
                                            rounds: stalled_rounds,
                                        })
                                    } else {
                                        CaptureState::ScrollForMore
                                    }
                                } else {
                                    stalled_rounds = 0;
                                    CaptureState::ScrollForMore
                                }
                            }
                        }
                    }
                }
                CaptureState::ScrollForMore => {
                    if self.cancel.is_cancelled() {
                        CaptureState::Aborted(AbortReason::Cancelled)
                    } else {
                        match self.scroll_for_more(&selector).await {
                            Ok(true) => CaptureState::CaptureRound,
                            Ok(false) => CaptureState::Aborted(AbortReason::FeedExhausted),
                            Err(e) => CaptureState::Aborted(AbortReason::PageError {
                                message: format!("{e:#}"),
                            }),
                        }
                    }
                }
                CaptureState::Done => break EndState::Done,
                CaptureState::Aborted(reason) => break EndState::Aborted(reason),
            };
        };

        match &end_state {
            EndState::Done => info!(
                "{platform}: captured {} items in {rounds} rounds",
                session.len()
            ),
            EndState::Aborted(reason) => info!(
                "{platform}: stopped with {} of {} items ({reason})",
                session.len(),
                self.config.target_count
            ),
        }
        self.emit(ProgressEventKind::CaptureFinished {
            captured: session.len(),
            outcome: match &end_state {
                EndState::Done => "done".to_string(),
                EndState::Aborted(reason) => reason.to_string(),
            },
            elapsed_ms: started.elapsed().as_millis() as u64,
        });

        Ok(CaptureOutcome {
            platform,
            items: session.into_items(),
            end_state,
            rounds,
            element_failures,
        })
    }

    /// Primary selector first, then each fallback with the shorter timeout.
    async fn wait_for_feed(&mut self) -> Result<String, CaptureError> {
        let strategy = self.strategy;
        let primary = strategy.item_selector().to_string();
        let found = self
            .page
            .wait_for_selector(&primary, strategy.timeout())
            .await
            .map_err(CaptureError::Browser)?;
        if found {
            self.emit(ProgressEventKind::FeedFound {
                selector: primary.clone(),
                fallback: false,
            });
            return Ok(primary);
        }

        let mut tried = vec![primary];
        for &fallback in strategy.fallback_selectors() {
            debug!("{}: primary selector missed, trying {fallback}", strategy.name());
            let found = self
                .page
                .wait_for_selector(fallback, self.config.fallback_timeout)
                .await
                .map_err(CaptureError::Browser)?;
            if found {
                info!("{}: using fallback selector {fallback}", strategy.name());
                self.emit(ProgressEventKind::FeedFound {
                    selector: fallback.to_string(),
                    fallback: true,
                });
                return Ok(fallback.to_string());
            }
            tried.push(fallback.to_string());
        }

        Err(CaptureError::FeedNotFound {
            platform: strategy.name().to_string(),
            selectors: tried,
        })
    }

    /// Capture every new item near the viewport. Returns how many were added.
    async fn capture_round(
        &mut self,
        selector: &str,
        session: &mut CaptureSession,
        element_failures: &mut usize,
    ) -> anyhow::Result<usize> {
        let elements = self.page.query_all(selector).await?;
        let viewport = self.page.viewport_height().await?;
        let mut processed = 0;

        for element in &elements {
            if session.is_complete() {
                break;
            }

            let id = match self.strategy.unique_id(self.page, element).await {
                Ok(id) => id,
                Err(e) => {
                    warn!("{}: could not identify item: {e:#}", self.strategy.name());
                    *element_failures += 1;
                    continue;
                }
            };
            if session.is_seen(&id.value) {
                continue;
            }

            match self.page.element_top(element).await {
                Ok(top)
                    if within_visibility_window(
                        top,
                        viewport,
                        self.config.visibility_margin_px,
                    ) => {}
                Ok(top) => {
                    debug!("{}: {} at {top}px, later", self.strategy.name(), id.value);
                    continue;
                }
                Err(e) => {
                    self.record_failure(&id, &e.to_string(), element_failures);
                    continue;
                }
            }

            match self
                .capture_element(element, &id, session.next_ordinal())
                .await
            {
                Ok(item) => {
                    self.emit(ProgressEventKind::ItemCaptured {
                        unique_id: item.unique_id.clone(),
                        ordinal: item.ordinal,
                        image_path: item.image_path.display().to_string(),
                    });
                    debug!(
                        "{}: captured #{} {}",
                        self.strategy.name(),
                        item.ordinal,
                        item.unique_id
                    );
                    session.record(item);
                    processed += 1;
                }
                Err(e) if e.is_element_level() => {
                    self.record_failure(&id, &e.to_string(), element_failures);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(processed)
    }

    async fn capture_element(
        &mut self,
        element: &ElementHandle,
        id: &ItemId,
        ordinal: usize,
    ) -> Result<CapturedItem, CaptureError> {
        let element_err = |what: &str, e: anyhow::Error| {
            CaptureError::ElementCapture(format!("{}: {what}: {e:#}", id.value))
        };

        self.page
            .scroll_into_center(element)
            .await
            .map_err(|e| element_err("scroll", e))?;
        tokio::time::sleep(self.config.settle_delay).await;

        if self.strategy.supports_expansion() {
            match self.strategy.expand_content(self.page, element).await {
                Ok(true) => tokio::time::sleep(self.strategy.expand_delay()).await,
                Ok(false) => {}
                // A collapsed snapshot is still worth keeping.
                Err(e) => {
                    debug!(
                        "{}: expand failed for {}: {e:#}",
                        self.strategy.name(),
                        id.value
                    );
                    self.emit(ProgressEventKind::Warning {
                        message: format!("could not expand {}: {e:#}", id.value),
                    });
                }
            }
        }

        let bytes = self
            .page
            .screenshot_element(element)
            .await
            .map_err(|e| element_err("screenshot", e))?;
        snapshot_dimensions(&bytes)?;

        let platform = self.strategy.name();
        let path = snapshot_path(&self.config.screenshot_dir, platform, ordinal, &id.value);
        write_snapshot(&path, &bytes)?;

        Ok(CapturedItem {
            unique_id: id.value.clone(),
            image_path: path,
            platform: platform.to_string(),
            ordinal,
            content_hash: content_hash(&bytes),
            stable_id: id.is_stable(),
        })
    }

    /// Nudge the feed with small scrolls, then one jump to the bottom.
    /// Returns whether more items rendered.
    ///
    /// Stepping stops at the first growth so newly rendered items are still
    /// near the viewport for the next round.
    async fn scroll_for_more(&self, selector: &str) -> anyhow::Result<bool> {
        let before = self.page.count_matching(selector).await?;
        let step = match self.config.scroll_step_px {
            Some(px) => px,
            None => (self.page.viewport_height().await? / 2.0).round().max(1.0) as i64,
        };
        for _ in 0..self.config.scroll_steps {
            self.page.scroll_by(step).await?;
            tokio::time::sleep(self.config.scroll_delay).await;
            let after = self.page.count_matching(selector).await?;
            if after > before {
                debug!("{}: feed grew {before} -> {after}", self.strategy.name());
                return Ok(true);
            }
        }

        self.page.scroll_to_bottom().await?;
        tokio::time::sleep(self.config.scroll_delay).await;
        let after = self.page.count_matching(selector).await?;
        if after > before {
            debug!(
                "{}: feed grew {before} -> {after} at bottom",
                self.strategy.name()
            );
            return Ok(true);
        }
        Ok(false)
    }

    fn record_failure(&mut self, id: &ItemId, reason: &str, element_failures: &mut usize) {
        warn!("{}: skipping {}: {reason}", self.strategy.name(), id.value);
        *element_failures += 1;
        self.emit(ProgressEventKind::ItemFailed {
            unique_id: id.value.clone(),
            reason: reason.to_string(),
        });
    }

    fn emit(&mut self, event: ProgressEventKind) {
        progress::emit(&self.progress, self.strategy.name(), &mut self.seq, event);
    }
}
