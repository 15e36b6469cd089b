//! Capture tunables.

use std::path::PathBuf;
use std::time::Duration;

/// Settings for one [`FeedScrollCapture`](super::FeedScrollCapture) run.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Stop after this many items.
    pub target_count: usize,
    /// Snapshots go to `{screenshot_dir}/{platform}/`.
    pub screenshot_dir: PathBuf,
    /// Consecutive rounds without a new item before giving up.
    pub max_stall_rounds: u32,
    /// Wait per fallback selector once the primary one timed out.
    pub fallback_timeout: Duration,
    /// Pause after centering an element, for lazy images and layout.
    pub settle_delay: Duration,
    /// Most incremental scrolls per attempt. Stops early once the feed grows.
    pub scroll_steps: u32,
    /// Pixels per incremental scroll. `None` scrolls half the viewport
    /// height measured on the page.
    pub scroll_step_px: Option<i64>,
    pub scroll_delay: Duration,
    /// Elements whose top edge lies more than this far outside the
    /// viewport are left for a later round.
    pub visibility_margin_px: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_count: 10,
            screenshot_dir: PathBuf::from("screenshots"),
            max_stall_rounds: 3,
            fallback_timeout: Duration::from_secs(5),
            settle_delay: Duration::from_millis(800),
            scroll_steps: 3,
            scroll_step_px: None,
            scroll_delay: Duration::from_secs(1),
            visibility_margin_px: 200.0,
        }
    }
}

impl CaptureConfig {
    pub fn new(target_count: usize, screenshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_count,
            screenshot_dir: screenshot_dir.into(),
            ..Self::default()
        }
    }

    /// Zero every delay. For pages that render synchronously.
    pub fn without_delays(mut self) -> Self {
        self.fallback_timeout = Duration::ZERO;
        self.settle_delay = Duration::ZERO;
        self.scroll_delay = Duration::ZERO;
        self
    }
}
