//! Capture error types.

use feedreel::StoreError;

/// Errors from a capture run.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    /// Neither the primary nor any fallback selector matched in time.
    #[error("no feed items found on {platform} (tried: {})", .selectors.join(", "))]
    FeedNotFound {
        platform: String,
        selectors: Vec<String>,
    },

    /// One element could not be captured. The run skips it.
    #[error("element capture failed: {0}")]
    ElementCapture(String),

    /// The page stopped responding before the feed was found.
    #[error("browser error: {0:#}")]
    Browser(anyhow::Error),

    /// A snapshot could not be written.
    #[error(transparent)]
    Snapshot(#[from] StoreError),
}

impl CaptureError {
    /// Whether the error concerns a single element and the run can go on.
    pub fn is_element_level(&self) -> bool {
        matches!(self, CaptureError::ElementCapture(_) | CaptureError::Snapshot(_))
    }
}
