// Copyright 2026 feedreel contributors
// SPDX-License-Identifier: MIT

//! Progress event types and broadcast channel for capture telemetry.
//!
//! The capture loop emits `ProgressEvent`s while it runs. They flow through a
//! `tokio::sync::broadcast` channel to every subscriber (the CLI logger, tests).
//! With no subscriber the events are dropped.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A progress event emitted during a capture run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Platform whose capture produced the event.
    pub platform: String,
    /// Monotonically increasing per capture run.
    pub seq: u64,
    pub event: ProgressEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    /// Feed items appeared for `selector`.
    FeedFound { selector: String, fallback: bool },
    /// One item was snapshotted.
    ItemCaptured {
        unique_id: String,
        ordinal: usize,
        image_path: String,
    },
    /// One item could not be captured and was skipped.
    ItemFailed { unique_id: String, reason: String },
    /// A capture round finished.
    RoundCompleted {
        round: u32,
        processed: usize,
        total_captured: usize,
    },
    /// A round produced nothing new.
    Stalled { consecutive_rounds: u32 },
    /// The run ended.
    CaptureFinished {
        captured: usize,
        outcome: String,
        elapsed_ms: u64,
    },
    /// A non-fatal warning occurred.
    Warning { message: String },
}

/// Sender handle for emitting progress events.
pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
///
/// 256 events covers a typical run (one event per item plus one per round).
/// Slow receivers see `Lagged` rather than blocking the capture.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Emit a progress event, ignoring send errors (no receivers listening).
pub fn emit(tx: &Option<ProgressSender>, platform: &str, seq: &mut u64, event: ProgressEventKind) {
    if let Some(ref sender) = tx {
        *seq += 1;
        let _ = sender.send(ProgressEvent {
            platform: platform.to_string(),
            seq: *seq,
            event,
        });
    }
}

/// Shared cooperative cancellation flag.
///
/// Cloning shares the flag. Capture runs check it between rounds.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_serialization() {
        let event = ProgressEvent {
            platform: "x".to_string(),
            seq: 1,
            event: ProgressEventKind::ItemCaptured {
                unique_id: "1790".to_string(),
                ordinal: 3,
                image_path: "shots/x/x_3_1790.png".to_string(),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"ItemCaptured\""));

        let parsed: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.platform, "x");
        assert_eq!(parsed.seq, 1);
    }

    #[tokio::test]
    async fn test_emit_reaches_subscriber() {
        let (tx, mut rx) = channel();
        let mut seq = 0;
        let tx = Some(tx);
        emit(
            &tx,
            "linkedin",
            &mut seq,
            ProgressEventKind::Stalled {
                consecutive_rounds: 2,
            },
        );
        emit(
            &tx,
            "linkedin",
            &mut seq,
            ProgressEventKind::Warning {
                message: "slow".to_string(),
            },
        );

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!((first.seq, second.seq), (1, 2));
        assert!(matches!(
            first.event,
            ProgressEventKind::Stalled {
                consecutive_rounds: 2
            }
        ));
    }

    #[test]
    fn test_channel_no_receivers() {
        let (tx, rx) = channel();
        drop(rx);
        // Should not panic
        emit(
            &Some(tx),
            "x",
            &mut 0,
            ProgressEventKind::Warning {
                message: "test".to_string(),
            },
        );
    }

    #[test]
    fn test_emit_none_sender() {
        let mut seq = 0;
        emit(
            &None,
            "x",
            &mut seq,
            ProgressEventKind::Warning {
                message: "test".to_string(),
            },
        );
        assert_eq!(seq, 0);
    }

    #[test]
    fn test_cancel_flag_shared_between_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());
        flag.cancel();
        assert!(other.is_cancelled());
    }
}
