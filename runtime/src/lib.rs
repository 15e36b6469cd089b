// Copyright 2026 feedreel contributors
// SPDX-License-Identifier: MIT

//! feedreel runtime library — drives feed pages in a browser, snapshots each
//! post, classifies it and records it in the post store.
//!
//! This library crate exposes the runtime modules to the `feedreel` binary
//! and to integration tests.

pub mod capture;
pub mod classifier;
pub mod config;
pub mod orchestrator;
pub mod platform;
pub mod progress;
pub mod renderer;

pub use capture::{
    AbortReason, CaptureConfig, CaptureError, CaptureOutcome, EndState, FeedScrollCapture,
};
pub use orchestrator::{HarvestReport, Orchestrator};
pub use platform::{Platform, PlatformStrategy};
