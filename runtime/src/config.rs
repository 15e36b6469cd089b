//! Harvest configuration.
//!
//! Layers, later wins: built-in defaults, an optional JSON file
//! (`--config` or `FEEDREEL_CONFIG`), `FEEDREEL_*` environment variables,
//! then command-line flags (applied by the CLI).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::capture::CaptureConfig;
use crate::classifier::{DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};
use crate::platform::Platform;
use crate::renderer::chromium::LaunchOptions;

pub const ENV_CONFIG: &str = "FEEDREEL_CONFIG";
pub const ENV_STORE: &str = "FEEDREEL_STORE";
pub const ENV_SCREENSHOT_DIR: &str = "FEEDREEL_SCREENSHOT_DIR";
pub const ENV_TARGET: &str = "FEEDREEL_TARGET";
pub const ENV_CLASSIFIER_URL: &str = "FEEDREEL_CLASSIFIER_URL";
pub const ENV_CLASSIFIER_MODEL: &str = "FEEDREEL_CLASSIFIER_MODEL";
pub const ENV_CHROMIUM_PATH: &str = "FEEDREEL_CHROMIUM_PATH";

const STORE_DIR: &str = ".feedreel";
const STORE_FILE: &str = "posts.json";

/// Everything a harvest run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub store_path: Option<PathBuf>,
    pub screenshot_dir: PathBuf,
    /// Items to capture per platform.
    pub target_count: usize,
    pub platforms: Vec<Platform>,
    /// Categories offered to the classifier.
    pub categories: Vec<String>,
    pub classify: bool,
    pub classifier_url: String,
    pub classifier_model: String,
    pub chromium_path: Option<PathBuf>,
    /// Browser profile that is already logged in to the feeds.
    pub user_data_dir: Option<PathBuf>,
    pub headless: bool,
    pub navigation_timeout_ms: u64,
    pub settle_ms: u64,
    pub fallback_timeout_ms: u64,
    pub scroll_steps: u32,
    /// Unset scrolls half the viewport per step.
    pub scroll_step_px: Option<i64>,
    pub scroll_delay_ms: u64,
    pub visibility_margin_px: f64,
    pub max_stall_rounds: u32,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        let capture = CaptureConfig::default();
        Self {
            store_path: None,
            screenshot_dir: capture.screenshot_dir,
            target_count: capture.target_count,
            platforms: Platform::all().to_vec(),
            categories: Vec::new(),
            classify: true,
            classifier_url: DEFAULT_OLLAMA_URL.to_string(),
            classifier_model: DEFAULT_OLLAMA_MODEL.to_string(),
            chromium_path: None,
            user_data_dir: None,
            headless: true,
            navigation_timeout_ms: 30_000,
            settle_ms: capture.settle_delay.as_millis() as u64,
            fallback_timeout_ms: capture.fallback_timeout.as_millis() as u64,
            scroll_steps: capture.scroll_steps,
            scroll_step_px: capture.scroll_step_px,
            scroll_delay_ms: capture.scroll_delay.as_millis() as u64,
            visibility_margin_px: capture.visibility_margin_px,
            max_stall_rounds: capture.max_stall_rounds,
        }
    }
}

impl HarvestConfig {
    /// Defaults, then the config file, then the environment.
    ///
    /// `config_file` falls back to `FEEDREEL_CONFIG`. A named file that does
    /// not exist is an error.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let file = config_file
            .map(Path::to_path_buf)
            .or_else(|| read_env_string(ENV_CONFIG).filter(|s| !s.is_empty()).map(PathBuf::from));

        let mut config = match file {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config {}", path.display()))?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `FEEDREEL_*` variables as returned by `lookup`.
    /// Unparseable numbers are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(v) = get(ENV_STORE) {
            self.store_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get(ENV_SCREENSHOT_DIR) {
            self.screenshot_dir = PathBuf::from(v);
        }
        if let Some(n) = get(ENV_TARGET).and_then(|v| v.parse::<usize>().ok()) {
            self.target_count = n;
        }
        if let Some(v) = get(ENV_CLASSIFIER_URL) {
            self.classifier_url = v;
        }
        if let Some(v) = get(ENV_CLASSIFIER_MODEL) {
            self.classifier_model = v;
        }
        if let Some(v) = get(ENV_CHROMIUM_PATH) {
            self.chromium_path = Some(PathBuf::from(v));
        }
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            target_count: self.target_count,
            screenshot_dir: self.screenshot_dir.clone(),
            max_stall_rounds: self.max_stall_rounds.max(1),
            fallback_timeout: Duration::from_millis(self.fallback_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_ms),
            scroll_steps: self.scroll_steps,
            scroll_step_px: self.scroll_step_px,
            scroll_delay: Duration::from_millis(self.scroll_delay_ms),
            visibility_margin_px: self.visibility_margin_px,
        }
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            chromium_path: self.chromium_path.clone(),
            user_data_dir: self.user_data_dir.clone(),
            headless: self.headless,
            ..LaunchOptions::default()
        }
    }
}

/// Store document path: explicit flag, then the configured path
/// (`FEEDREEL_STORE` or config file), then `./.feedreel/posts.json` when it
/// exists, then `~/.feedreel/posts.json`.
pub fn resolve_store_path(explicit: Option<&Path>, configured: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit.or(configured) {
        return path.to_path_buf();
    }
    let local = Path::new(STORE_DIR).join(STORE_FILE);
    if local.exists() {
        return local;
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STORE_DIR)
        .join(STORE_FILE)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_capture_defaults() {
        let config = HarvestConfig::default();
        let capture = config.capture_config();
        assert_eq!(capture.settle_delay, Duration::from_millis(800));
        assert_eq!(capture.fallback_timeout, Duration::from_secs(5));
        assert_eq!(capture.scroll_steps, 3);
        assert_eq!(capture.max_stall_rounds, 3);
        assert_eq!(config.platforms, vec![Platform::X, Platform::LinkedIn]);
        assert!(config.launch_options().headless);
    }

    #[test]
    fn test_file_then_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedreel.json");
        std::fs::write(
            &path,
            r#"{ "target_count": 25, "platforms": ["linkedin"], "categories": ["Tech"],
                 "classifier_model": "bakllava" }"#,
        )
        .unwrap();

        let mut config = HarvestConfig::from_file(&path).unwrap();
        assert_eq!(config.target_count, 25);
        assert_eq!(config.platforms, vec![Platform::LinkedIn]);
        assert_eq!(config.scroll_step_px, None);

        let env: HashMap<&str, &str> = [
            (ENV_TARGET, "40"),
            (ENV_CLASSIFIER_MODEL, "  "),
            (ENV_STORE, "/tmp/feed/posts.json"),
            (ENV_SCREENSHOT_DIR, "/tmp/feed/shots"),
        ]
        .into_iter()
        .collect();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.target_count, 40);
        assert_eq!(config.classifier_model, "bakllava");
        assert_eq!(config.store_path, Some(PathBuf::from("/tmp/feed/posts.json")));
        assert_eq!(
            config.capture_config().screenshot_dir,
            PathBuf::from("/tmp/feed/shots")
        );
    }

    #[test]
    fn test_bad_number_is_ignored() {
        let mut config = HarvestConfig::default();
        config.apply_overrides(|name| (name == ENV_TARGET).then(|| "lots".to_string()));
        assert_eq!(config.target_count, 10);
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(HarvestConfig::load(Some(&dir.path().join("nope.json"))).is_err());
    }

    #[test]
    fn test_resolve_store_path_prefers_explicit() {
        let explicit = Path::new("/a/posts.json");
        let configured = Path::new("/b/posts.json");
        assert_eq!(
            resolve_store_path(Some(explicit), Some(configured)),
            PathBuf::from("/a/posts.json")
        );
        assert_eq!(
            resolve_store_path(None, Some(configured)),
            PathBuf::from("/b/posts.json")
        );
        assert!(resolve_store_path(None, None).ends_with(".feedreel/posts.json"));
    }
}
