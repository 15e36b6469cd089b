//! `feedreel harvest` — capture feeds into the store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use feedreel_runtime::classifier::{Classifier, OllamaClassifier, PassthroughClassifier};
use feedreel_runtime::orchestrator::{HarvestReport, Orchestrator};
use feedreel_runtime::platform::Platform;
use feedreel_runtime::progress::{self, CancelFlag, ProgressEventKind, ProgressReceiver};
use feedreel_runtime::renderer::chromium::ChromiumRenderer;
use feedreel_runtime::renderer::Renderer;
use tokio::sync::Mutex;

use crate::cli::{output, CliContext};

/// Command-line overrides for a harvest.
#[derive(Debug, Default)]
pub struct HarvestArgs {
    pub platforms: Vec<Platform>,
    pub target: Option<usize>,
    pub screenshot_dir: Option<PathBuf>,
    pub no_classify: bool,
    pub headed: bool,
    pub profile: Option<PathBuf>,
    pub categories: Vec<String>,
}

pub async fn run(ctx: &CliContext, args: HarvestArgs) -> Result<()> {
    let mut config = ctx.config.clone();
    if !args.platforms.is_empty() {
        config.platforms = args.platforms;
    }
    if let Some(target) = args.target {
        config.target_count = target;
    }
    if let Some(dir) = args.screenshot_dir {
        config.screenshot_dir = dir;
    }
    if args.no_classify {
        config.classify = false;
    }
    if args.headed {
        config.headless = false;
    }
    if args.profile.is_some() {
        config.user_data_dir = args.profile;
    }
    if !args.categories.is_empty() {
        config.categories = args.categories;
    }
    if config.platforms.is_empty() {
        bail!("no platforms selected");
    }

    let store = Arc::new(Mutex::new(ctx.open_store()?));
    let classifier: Arc<dyn Classifier> = if config.classify {
        Arc::new(OllamaClassifier::new(
            config.classifier_url.clone(),
            config.classifier_model.clone(),
        )?)
    } else {
        Arc::new(PassthroughClassifier)
    };

    if !output::is_quiet() && !output::is_json() {
        let names: Vec<&str> = config.platforms.iter().map(|p| p.as_str()).collect();
        eprintln!(
            "  Harvesting {} item(s) each from {} into {}",
            config.target_count,
            names.join(", "),
            ctx.store_path.display()
        );
    }

    let renderer = Arc::new(ChromiumRenderer::new(&config.launch_options()).await?);

    let cancel = CancelFlag::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, finishing current round");
                cancel.cancel();
            }
        })
    };

    let (tx, rx) = progress::channel();
    let logger = tokio::spawn(log_progress(rx));

    let orchestrator = Orchestrator::new(
        renderer.clone(),
        classifier,
        store,
        config.capture_config(),
    )
    .with_categories(config.categories.clone())
    .with_navigation_timeout(config.navigation_timeout_ms)
    .with_progress(tx)
    .with_cancel(cancel);

    let strategies = config.platforms.iter().map(|p| p.strategy()).collect();
    let reports = orchestrator.run(strategies).await;

    // Dropping the last sender ends the logger.
    drop(orchestrator);
    let _ = logger.await;
    ctrl_c.abort();
    if let Err(e) = renderer.shutdown().await {
        tracing::debug!("renderer shutdown failed: {e:#}");
    }

    print_reports(&reports);
    if reports.iter().all(|r| !r.is_success()) {
        bail!("every platform failed");
    }
    Ok(())
}

async fn log_progress(mut rx: ProgressReceiver) {
    use tokio::sync::broadcast::error::RecvError;
    loop {
        match rx.recv().await {
            Ok(event) => match event.event {
                ProgressEventKind::FeedFound { selector, fallback } => {
                    tracing::info!(
                        "{}: feed found via {selector} (fallback: {fallback})",
                        event.platform
                    )
                }
                ProgressEventKind::ItemCaptured {
                    unique_id, ordinal, ..
                } => tracing::info!("{}: #{ordinal} {unique_id}", event.platform),
                ProgressEventKind::ItemFailed { unique_id, reason } => {
                    tracing::debug!("{}: failed {unique_id}: {reason}", event.platform)
                }
                ProgressEventKind::RoundCompleted {
                    round,
                    processed,
                    total_captured,
                } => tracing::debug!(
                    "{}: round {round} added {processed} (total {total_captured})",
                    event.platform
                ),
                ProgressEventKind::Stalled { consecutive_rounds } => tracing::info!(
                    "{}: no new items for {consecutive_rounds} round(s)",
                    event.platform
                ),
                ProgressEventKind::CaptureFinished {
                    captured,
                    outcome,
                    elapsed_ms,
                } => tracing::info!(
                    "{}: finished with {captured} item(s), {outcome} ({elapsed_ms} ms)",
                    event.platform
                ),
                ProgressEventKind::Warning { message } => {
                    tracing::warn!("{}: {message}", event.platform)
                }
            },
            Err(RecvError::Lagged(n)) => tracing::debug!("progress logger skipped {n} event(s)"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_reports(reports: &[HarvestReport]) {
    if output::is_json() {
        output::print_json(reports);
        return;
    }
    if output::is_quiet() {
        return;
    }
    eprintln!();
    for r in reports {
        match &r.error {
            Some(error) => eprintln!("  {:<9} FAILED: {error}", r.platform),
            None => {
                eprintln!(
                    "  {:<9} captured {:>3}  added {:>3}  duplicates {:>3}  skipped {:>3}{}",
                    r.platform,
                    r.captured,
                    r.added,
                    r.duplicates,
                    r.element_failures,
                    r.abort_reason
                        .as_ref()
                        .map(|reason| format!("  ({reason})"))
                        .unwrap_or_default()
                );
                if r.classifier_failures > 0 {
                    eprintln!(
                        "            {} item(s) stored without a classifier description",
                        r.classifier_failures
                    );
                }
            }
        }
    }
}
