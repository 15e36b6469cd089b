// Copyright 2026 feedreel contributors
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use feedreel_runtime::platform::Platform;

mod cli;

use cli::harvest_cmd::HarvestArgs;
use cli::CliContext;

#[derive(Parser)]
#[command(
    name = "feedreel",
    about = "feedreel — snapshot social feeds one post at a time and browse them later",
    version,
    after_help = "Run 'feedreel <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Log filter when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Post store document
    /// (default: ./.feedreel/posts.json if present, else ~/.feedreel/posts.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// JSON config file (also FEEDREEL_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture feed posts from the browser into the store
    Harvest {
        /// Platform to harvest (x, linkedin). Can be repeated. Default: all.
        #[arg(long = "platform")]
        platforms: Vec<Platform>,
        /// Items to capture per platform
        #[arg(long)]
        target: Option<usize>,
        /// Where snapshots are written
        #[arg(long)]
        screenshot_dir: Option<PathBuf>,
        /// Skip the vision classifier
        #[arg(long)]
        no_classify: bool,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
        /// Browser profile directory that is already logged in
        #[arg(long)]
        profile: Option<PathBuf>,
        /// Category offered to the classifier. Can be repeated.
        #[arg(long = "category")]
        categories: Vec<String>,
    },
    /// Browse and edit stored posts
    Posts {
        #[command(subcommand)]
        action: PostsAction,
    },
    /// Move the navigation pointer
    Nav {
        #[command(subcommand)]
        action: NavAction,
    },
    /// Show store statistics
    Stats,
    /// List categories in use
    Categories,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum PostsAction {
    /// Window of posts around the pointer, newest first
    List {
        #[arg(long, default_value = "10")]
        page_size: usize,
        /// Shift the window relative to the pointer
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        offset: i64,
    },
    /// One page of posts in a category
    Category {
        name: String,
        #[arg(long, default_value = "10")]
        page_size: usize,
        /// Zero-based page number
        #[arg(long, default_value = "0")]
        page: usize,
    },
    /// Show one post
    Show { id: String },
    /// Rate a post: up, down, clear, or a number
    Rate {
        id: String,
        #[arg(allow_hyphen_values = true)]
        rating: String,
    },
    /// Delete one post
    Delete { id: String },
    /// Delete every post
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum NavAction {
    /// Move forward through the feed
    Next {
        #[arg(long, default_value = "1")]
        steps: usize,
    },
    /// Move backward through the feed
    Prev {
        #[arg(long, default_value = "1")]
        steps: usize,
    },
    /// Jump to a zero-based index
    Goto { index: usize },
    /// Show the current position
    Where,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var(cli::output::ENV_JSON, "1");
    }
    if cli.quiet {
        std::env::set_var(cli::output::ENV_QUIET, "1");
    }
    init_tracing(&cli.log_level, cli.log_json);

    let result = run(cli).await;

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else if !cli::output::is_quiet() {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "feedreel", &mut std::io::stdout());
        return Ok(());
    }

    let ctx = CliContext::load(cli.store.as_deref(), cli.config.as_deref())?;

    match cli.command {
        Commands::Harvest {
            platforms,
            target,
            screenshot_dir,
            no_classify,
            headed,
            profile,
            categories,
        } => {
            cli::harvest_cmd::run(
                &ctx,
                HarvestArgs {
                    platforms,
                    target,
                    screenshot_dir,
                    no_classify,
                    headed,
                    profile,
                    categories,
                },
            )
            .await
        }
        Commands::Posts { action } => match action {
            PostsAction::List { page_size, offset } => {
                cli::posts_cmd::run_list(&ctx, page_size, offset).await
            }
            PostsAction::Category {
                name,
                page_size,
                page,
            } => cli::posts_cmd::run_category(&ctx, &name, page_size, page).await,
            PostsAction::Show { id } => cli::posts_cmd::run_show(&ctx, &id).await,
            PostsAction::Rate { id, rating } => cli::posts_cmd::run_rate(&ctx, &id, &rating).await,
            PostsAction::Delete { id } => cli::posts_cmd::run_delete(&ctx, &id).await,
            PostsAction::Clear { yes } => cli::posts_cmd::run_clear(&ctx, yes).await,
        },
        Commands::Nav { action } => match action {
            NavAction::Next { steps } => cli::nav_cmd::run_next(&ctx, steps).await,
            NavAction::Prev { steps } => cli::nav_cmd::run_prev(&ctx, steps).await,
            NavAction::Goto { index } => cli::nav_cmd::run_goto(&ctx, index).await,
            NavAction::Where => cli::nav_cmd::run_where(&ctx).await,
        },
        Commands::Stats => cli::stats_cmd::run_stats(&ctx).await,
        Commands::Categories => cli::stats_cmd::run_categories(&ctx).await,
        Commands::Completions { .. } => Ok(()),
    }
}
