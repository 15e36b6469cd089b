//! `feedreel nav ...` — move the persisted navigation pointer.

use anyhow::{bail, Result};
use feedreel::{MoveOutcome, PostStore};

use crate::cli::{output, post_line, CliContext};

pub async fn run_next(ctx: &CliContext, steps: usize) -> Result<()> {
    let mut store = ctx.open_store()?;
    let outcome = store.move_forward(steps)?;
    report_move(&store, outcome, "end");
    Ok(())
}

pub async fn run_prev(ctx: &CliContext, steps: usize) -> Result<()> {
    let mut store = ctx.open_store()?;
    let outcome = store.move_backward(steps)?;
    report_move(&store, outcome, "start");
    Ok(())
}

pub async fn run_goto(ctx: &CliContext, index: usize) -> Result<()> {
    let mut store = ctx.open_store()?;
    if !store.go_to_index(index)? {
        bail!(
            "index {index} is out of range ({} post(s) stored)",
            store.len()
        );
    }
    print_position(&store);
    Ok(())
}

pub async fn run_where(ctx: &CliContext) -> Result<()> {
    let store = ctx.open_store()?;
    print_position(&store);
    Ok(())
}

fn report_move(store: &PostStore, outcome: MoveOutcome, boundary: &str) {
    if output::is_json() {
        let position = store.current_position();
        output::print_json(&serde_json::json!({
            "moved": outcome.moved(),
            "at_boundary": matches!(outcome, MoveOutcome::AtBoundary { .. }),
            "current_index": outcome.index(),
            "total": position.total,
            "post": position.post,
        }));
        return;
    }
    if let MoveOutcome::AtBoundary { .. } = outcome {
        if !output::is_quiet() {
            eprintln!("  Already at the {boundary} of the feed.");
        }
    }
    print_position(store);
}

fn print_position(store: &PostStore) {
    let position = store.current_position();
    if output::is_json() {
        output::print_json(&position);
        return;
    }
    match &position.post {
        Some(post) => println!(
            "  [{}/{}] {}",
            position.current_index + 1,
            position.total,
            post_line(post)
        ),
        None => {
            if !output::is_quiet() {
                eprintln!("  No posts stored yet.");
            }
        }
    }
}
