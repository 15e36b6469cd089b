//! `feedreel stats` and `feedreel categories`.

use anyhow::Result;

use crate::cli::{output, CliContext};

pub async fn run_stats(ctx: &CliContext) -> Result<()> {
    let store = ctx.open_store()?;
    let stats = store.stats();

    if output::is_json() {
        output::print_json(&stats);
        return Ok(());
    }

    println!("  Store:    {}", ctx.store_path.display());
    println!(
        "  Posts:    {} ({} rated, {} unrated)",
        stats.total_posts, stats.rated_posts, stats.unrated_posts
    );
    for (title, counts) in [
        ("By platform", &stats.by_platform),
        ("By rating", &stats.by_rating),
        ("By category", &stats.by_category),
    ] {
        if counts.is_empty() {
            continue;
        }
        println!();
        println!("  {title}:");
        for (key, count) in counts {
            println!("    {key:<20} {count:>6}");
        }
    }
    Ok(())
}

pub async fn run_categories(ctx: &CliContext) -> Result<()> {
    let store = ctx.open_store()?;
    let categories = store.all_categories();

    if output::is_json() {
        output::print_json(&categories);
        return Ok(());
    }
    if categories.is_empty() {
        if !output::is_quiet() {
            eprintln!("  No categorized posts.");
        }
        return Ok(());
    }
    for category in &categories {
        println!("  {category}");
    }
    Ok(())
}
