//! `feedreel posts ...` — browse and edit stored posts.

use anyhow::{bail, Result};
use feedreel::{RATING_DOWN, RATING_UP};

use crate::cli::{output, post_line, CliContext};

/// `up`, `down`, `clear`, or a number.
pub fn parse_rating(raw: &str) -> Result<Option<f64>> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "up" | "+" => Ok(Some(RATING_UP)),
        "down" | "-" => Ok(Some(RATING_DOWN)),
        "clear" | "none" | "null" => Ok(None),
        other => match other.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(Some(n)),
            _ => bail!("invalid rating '{raw}' (use up, down, clear or a number)"),
        },
    }
}

/// Window of posts around the navigation pointer.
pub async fn run_list(ctx: &CliContext, page_size: usize, offset: i64) -> Result<()> {
    let store = ctx.open_store()?;
    let window = store.get_posts(page_size, offset);

    if output::is_json() {
        output::print_json(&window);
        return Ok(());
    }
    if window.posts.is_empty() {
        if !output::is_quiet() {
            eprintln!("  No posts stored yet. Run: feedreel harvest");
        }
        return Ok(());
    }
    if !output::is_quiet() {
        eprintln!(
            "  Posts {}-{} of {} (pointer at {}){}{}",
            window.start + 1,
            window.end,
            window.total_posts,
            window.current_index,
            if window.has_previous { ", more before" } else { "" },
            if window.has_more { ", more after" } else { "" },
        );
        eprintln!();
    }
    for post in &window.posts {
        println!("  {}", post_line(post));
    }
    Ok(())
}

/// One page of a category.
pub async fn run_category(
    ctx: &CliContext,
    category: &str,
    page_size: usize,
    page: usize,
) -> Result<()> {
    let store = ctx.open_store()?;
    let result = store.posts_by_category_paginated(category, page_size, page);

    if output::is_json() {
        output::print_json(&result);
        return Ok(());
    }
    if result.posts.is_empty() {
        if !output::is_quiet() {
            eprintln!("  No posts in '{category}' on page {page}.");
        }
        return Ok(());
    }
    if !output::is_quiet() {
        eprintln!(
            "  '{category}': page {page}, {} of {} post(s){}",
            result.posts.len(),
            result.total,
            if result.has_more { " (more on next page)" } else { "" }
        );
        eprintln!();
    }
    for post in &result.posts {
        println!("  {}", post_line(post));
    }
    Ok(())
}

pub async fn run_show(ctx: &CliContext, id: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let Some(post) = store.get_post(id) else {
        bail!("no post with id '{id}'");
    };

    if output::is_json() {
        output::print_json(post);
        return Ok(());
    }
    println!("  id:          {}", post.id);
    println!("  description: {}", post.description);
    println!("  captured:    {}", post.timestamp.to_rfc3339());
    println!(
        "  rating:      {}",
        post.rating.map(|r| r.to_string()).unwrap_or_else(|| "-".into())
    );
    println!("  platform:    {}", post.platform.as_deref().unwrap_or("-"));
    println!("  category:    {}", post.category.as_deref().unwrap_or("-"));
    println!(
        "  platform id: {}",
        post.platform_unique_id.as_deref().unwrap_or("-")
    );
    println!("  hash:        {}", post.content_hash.as_deref().unwrap_or("-"));
    println!("  screenshot:  {}", post.screenshot_path);
    Ok(())
}

pub async fn run_rate(ctx: &CliContext, id: &str, rating: &str) -> Result<()> {
    let rating = parse_rating(rating)?;
    let mut store = ctx.open_store()?;
    if !store.update_rating(id, rating)? {
        bail!("no post with id '{id}'");
    }

    if output::is_json() {
        output::print_json(&serde_json::json!({ "id": id, "rating": rating }));
    } else if !output::is_quiet() {
        match rating {
            Some(r) => eprintln!("  Rated {id}: {r}"),
            None => eprintln!("  Cleared rating of {id}"),
        }
    }
    Ok(())
}

pub async fn run_delete(ctx: &CliContext, id: &str) -> Result<()> {
    let mut store = ctx.open_store()?;
    if !store.delete_post(id)? {
        bail!("no post with id '{id}'");
    }

    if output::is_json() {
        output::print_json(&serde_json::json!({ "deleted": id, "remaining": store.len() }));
    } else if !output::is_quiet() {
        eprintln!("  Deleted {id} ({} post(s) left)", store.len());
    }
    Ok(())
}

pub async fn run_clear(ctx: &CliContext, yes: bool) -> Result<()> {
    if !yes {
        bail!("refusing to delete every post without --yes");
    }
    let mut store = ctx.open_store()?;
    let removed = store.len();
    store.clear_all()?;

    if output::is_json() {
        output::print_json(&serde_json::json!({ "cleared": removed }));
    } else if !output::is_quiet() {
        eprintln!("  Removed {removed} post(s)");
    }
    Ok(())
}
