//! Output mode helpers shared by all commands.
//!
//! Human-readable output goes to stderr, JSON to stdout. `main` records the
//! global `--json` / `--quiet` flags in the environment so every command
//! can check them.

use serde::Serialize;

pub const ENV_JSON: &str = "FEEDREEL_JSON";
pub const ENV_QUIET: &str = "FEEDREEL_QUIET";

pub fn is_json() -> bool {
    flag_set(ENV_JSON)
}

pub fn is_quiet() -> bool {
    flag_set(ENV_QUIET)
}

fn flag_set(name: &str) -> bool {
    std::env::var(name).map(|v| v == "1").unwrap_or(false)
}

/// Pretty-print `value` as JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("  Error: failed to encode JSON output: {e}"),
    }
}

/// Shorten `text` to `max` characters, marking the cut with `...`.
pub fn truncate(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let kept: String = flat.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a  b\nc", 10), "a b c");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }
}
