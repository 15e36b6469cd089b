//! Lowercase ASCII slugs for ids and file names.

/// Lowercase alphanumerics, every other run of characters collapsed to a
/// single `_`, trimmed, and cut to at most `max_len` characters.
///
/// Returns an empty string when `text` has no alphanumerics at all.
pub fn slugify(text: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(text.len().min(max_len));
    let mut pending_sep = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
        if slug.len() >= max_len {
            break;
        }
    }

    slug.truncate(max_len);
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Hello, World!", 40), "hello_world");
        assert_eq!(slugify("  --a--b--  ", 40), "a_b");
    }

    #[test]
    fn test_slugify_truncates() {
        assert_eq!(slugify("abcdef ghij", 8), "abcdef_g");
        assert_eq!(slugify("abcdef ghij", 7), "abcdef");
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify("", 10), "");
        assert_eq!(slugify("!!! ???", 10), "");
        assert_eq!(slugify("日本語 text", 10), "text");
    }
}
