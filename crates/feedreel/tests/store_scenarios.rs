//! End-to-end store scenarios: dedup, pointer pagination, category paging
//! and persistence across reopen.

use std::collections::HashSet;

use feedreel::{AddOutcome, MoveOutcome, NewPost, PostStore};

// ─────────────────────── helpers ───────────────────────

fn temp_store(dir: &tempfile::TempDir) -> PostStore {
    PostStore::open(dir.path().join("posts.json")).unwrap()
}

fn add_plain(store: &mut PostStore, n: usize) {
    for i in 0..n {
        let outcome = store
            .add_post(NewPost::new(
                format!("Unrated post {i}"),
                format!("shots/plain_{i}.png"),
            ))
            .unwrap();
        assert!(!outcome.is_duplicate());
    }
}

// ─────────────────────── dedup ───────────────────────

#[test]
fn test_identical_description_and_path_is_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = temp_store(&dir);

    let first = store
        .add_post(NewPost::new("A sunset", "shots/sunset.png"))
        .unwrap();
    let AddOutcome::Added(id) = first else {
        panic!("first add should succeed");
    };

    let second = store
        .add_post(NewPost::new("A sunset", "shots/sunset.png"))
        .unwrap();
    assert_eq!(second, AddOutcome::Duplicate { existing_id: id });
    assert_eq!(store.len(), 1);
}

#[test]
fn test_same_platform_id_with_different_description_is_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = temp_store(&dir);

    let first = store
        .add_post(
            NewPost::new("First description", "shots/x/x_1_tweet123.png")
                .with_platform("x")
                .with_platform_unique_id("tweet123"),
        )
        .unwrap();
    assert!(!first.is_duplicate());

    let second = store
        .add_post(
            NewPost::new("Completely different", "shots/x/x_7_tweet123.png")
                .with_platform("x")
                .with_platform_unique_id("tweet123"),
        )
        .unwrap();
    assert!(second.is_duplicate());
    assert_eq!(store.len(), 1);
}

#[test]
fn test_platform_ids_never_repeat() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = temp_store(&dir);

    // A mix of repeating ids, hashes and plain posts.
    for i in 0..60usize {
        let mut post = NewPost::new(format!("post {}", i % 7), format!("s/{}.png", i % 5));
        if i % 3 != 0 {
            post = post.with_platform_unique_id(format!("id-{}", i % 11));
        }
        if i % 4 == 0 {
            post = post.with_content_hash(format!("{:016x}", i % 9));
        }
        store.add_post(post).unwrap();
    }

    let mut seen = HashSet::new();
    for post in &store.state().posts {
        if let Some(id) = post.platform_unique_id.as_deref().filter(|s| !s.is_empty()) {
            assert!(seen.insert(id.to_string()), "duplicate platform id {id}");
        }
    }
}

// ─────────────────────── pointer pagination ───────────────────────

#[test]
fn test_fifteen_posts_window_then_move_forward() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = temp_store(&dir);
    add_plain(&mut store, 15);

    let window = store.get_posts(5, 0);
    assert_eq!(window.posts.len(), 5);
    assert_eq!(window.total_posts, 15);
    assert!(window.has_more);
    assert!(!window.has_previous);

    assert_eq!(
        store.move_forward(5).unwrap(),
        MoveOutcome::Moved { from: 0, to: 5 }
    );
    let window = store.get_posts(5, 0);
    assert_eq!(window.current_index, 5);
    assert!(window.has_previous);
}

#[test]
fn test_has_more_false_exactly_at_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = temp_store(&dir);
    add_plain(&mut store, 12);

    for index in 0..12 {
        store.go_to_index(index).unwrap();
        for page_size in 1..8 {
            for offset in -4..=4 {
                let window = store.get_posts(page_size, offset);
                assert_eq!(window.has_more, window.end < 12);
                assert_eq!(!window.has_more, window.end == 12);
                assert_eq!(window.posts.len(), window.end - window.start);
                assert_eq!(window.current_index, index);
            }
        }
    }
}

#[test]
fn test_pointer_stays_in_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = temp_store(&dir);
    add_plain(&mut store, 6);

    let moves: [(bool, usize); 8] = [
        (true, 2),
        (true, 100),
        (false, 1),
        (false, 100),
        (true, 0),
        (true, 5),
        (false, 3),
        (true, 1),
    ];
    for (forward, steps) in moves {
        if forward {
            store.move_forward(steps).unwrap();
        } else {
            store.move_backward(steps).unwrap();
        }
        let pos = store.current_position();
        assert!(pos.current_index < pos.total);
    }
    assert!(!store.go_to_index(6).unwrap());
    assert!(store.current_position().current_index < 6);
}

// ─────────────────────── category paging ───────────────────────

#[test]
fn test_category_pages_are_offset_based() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = temp_store(&dir);
    for i in 0..5 {
        store
            .add_post(NewPost::new(format!("x {i}"), format!("x{i}.png")).with_category("X"))
            .unwrap();
    }
    store
        .add_post(NewPost::new("other", "o.png").with_category("Y"))
        .unwrap();
    // Pointer position must not influence category paging.
    store.move_forward(4).unwrap();

    let first = store.posts_by_category_paginated("X", 3, 0);
    assert_eq!(first.posts.len(), 3);
    assert_eq!(first.total, 5);
    assert!(first.has_more);

    let second = store.posts_by_category_paginated("X", 3, 1);
    assert_eq!(second.posts.len(), 2);
    assert!(!second.has_more);

    let past_end = store.posts_by_category_paginated("X", 3, 5);
    assert!(past_end.posts.is_empty());
    assert!(!past_end.has_more);
}

// ─────────────────────── persistence ───────────────────────

#[test]
fn test_reopen_preserves_posts_and_pointer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("posts.json");

    let (posts, index) = {
        let mut store = PostStore::open(&path).unwrap();
        add_plain(&mut store, 4);
        store
            .add_post(
                NewPost::new("linked", "shots/linkedin/linkedin_1_a.png")
                    .with_platform("linkedin")
                    .with_platform_unique_id("urn:li:activity:1")
                    .with_content_hash("0123456789abcdef")
                    .with_original_post_id("orig-1")
                    .with_category("news")
                    .with_rating(7.0),
            )
            .unwrap();
        store.move_forward(3).unwrap();
        (store.state().posts.clone(), store.current_position().current_index)
    };

    let reopened = PostStore::open(&path).unwrap();
    assert_eq!(reopened.state().posts, posts);
    assert_eq!(reopened.current_position().current_index, index);
}

#[test]
fn test_opening_missing_file_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never.json");
    let store = PostStore::open(&path).unwrap();
    assert!(store.is_empty());
    assert!(!path.exists());
}
