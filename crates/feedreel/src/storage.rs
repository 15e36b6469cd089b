//! JSON document reader/writer for the post store.
//!
//! The whole [`PostStoreState`] is one pretty-printed JSON document. Writes
//! go to a sibling `.tmp` file which is then renamed over the target, so a
//! crash mid-write leaves the previous document intact.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::types::{PostStoreState, StoreError, StoreResult};

/// Writer for store documents.
pub struct DocumentWriter;

/// Reader for store documents.
pub struct DocumentReader;

impl DocumentWriter {
    /// Write the store state to `path`, replacing any existing document.
    pub fn write_to_file(state: &PostStoreState, path: &Path) -> StoreResult<()> {
        let persistence = |source: std::io::Error| StoreError::Persistence {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(persistence)?;
            }
        }

        let tmp = temp_path(path);
        let mut file = std::fs::File::create(&tmp).map_err(persistence)?;
        Self::write_to(state, &mut file)?;
        file.sync_all().map_err(persistence)?;
        drop(file);

        std::fs::rename(&tmp, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            persistence(e)
        })?;

        tracing::debug!(
            "Saved store document: {} ({} posts)",
            path.display(),
            state.posts.len()
        );
        Ok(())
    }

    /// Write the store state to any writer.
    pub fn write_to<W: Write>(state: &PostStoreState, writer: &mut W) -> StoreResult<()> {
        serde_json::to_writer_pretty(&mut *writer, state)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl DocumentReader {
    /// Read a store document from `path`.
    ///
    /// Out-of-range pointers from hand-edited documents are clamped rather
    /// than rejected.
    pub fn read_from_file(path: &Path) -> StoreResult<PostStoreState> {
        let mut file = std::fs::File::open(path)?;
        Self::read_from(&mut file).map_err(|e| match e {
            StoreError::Json(err) => StoreError::InvalidDocument {
                path: path.to_path_buf(),
                reason: err.to_string(),
            },
            other => other,
        })
    }

    /// Read a store document from any reader.
    pub fn read_from<R: Read>(reader: &mut R) -> StoreResult<PostStoreState> {
        let mut state: PostStoreState = serde_json::from_reader(reader)?;
        if state.clamp_index() {
            tracing::warn!(
                "Store pointer was out of range; clamped to {}",
                state.current_index
            );
        }
        Ok(state)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = format!(
        "{}.tmp",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("posts.json")
    );
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Post;
    use chrono::{TimeZone, Utc};

    fn make_test_post(n: u32) -> Post {
        Post {
            id: format!("post_{n}"),
            description: format!("Post number {n}"),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, n).unwrap(),
            rating: if n % 2 == 0 { Some(1.0) } else { None },
            platform: Some("linkedin".to_string()),
            original_post_id: None,
            platform_unique_id: Some(format!("urn:li:activity:{n}")),
            content_hash: Some(format!("{n:016x}")),
            screenshot_path: format!("shots/linkedin/linkedin_{n}_{n}.png"),
            category: None,
        }
    }

    #[test]
    fn test_roundtrip_empty() {
        let state = PostStoreState::default();
        let mut buf = Vec::new();
        DocumentWriter::write_to(&state, &mut buf).unwrap();

        let loaded = DocumentReader::read_from(&mut &buf[..]).unwrap();
        assert!(loaded.posts.is_empty());
        assert_eq!(loaded.current_index, 0);
    }

    #[test]
    fn test_timestamps_are_iso8601() {
        let state = PostStoreState {
            posts: vec![make_test_post(7)],
            ..PostStoreState::default()
        };
        let mut buf = Vec::new();
        DocumentWriter::write_to(&state, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\"2025-03-01T12:00:07Z\""));
        assert!(text.contains("\"currentIndex\": 0"));
    }

    #[test]
    fn test_out_of_range_pointer_is_clamped() {
        let doc = r#"{"posts": [], "currentIndex": 12, "version": "1.0"}"#;
        let loaded = DocumentReader::read_from(&mut doc.as_bytes()).unwrap();
        assert_eq!(loaded.current_index, 0);
    }

    #[test]
    fn test_invalid_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = DocumentReader::read_from_file(&path).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument { .. }));
    }

    #[test]
    fn test_file_roundtrip_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("posts.json");

        let state = PostStoreState {
            posts: vec![make_test_post(1), make_test_post(2)],
            current_index: 1,
            ..PostStoreState::default()
        };

        DocumentWriter::write_to_file(&state, &path).unwrap();
        assert!(!temp_path(&path).exists());

        let loaded = DocumentReader::read_from_file(&path).unwrap();
        assert_eq!(loaded, state);
    }
}
