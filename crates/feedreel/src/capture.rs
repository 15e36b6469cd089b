//! Snapshot helpers: path convention, content fingerprint and validation.

use std::path::{Path, PathBuf};

use image::{GenericImageView, ImageFormat};
use sha2::{Digest, Sha256};

use crate::types::{StoreError, StoreResult};

/// Number of hex characters of the sha256 digest kept as `contentHash`.
pub const CONTENT_HASH_LEN: usize = 16;

/// Longest unique-id fragment kept in a snapshot file name.
const MAX_ID_COMPONENT: usize = 80;

/// Hex sha256 of `bytes`, truncated to [`CONTENT_HASH_LEN`].
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = format!("{digest:x}");
    hex.truncate(CONTENT_HASH_LEN);
    hex
}

/// Replace anything that is not filename-safe with `_`.
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_ID_COMPONENT)
        .collect();
    if cleaned.is_empty() {
        "item".to_string()
    } else {
        cleaned
    }
}

/// `{dir}/{platform}/{platform}_{ordinal}_{unique_id}.png`
pub fn snapshot_path(dir: &Path, platform: &str, ordinal: usize, unique_id: &str) -> PathBuf {
    let platform = sanitize_component(platform);
    dir.join(&platform).join(format!(
        "{platform}_{ordinal}_{}.png",
        sanitize_component(unique_id)
    ))
}

/// Decode PNG bytes far enough to get their dimensions.
///
/// Rejects undecodable data and zero-area images, which is what an element
/// screenshot of a collapsed or detached node produces.
pub fn snapshot_dimensions(bytes: &[u8]) -> StoreResult<(u32, u32)> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map_err(|e| StoreError::Snapshot(format!("Undecodable snapshot: {e}")))?;
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(StoreError::Snapshot(format!("Empty snapshot: {w}x{h}")));
    }
    Ok((w, h))
}

/// Write snapshot bytes, creating the platform directory as needed.
pub fn write_snapshot(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(width, height);
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        img.write_with_encoder(encoder).unwrap();
        buf
    }

    #[test]
    fn test_content_hash_is_truncated_sha256() {
        // sha256("abc") = ba7816bf8f01cfea...
        assert_eq!(content_hash(b"abc"), "ba7816bf8f01cfea");
        assert_eq!(content_hash(b"abc").len(), CONTENT_HASH_LEN);
        assert_ne!(content_hash(b"abc"), content_hash(b"abd"));
    }

    #[test]
    fn test_snapshot_path_convention() {
        let path = snapshot_path(Path::new("/tmp/shots"), "x", 3, "1789");
        assert_eq!(path, PathBuf::from("/tmp/shots/x/x_3_1789.png"));
    }

    #[test]
    fn test_snapshot_path_sanitizes_ids() {
        let path = snapshot_path(Path::new("shots"), "linkedin", 1, "urn:li:activity:42");
        assert_eq!(
            path,
            PathBuf::from("shots/linkedin/linkedin_1_urn_li_activity_42.png")
        );
        assert_eq!(sanitize_component(""), "item");
        assert_eq!(sanitize_component("../etc"), "___etc");
    }

    #[test]
    fn test_snapshot_dimensions() {
        assert_eq!(snapshot_dimensions(&make_png(40, 30)).unwrap(), (40, 30));
        assert!(snapshot_dimensions(b"not a png").is_err());
    }

    #[test]
    fn test_write_snapshot_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = snapshot_path(dir.path(), "x", 1, "abc");
        write_snapshot(&path, &make_png(2, 2)).unwrap();
        assert!(path.exists());
    }
}
