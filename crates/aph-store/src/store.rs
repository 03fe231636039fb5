//! Filesystem poster store.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use aph_core::{Error, ItemId, Result};

/// Extensions probed when reading, in preference order.
const EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Logical bucket a poster file lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PosterBucket {
    Original,
    Working,
    Modified,
}

impl PosterBucket {
    fn dir_name(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Working => "working",
            Self::Modified => "modified",
        }
    }
}

impl fmt::Display for PosterBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Metadata about a stored poster file.
#[derive(Debug, Clone)]
pub struct PosterFile {
    pub item_id: ItemId,
    pub bucket: PosterBucket,
    pub path: PathBuf,
    /// First 16 hex chars of the SHA-256 of the file contents.
    pub content_hash: String,
    /// Pixel dimensions, when the bytes decode as an image.
    pub dimensions: Option<(u32, u32)>,
}

/// Byte length of the digest prefix kept as the content hash.
///
/// Half of a SHA-256 digest (16 hex characters) is far beyond collision
/// range for one media library while staying readable in logs and rows.
const HASH_PREFIX_BYTES: usize = 8;

/// Hash poster bytes for change detection.
pub fn content_hash(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex::encode(&digest[..HASH_PREFIX_BYTES])
}

/// Sniff the stored extension from the leading bytes, defaulting to jpg.
fn sniff_extension(data: &[u8]) -> &'static str {
    match image::guess_format(data) {
        Ok(image::ImageFormat::Png) => "png",
        Ok(image::ImageFormat::WebP) => "webp",
        _ => "jpg",
    }
}

/// Filesystem manager for the three poster buckets.
pub struct PosterStore {
    root: PathBuf,
}

impl PosterStore {
    /// Create a store rooted at `root`, creating the bucket directories.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for bucket in [
            PosterBucket::Original,
            PosterBucket::Working,
            PosterBucket::Modified,
        ] {
            std::fs::create_dir_all(root.join(bucket.dir_name()))?;
        }
        Ok(Self { root })
    }

    fn path_for(&self, item_id: &ItemId, bucket: PosterBucket, ext: &str) -> PathBuf {
        self.root
            .join(bucket.dir_name())
            .join(format!("{}.{ext}", item_id))
    }

    /// Find the existing file for an item in a bucket, probing extensions in
    /// preference order.
    pub fn find(&self, item_id: &ItemId, bucket: PosterBucket) -> Option<PathBuf> {
        EXTENSIONS
            .iter()
            .map(|ext| self.path_for(item_id, bucket, ext))
            .find(|p| p.exists())
    }

    /// Whether a file exists for the item in the bucket.
    pub fn exists(&self, item_id: &ItemId, bucket: PosterBucket) -> bool {
        self.find(item_id, bucket).is_some()
    }

    /// Save the original poster exactly once.
    ///
    /// The write is atomic (tmp + rename). If an original already exists the
    /// call is a benign no-op returning the existing file; first writer wins
    /// under concurrency.
    pub fn save_original(&self, item_id: &ItemId, data: &[u8]) -> Result<PosterFile> {
        if let Some(existing) = self.find(item_id, PosterBucket::Original) {
            let bytes = std::fs::read(&existing)?;
            return Ok(self.describe(item_id, PosterBucket::Original, existing, &bytes));
        }

        let ext = sniff_extension(data);
        let final_path = self.path_for(item_id, PosterBucket::Original, ext);
        let tmp_path = final_path.with_extension(format!("{ext}.tmp"));

        std::fs::write(&tmp_path, data)?;
        match std::fs::rename(&tmp_path, &final_path) {
            Ok(()) => {}
            Err(e) => {
                let _ = std::fs::remove_file(&tmp_path);
                // A concurrent writer may have landed first; that is fine.
                if final_path.exists() {
                    tracing::debug!(item = %item_id, "original already written by another worker");
                } else {
                    return Err(Error::from(e));
                }
            }
        }

        let bytes = std::fs::read(&final_path)?;
        Ok(self.describe(item_id, PosterBucket::Original, final_path, &bytes))
    }

    /// Replace the stored original with new canonical bytes.
    ///
    /// This is the explicit-cleanup path used when a poster is swapped for
    /// a different source image; the normal pipeline never calls it. The
    /// stale modified copy is dropped too, since it derived from the old
    /// original.
    pub fn replace_original(&self, item_id: &ItemId, data: &[u8]) -> Result<PosterFile> {
        if let Some(old) = self.find(item_id, PosterBucket::Original) {
            std::fs::remove_file(&old)?;
        }
        self.delete_modified(item_id)?;
        self.save_original(item_id, data)
    }

    /// Write scratch bytes for an item. Overwrite allowed.
    pub fn write_working(&self, item_id: &ItemId, data: &[u8]) -> Result<PosterFile> {
        self.replace(item_id, PosterBucket::Working, data)
    }

    /// Save the badged output. Overwrite allowed.
    pub fn save_modified(&self, item_id: &ItemId, data: &[u8]) -> Result<PosterFile> {
        self.replace(item_id, PosterBucket::Modified, data)
    }

    fn replace(&self, item_id: &ItemId, bucket: PosterBucket, data: &[u8]) -> Result<PosterFile> {
        // Drop any stale file with a different extension first.
        if let Some(old) = self.find(item_id, bucket) {
            std::fs::remove_file(&old)?;
        }
        let ext = sniff_extension(data);
        let path = self.path_for(item_id, bucket, ext);
        std::fs::write(&path, data)?;
        Ok(self.describe(item_id, bucket, path, data))
    }

    /// Read the bytes for an item in a bucket.
    pub fn read(&self, item_id: &ItemId, bucket: PosterBucket) -> Result<Vec<u8>> {
        let path = self.find(item_id, bucket).ok_or_else(|| {
            Error::StorageConflict(format!("no {bucket} poster for item {item_id}"))
        })?;
        Ok(std::fs::read(path)?)
    }

    /// Delete the modified poster, if present.
    pub fn delete_modified(&self, item_id: &ItemId) -> Result<bool> {
        match self.find(item_id, PosterBucket::Modified) {
            Some(path) => {
                std::fs::remove_file(path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove the transient working file, if present. Never fails the item.
    pub fn clear_working(&self, item_id: &ItemId) {
        if let Some(path) = self.find(item_id, PosterBucket::Working) {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(item = %item_id, error = %e, "failed to clear working poster");
            }
        }
    }

    /// Item IDs with a stored original (the restore-all work list).
    pub fn list_originals(&self) -> Result<Vec<ItemId>> {
        let dir = self.root.join(PosterBucket::Original.dir_name());
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some((stem, ext)) = name.rsplit_once('.') {
                if EXTENSIONS.contains(&ext) {
                    ids.push(ItemId::new(stem));
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn describe(
        &self,
        item_id: &ItemId,
        bucket: PosterBucket,
        path: PathBuf,
        data: &[u8],
    ) -> PosterFile {
        PosterFile {
            item_id: item_id.clone(),
            bucket,
            path,
            content_hash: content_hash(data),
            dimensions: image::load_from_memory(data)
                .ok()
                .map(|img| (img.width(), img.height())),
        }
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn store() -> (tempfile::TempDir, PosterStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PosterStore::new(dir.path().join("posters")).unwrap();
        (dir, store)
    }

    #[test]
    fn hash_is_16_hex_and_deterministic() {
        let h1 = content_hash(b"poster bytes");
        let h2 = content_hash(b"poster bytes");
        assert_eq!(h1.len(), 16);
        assert_eq!(h1, h2);
        assert_ne!(content_hash(b"other"), h1);
    }

    #[test]
    fn save_original_once_only() {
        let (_dir, store) = store();
        let item = ItemId::new("item-1");
        let first = png_bytes(4, 6);

        let saved = store.save_original(&item, &first).unwrap();
        assert_eq!(saved.dimensions, Some((4, 6)));
        assert_eq!(saved.content_hash, content_hash(&first));

        // A second save with different bytes must not overwrite.
        let second = png_bytes(8, 8);
        let again = store.save_original(&item, &second).unwrap();
        assert_eq!(again.content_hash, content_hash(&first));
        assert_eq!(store.read(&item, PosterBucket::Original).unwrap(), first);
    }

    #[test]
    fn replace_original_swaps_canonical_bytes() {
        let (_dir, store) = store();
        let item = ItemId::new("item-r");
        let first = png_bytes(4, 4);
        store.save_original(&item, &first).unwrap();
        store.save_modified(&item, &png_bytes(4, 4)).unwrap();

        let second = png_bytes(9, 9);
        let replaced = store.replace_original(&item, &second).unwrap();
        assert_eq!(replaced.content_hash, content_hash(&second));
        assert_eq!(store.read(&item, PosterBucket::Original).unwrap(), second);
        // the derived modified copy is dropped with its source
        assert!(!store.exists(&item, PosterBucket::Modified));
    }

    #[test]
    fn modified_overwrites() {
        let (_dir, store) = store();
        let item = ItemId::new("item-2");

        store.save_modified(&item, &png_bytes(2, 2)).unwrap();
        let newer = png_bytes(3, 3);
        store.save_modified(&item, &newer).unwrap();

        assert_eq!(store.read(&item, PosterBucket::Modified).unwrap(), newer);
    }

    #[test]
    fn read_missing_is_storage_conflict() {
        let (_dir, store) = store();
        let err = store
            .read(&ItemId::new("nope"), PosterBucket::Original)
            .unwrap_err();
        assert_eq!(err.kind(), aph_core::ErrorKind::StorageConflict);
    }

    #[test]
    fn delete_modified_reports_presence() {
        let (_dir, store) = store();
        let item = ItemId::new("item-3");
        assert!(!store.delete_modified(&item).unwrap());

        store.save_modified(&item, &png_bytes(2, 2)).unwrap();
        assert!(store.delete_modified(&item).unwrap());
        assert!(!store.exists(&item, PosterBucket::Modified));
    }

    #[test]
    fn working_is_transient() {
        let (_dir, store) = store();
        let item = ItemId::new("item-4");
        store.write_working(&item, &png_bytes(2, 2)).unwrap();
        assert!(store.exists(&item, PosterBucket::Working));

        store.clear_working(&item);
        assert!(!store.exists(&item, PosterBucket::Working));
        // clearing again is harmless
        store.clear_working(&item);
    }

    #[test]
    fn extension_follows_content() {
        let (_dir, store) = store();
        let item = ItemId::new("item-5");
        let saved = store.save_original(&item, &png_bytes(2, 2)).unwrap();
        assert!(saved.path.to_string_lossy().ends_with(".png"));
    }

    #[test]
    fn list_originals_sorted() {
        let (_dir, store) = store();
        store.save_original(&ItemId::new("b"), &png_bytes(2, 2)).unwrap();
        store.save_original(&ItemId::new("a"), &png_bytes(2, 2)).unwrap();

        let ids = store.list_originals().unwrap();
        assert_eq!(ids, vec![ItemId::new("a"), ItemId::new("b")]);
    }

    #[test]
    fn non_image_bytes_still_store() {
        let (_dir, store) = store();
        let item = ItemId::new("item-6");
        let saved = store.save_modified(&item, b"not an image").unwrap();
        assert_eq!(saved.dimensions, None);
        // unknown content defaults to jpg
        assert!(saved.path.to_string_lossy().ends_with(".jpg"));
    }
}
