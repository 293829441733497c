//! Cover thumbnails: default crop geometry and the on-disk cache.
//!
//! Thumbnails are cached under `<cache>/thumbnails/` in files named after the
//! entry id and its cover selection (`<id>-<index>-<x>_<y>_<w>_<h>.jpg`), so a
//! render of a superseded selection can never be served for the current one.
//! Every file of an entry is deleted whenever its cover selection changes;
//! the new one is generated on the next read. Writes go through a uniquely
//! named temp file and a rename, so concurrent regeneration is harmless.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use tracing::{debug, warn};
use uuid::Uuid;

use super::delivery::{decode_oriented, encode_jpeg};
use crate::config::{LibraryConfig, TARGET_ASPECT_RATIO};
use crate::container::Container;
use crate::domain::{CatalogEntry, CropRect, EntryId};
use crate::error::Result;

/// Default cover crop for a page of the given size.
///
/// Wide pages keep the full height and take a window of the target aspect
/// ratio centred at 25% of the width, which is where the cover sits on a
/// two-page spread. Tall pages keep the full width and take a vertically
/// centred window. Degenerate sizes yield the empty rectangle.
pub fn default_crop(width: i32, height: i32) -> CropRect {
    if width <= 0 || height <= 0 {
        return CropRect::empty();
    }

    let (w, h) = (width as f64, height as f64);
    let aspect = w / h;

    if aspect > TARGET_ASPECT_RATIO {
        let new_width = (h * TARGET_ASPECT_RATIO).round();
        let new_x = ((w * 0.25).round() - new_width / 2.0).max(0.0);

        let x = new_x as i32;
        let right = (new_x + new_width) as i32;
        CropRect::new(x, 0, right - x, height)
    } else if aspect < TARGET_ASPECT_RATIO {
        let new_height = (w / TARGET_ASPECT_RATIO).round() as i32;
        let new_y = ((height - new_height) as f64 / 2.0).round() as i32;

        CropRect::new(0, new_y, width, new_height)
    } else {
        CropRect::new(0, 0, width, height)
    }
}

fn cache_key(entry: &CatalogEntry) -> String {
    let crop = entry.thumbnail.crop;
    format!(
        "{}-{}-{}_{}_{}_{}",
        entry.id, entry.thumbnail.index, crop.x, crop.y, crop.width, crop.height
    )
}

/// Generates and caches entry thumbnails
#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    dir: PathBuf,
    height: u32,
    quality: u8,
}

impl ThumbnailCache {
    pub fn new(dir: impl Into<PathBuf>, height: u32, quality: u8) -> Self {
        Self {
            dir: dir.into(),
            height: height.max(1),
            quality,
        }
    }

    pub fn from_config(config: &LibraryConfig) -> Self {
        Self::new(
            config.thumbnail_dir(),
            config.thumbnail.height,
            config.thumbnail.quality,
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file for an entry's current cover selection
    pub fn path_for(&self, entry: &CatalogEntry) -> PathBuf {
        self.dir.join(format!("{}.jpg", cache_key(entry)))
    }

    pub fn is_cached(&self, entry: &CatalogEntry) -> bool {
        self.path_for(entry).is_file()
    }

    /// Every cached file of an entry, whatever selection it was rendered for
    pub fn files_for(&self, id: EntryId) -> Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let prefix = format!("{}-", id);
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".jpg"));
            if matches {
                files.push(path);
            }
        }

        Ok(files)
    }

    /// Cached thumbnail bytes, generating them from the container on a miss
    pub fn get_or_create(&self, entry: &CatalogEntry, container: &dyn Container) -> Result<Vec<u8>> {
        let path = self.path_for(entry);

        match std::fs::read(&path) {
            Ok(data) => return Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let page = container.open_entry(entry.thumbnail.index)?;
        let data = self.render(&page.data, entry.thumbnail.crop)?;
        self.store(entry, &data)?;

        debug!(id = entry.id, bytes = data.len(), "Generated thumbnail");
        Ok(data)
    }

    /// Crop and scale one page into a thumbnail.
    ///
    /// An empty `crop` selects the default crop for the page geometry.
    pub fn render(&self, page: &[u8], crop: CropRect) -> Result<Vec<u8>> {
        let image = decode_oriented(page)?;
        let (width, height) = (image.width(), image.height());

        let crop = if crop.is_empty() {
            default_crop(width as i32, height as i32)
        } else {
            crop
        };

        let crop = crop.clamp_to(width, height);
        let cropped = if crop.is_empty() {
            image
        } else {
            image.crop_imm(
                crop.x as u32,
                crop.y as u32,
                crop.width as u32,
                crop.height as u32,
            )
        };

        let scaled = if cropped.height() > self.height {
            let new_width = (cropped.width() as u64 * self.height as u64
                / cropped.height() as u64)
                .max(1) as u32;
            cropped.resize_exact(new_width, self.height, FilterType::Lanczos3)
        } else {
            cropped
        };

        encode_jpeg(&scaled, self.quality)
    }

    /// Remove an entry's cached thumbnails; failures are logged only
    pub fn delete(&self, id: EntryId) {
        let files = match self.files_for(id) {
            Ok(files) => files,
            Err(e) => {
                warn!(id, "Failed to list cached thumbnails: {}", e);
                return;
            }
        };

        for path in files {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(id, path = %path.display(), "Deleted cached thumbnail"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(id, path = %path.display(), "Failed to delete thumbnail: {}", e),
            }
        }
    }

    /// Remove every cached thumbnail, returning how many were deleted
    pub fn purge(&self) -> Result<usize> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), "Failed to delete thumbnail: {}", e),
            }
        }

        Ok(removed)
    }

    fn store(&self, entry: &CatalogEntry, data: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let temp = self
            .dir
            .join(format!(".{}.{}.tmp", cache_key(entry), Uuid::new_v4()));
        std::fs::write(&temp, data)?;

        if let Err(e) = std::fs::rename(&temp, self.path_for(entry)) {
            if let Err(cleanup) = std::fs::remove_file(&temp) {
                warn!(path = %temp.display(), "Failed to remove temp thumbnail: {}", cleanup);
            }
            return Err(e.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContainerKind, ThumbnailDescriptor};
    use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([90, 30, 200])));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_default_crop_horizontal_narrow() {
        assert_eq!(default_crop(200, 150), CropRect::new(0, 0, 106, 150));
    }

    #[test]
    fn test_default_crop_horizontal_wide() {
        assert_eq!(default_crop(500, 150), CropRect::new(72, 0, 106, 150));
    }

    #[test]
    fn test_default_crop_vertical() {
        assert_eq!(default_crop(200, 500), CropRect::new(0, 109, 200, 283));
    }

    #[test]
    fn test_default_crop_a_series() {
        assert_eq!(default_crop(200, 283), CropRect::new(0, 0, 200, 283));
    }

    #[test]
    fn test_default_crop_degenerate() {
        assert!(default_crop(0, 100).is_empty());
        assert!(default_crop(100, -1).is_empty());
    }

    #[test]
    fn test_default_crop_stays_inside_image() {
        for (w, h) in [(1, 1), (3, 1000), (1000, 3), (1920, 1080), (707, 1000)] {
            let crop = default_crop(w, h);
            assert!(crop.x >= 0 && crop.y >= 0, "{:?} for {}x{}", crop, w, h);
            assert!(crop.right() <= w && crop.bottom() <= h, "{:?} for {}x{}", crop, w, h);
        }
    }

    #[test]
    fn test_render_scales_to_height() {
        let cache = ThumbnailCache::new("/unused", 100, 80);
        let data = cache.render(&png(200, 500), CropRect::empty()).unwrap();

        let thumb = image::load_from_memory(&data).unwrap();
        assert_eq!(thumb.height(), 100);
        assert_eq!(thumb.dimensions().0, 70);
    }

    #[test]
    fn test_render_uses_explicit_crop() {
        let cache = ThumbnailCache::new("/unused", 500, 80);
        let data = cache.render(&png(200, 200), CropRect::new(10, 10, 50, 40)).unwrap();

        let thumb = image::load_from_memory(&data).unwrap();
        assert_eq!(thumb.dimensions(), (50, 40));
    }

    fn entry(id: EntryId, index: usize, crop: CropRect) -> CatalogEntry {
        let mut entry = CatalogEntry::new(format!("{}.zip", id), ContainerKind::Zip);
        entry.id = id;
        entry.file_indices = vec![0, 1, 2];
        entry.thumbnail = ThumbnailDescriptor { index, crop };
        entry
    }

    #[test]
    fn test_delete_and_purge() {
        let temp = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(temp.path().join("thumbnails"), 100, 80);
        let one = entry(1, 0, CropRect::empty());
        let two = entry(2, 0, CropRect::empty());

        // Nothing cached yet
        cache.delete(1);
        assert_eq!(cache.purge().unwrap(), 0);

        cache.store(&one, b"one").unwrap();
        cache.store(&two, b"two").unwrap();
        assert!(cache.is_cached(&one));

        cache.delete(1);
        assert!(!cache.is_cached(&one));
        assert!(cache.is_cached(&two));
        assert_eq!(cache.purge().unwrap(), 1);
        assert!(!cache.is_cached(&two));
    }

    #[test]
    fn test_late_write_for_old_cover_is_not_served() {
        let temp = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(temp.path().join("thumbnails"), 100, 80);
        let before = entry(7, 0, CropRect::empty());
        let after = entry(7, 2, CropRect::new(1, 2, 30, 40));

        // A render of the old selection finishing after the cover changed
        cache.delete(7);
        cache.store(&before, b"stale").unwrap();

        assert_ne!(cache.path_for(&before), cache.path_for(&after));
        assert!(!cache.is_cached(&after));
        assert_eq!(cache.files_for(7).unwrap().len(), 1);

        cache.store(&after, b"fresh").unwrap();
        assert_eq!(std::fs::read(cache.path_for(&after)).unwrap(), b"fresh");

        cache.delete(7);
        assert!(cache.files_for(7).unwrap().is_empty());
    }

    #[test]
    fn test_ids_sharing_a_prefix_are_kept_apart() {
        let temp = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(temp.path().join("thumbnails"), 100, 80);
        cache.store(&entry(1, 0, CropRect::empty()), b"one").unwrap();
        cache.store(&entry(12, 0, CropRect::empty()), b"twelve").unwrap();

        cache.delete(1);

        assert!(cache.is_cached(&entry(12, 0, CropRect::empty())));
        assert!(cache.files_for(1).unwrap().is_empty());
    }
}
