//! Catalog entries: one archive or directory of pages.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LibraryError;

/// Primary key of a catalog entry
pub type EntryId = i64;

/// Backing storage of an entry's pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    /// Compressed archive (.zip / .cbz)
    Zip,

    /// Plain directory of image files
    Directory,
}

impl ContainerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Zip => "zip",
            ContainerKind::Directory => "directory",
        }
    }

    /// Detect the container kind of an on-disk path
    pub fn detect(path: &Path) -> Option<Self> {
        if path.is_dir() {
            return Some(ContainerKind::Directory);
        }

        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("zip") || ext.eq_ignore_ascii_case("cbz") {
            Some(ContainerKind::Zip)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContainerKind {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zip" => Ok(ContainerKind::Zip),
            "directory" => Ok(ContainerKind::Directory),
            _ => Err(LibraryError::invalid(format!("unknown container kind: {}", s))),
        }
    }
}

/// Axis-aligned rectangle in source-image pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl CropRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The zero rectangle
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Intersect with `[0, width) x [0, height)`
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let max_w = width.min(i32::MAX as u32) as i32;
        let max_h = height.min(i32::MAX as u32) as i32;

        let x = self.x.clamp(0, max_w);
        let y = self.y.clamp(0, max_h);
        let right = self.right().clamp(x, max_w);
        let bottom = self.bottom().clamp(y, max_h);

        Self::new(x, y, right - x, bottom - y)
    }
}

/// Which page the thumbnail comes from and how it is cropped.
///
/// An empty crop means "use the default crop for the page geometry".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailDescriptor {
    /// Logical page index used as cover
    pub index: usize,

    /// Crop window in that page's pixels
    pub crop: CropRect,
}

/// A catalog row for one archive or directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Storage identifier (0 until persisted)
    pub id: EntryId,

    /// Path relative to the data directory; unique
    pub name: String,

    /// When the entry was first cataloged
    pub create_time: DateTime<Utc>,

    /// Still present on disk as of the last scan
    pub active: bool,

    /// Excluded from every listing
    pub hidden: bool,

    /// Backing storage kind
    pub container_kind: ContainerKind,

    /// Logical page number -> native member position inside the container
    #[serde(default)]
    pub file_indices: Vec<usize>,

    /// Cover selection
    #[serde(default)]
    pub thumbnail: ThumbnailDescriptor,
}

impl CatalogEntry {
    /// Create a new, not yet persisted entry
    pub fn new(name: impl Into<String>, container_kind: ContainerKind) -> Self {
        Self {
            id: 0,
            name: name.into(),
            create_time: Utc::now(),
            active: true,
            hidden: false,
            container_kind,
            file_indices: Vec::new(),
            thumbnail: ThumbnailDescriptor::default(),
        }
    }

    /// Number of readable pages
    pub fn page_count(&self) -> usize {
        self.file_indices.len()
    }

    /// Native member position for a logical page
    pub fn native_index(&self, page: usize) -> Option<usize> {
        self.file_indices.get(page).copied()
    }

    /// Final path component of the entry name
    pub fn file_name(&self) -> &str {
        Path::new(&self.name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.name)
    }
}
