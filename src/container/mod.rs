//! Ordered page access over archives and directories.
//!
//! A container exposes its members in *native* order (the order the archive
//! or directory walk yields them). Catalog entries store a content-index
//! list that maps logical page numbers onto native positions, so page lookups
//! never re-sort.
//!
//! Every call opens the backing resource, reads what it needs and closes it
//! again; no handle outlives a call.

pub mod directory;
pub mod natural;
pub mod zip;

use std::io::Cursor;
use std::path::Path;

use crate::config::LibraryConfig;
use crate::domain::{CatalogEntry, ContainerKind};
use crate::error::Result;

pub use directory::DirectoryContainer;
pub use natural::{natural_cmp, natural_order};
pub use self::zip::ZipContainer;

/// One member read fully into memory
#[derive(Debug, Clone)]
pub struct ContainerItem {
    /// Display name (final path component of the member)
    pub name: String,
    pub data: Vec<u8>,
}

impl ContainerItem {
    /// Readable view over the member bytes
    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.data)
    }
}

/// The whole container as a single file
#[derive(Debug, Clone)]
pub struct ContainerDownload {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Uniform access to the pages of one catalog entry
pub trait Container: Send + Sync {
    /// Kind of backing storage
    fn kind(&self) -> ContainerKind;

    /// Member paths in logical page order
    fn list_entries(&self) -> Result<Vec<String>>;

    /// Read the member at logical page `index`
    fn open_entry(&self, index: usize) -> Result<ContainerItem>;

    /// Raw bytes of the whole container and a suggested filename
    fn download(&self) -> Result<ContainerDownload>;

    /// Compute the content-index list from the live container: image members
    /// sorted in natural order of their full path, as native positions.
    fn content_indices(&self) -> Result<Vec<usize>>;
}

/// Build the container for an entry
pub fn open_container(entry: &CatalogEntry, config: &LibraryConfig) -> Box<dyn Container> {
    let path = config.container_path(&entry.name);
    let extensions = config.image_extensions.clone();

    match entry.container_kind {
        ContainerKind::Zip => Box::new(ZipContainer::new(
            path,
            entry.file_indices.clone(),
            extensions,
        )),
        ContainerKind::Directory => Box::new(DirectoryContainer::new(
            path,
            entry.file_indices.clone(),
            extensions,
        )),
    }
}

/// Whether `name` ends in one of `extensions` (case-insensitive, no dot)
pub fn has_image_extension(name: &str, extensions: &[String]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Select image members and order them naturally, returning native positions
pub(crate) fn image_indices(native_names: &[String], extensions: &[String]) -> Vec<usize> {
    let candidates: Vec<(usize, &str)> = native_names
        .iter()
        .enumerate()
        .filter(|(_, name)| has_image_extension(name, extensions))
        .map(|(i, name)| (i, name.as_str()))
        .collect();

    let names: Vec<&str> = candidates.iter().map(|(_, name)| *name).collect();
    natural_order(&names)
        .into_iter()
        .map(|position| candidates[position].0)
        .collect()
}

/// Final path component of a member path, falling back to a numbered name
pub(crate) fn display_name(member: &str, index: usize) -> String {
    let base = member.rsplit(['/', '\\']).next().unwrap_or(member);

    if base.is_empty() {
        match Path::new(member).extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{:04}.{}", index, ext),
            None => format!("{:04}", index),
        }
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts() -> Vec<String> {
        vec!["jpg".to_string(), "png".to_string()]
    }

    #[test]
    fn test_image_indices_keep_native_positions() {
        let names: Vec<String> = [
            "readme.txt",
            "page10.jpg",
            "page2.jpg",
            "nested/",
            "page1.PNG",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        assert_eq!(image_indices(&names, &exts()), vec![4, 2, 1]);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("chapter 1/001.jpg", 0), "001.jpg");
        assert_eq!(display_name("001.jpg", 0), "001.jpg");
        assert_eq!(display_name("dir/", 7), "0007");
    }

    #[test]
    fn test_has_image_extension() {
        assert!(has_image_extension("a/b/C.JPG", &exts()));
        assert!(!has_image_extension("a/b/c.gif", &exts()));
        assert!(!has_image_extension("jpg", &exts()));
    }
}
