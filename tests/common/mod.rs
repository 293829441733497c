//! Shared fixtures: synthetic page images, archives and a library rooted in
//! a temporary directory.

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use folio::{CatalogQuery, EntryId, LibraryConfig, LibraryService, SqliteStore};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Solid-color PNG of the given size
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([180, 40, 40]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Deterministic incompressible bytes
pub fn noise(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x2545_f491;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

/// Write a stored zip; names ending in '/' become directory members
pub fn write_zip(path: &Path, members: &[(&str, Vec<u8>)]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }

    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for (name, data) in members {
        if name.ends_with('/') {
            zip.add_directory(name.trim_end_matches('/'), options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
    }

    zip.finish().unwrap();
}

/// Write a directory of files, creating nested folders
pub fn write_dir(root: &Path, members: &[(&str, Vec<u8>)]) {
    for (name, data) in members {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }
}

/// Library over an in-memory store and temporary data/cache directories
pub struct TestLibrary {
    pub temp: TempDir,
    pub service: Arc<LibraryService>,
}

impl TestLibrary {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut LibraryConfig)) -> Self {
        let temp = TempDir::new().unwrap();
        let mut config = LibraryConfig::with_paths(
            temp.path().join("data"),
            temp.path().join("cache"),
            temp.path().join("folio.db"),
        );
        adjust(&mut config);
        fs::create_dir_all(&config.data_path).unwrap();

        let store = SqliteStore::open_in_memory().unwrap();
        let service = Arc::new(LibraryService::new(config, Arc::new(store)));

        Self { temp, service }
    }

    pub fn data_path(&self) -> PathBuf {
        self.service.config().data_path.clone()
    }

    /// Number of cached thumbnail files held for an entry
    pub fn cached_thumbnails(&self, id: EntryId) -> usize {
        self.service.thumbnails().files_for(id).unwrap().len()
    }

    /// Write a zip of `pages` 60x80 PNG pages under the data directory
    pub fn add_zip(&self, name: &str, pages: usize) -> PathBuf {
        let names: Vec<String> = (1..=pages).map(|i| format!("{:03}.png", i)).collect();
        let members: Vec<(&str, Vec<u8>)> =
            names.iter().map(|n| (n.as_str(), png(60, 80))).collect();

        let path = self.data_path().join(name);
        write_zip(&path, &members);
        path
    }

    /// Write and register a zip, returning the new entry id
    pub async fn register_zip(&self, name: &str, pages: usize) -> EntryId {
        self.add_zip(name, pages);
        self.service.register(name).await.unwrap().id
    }

    /// Names of the entries a query returns, in order
    pub async fn names(&self, query: &CatalogQuery) -> Vec<String> {
        self.service
            .list(query)
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|item| item.name)
            .collect()
    }
}
