//! Configuration for the folio library.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (FOLIO_DATA_PATH, FOLIO_CACHE_PATH, FOLIO_DATABASE,
//!    FOLIO_FIRST_DIR_AS_TAG)
//! 2. Config file (.folio/config.yaml, or an explicit path)
//! 3. Defaults (./data, the platform cache directory, ./folio.db)
//!
//! Config file discovery:
//! - Searches current directory and parents for .folio/config.yaml
//! - Paths in config file are relative to the directory containing .folio/
//!
//! The resolved value is passed explicitly to every component; nothing reads
//! configuration from global state.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Target thumbnail aspect ratio (width / height), ISO A-series
pub const TARGET_ASPECT_RATIO: f64 = 1.0 / 1.41421356237;

/// Size of one frame in chunked transfers (1 MiB)
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Extensions treated as pages when none are configured
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub library: Option<LibrarySection>,
    #[serde(default)]
    pub thumbnail: Option<ThumbnailSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the containers (relative to config file)
    pub data: Option<String>,
    /// Thumbnail cache directory (relative to config file)
    pub cache: Option<String>,
    /// SQLite database file (relative to config file)
    pub database: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibrarySection {
    pub image_extensions: Option<Vec<String>>,
    pub first_dir_as_tag: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThumbnailSection {
    pub height: Option<u32>,
    pub quality: Option<u8>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Directory containing archives and page directories
    pub data_path: PathBuf,
    /// Directory for derived files (thumbnails)
    pub cache_path: PathBuf,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Lower-case extensions (without dot) recognized as pages
    pub image_extensions: Vec<String>,
    /// Use the first path segment of an entry name as an extra tag
    pub first_dir_as_tag: bool,
    /// Thumbnail settings
    pub thumbnail: ThumbnailSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ThumbnailSettings {
    /// Maximum thumbnail height in pixels
    pub height: u32,
    /// JPEG quality for every re-encoded image
    pub quality: u8,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            height: 512,
            quality: 85,
        }
    }
}

impl LibraryConfig {
    /// Configuration rooted at explicit directories, everything else default
    pub fn with_paths(
        data_path: impl Into<PathBuf>,
        cache_path: impl Into<PathBuf>,
        database_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            data_path: data_path.into(),
            cache_path: cache_path.into(),
            database_path: database_path.into(),
            image_extensions: default_extensions(),
            first_dir_as_tag: false,
            thumbnail: ThumbnailSettings::default(),
            config_file: None,
        }
    }

    /// Load from all sources, discovering the config file
    pub fn load() -> Result<Self> {
        Self::load_with(find_config_file())
    }

    /// Load using a specific config file
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::load_with(Some(path.to_path_buf()))
    }

    /// Whether a member path names a recognized page image
    pub fn is_image_file(&self, name: &str) -> bool {
        crate::container::has_image_extension(name, &self.image_extensions)
    }

    /// Absolute path of a container named relative to the data directory
    pub fn container_path(&self, name: &str) -> PathBuf {
        self.data_path.join(name)
    }

    /// Directory holding cached thumbnails
    pub fn thumbnail_dir(&self) -> PathBuf {
        self.cache_path.join("thumbnails")
    }

    fn load_with(config_file: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::defaults();

        if let Some(ref config_path) = config_file {
            let file = load_config_file(config_path)?;

            // Base directory is the parent of .folio/ (i.e., grandparent of config.yaml)
            let folio_dir = config_path.parent().unwrap_or(Path::new("."));
            let base_dir = if folio_dir.file_name().is_some_and(|n| n == ".folio") {
                folio_dir.parent().unwrap_or(Path::new("."))
            } else {
                folio_dir
            };

            config.apply_file(&file, base_dir);
        }

        config.apply_env();
        config.config_file = config_file;
        Ok(config)
    }

    fn defaults() -> Self {
        let cache = dirs::cache_dir()
            .map(|dir| dir.join("folio"))
            .unwrap_or_else(|| PathBuf::from("./cache"));

        Self::with_paths("./data", cache, "./folio.db")
    }

    fn apply_file(&mut self, file: &ConfigFile, base_dir: &Path) {
        if let Some(ref data) = file.paths.data {
            self.data_path = resolve_path(base_dir, data);
        }
        if let Some(ref cache) = file.paths.cache {
            self.cache_path = resolve_path(base_dir, cache);
        }
        if let Some(ref database) = file.paths.database {
            self.database_path = resolve_path(base_dir, database);
        }

        if let Some(ref library) = file.library {
            if let Some(ref extensions) = library.image_extensions {
                self.image_extensions = normalize_extensions(extensions);
            }
            if let Some(first_dir_as_tag) = library.first_dir_as_tag {
                self.first_dir_as_tag = first_dir_as_tag;
            }
        }

        if let Some(ref thumbnail) = file.thumbnail {
            if let Some(height) = thumbnail.height {
                self.thumbnail.height = height.max(1);
            }
            if let Some(quality) = thumbnail.quality {
                self.thumbnail.quality = quality.clamp(1, 100);
            }
        }
    }

    fn apply_env(&mut self) {
        if let Ok(data) = std::env::var("FOLIO_DATA_PATH") {
            self.data_path = PathBuf::from(data);
        }
        if let Ok(cache) = std::env::var("FOLIO_CACHE_PATH") {
            self.cache_path = PathBuf::from(cache);
        }
        if let Ok(database) = std::env::var("FOLIO_DATABASE") {
            self.database_path = PathBuf::from(database);
        }
        if let Ok(value) = std::env::var("FOLIO_FIRST_DIR_AS_TAG") {
            if let Some(flag) = parse_bool(&value) {
                self.first_dir_as_tag = flag;
            }
        }
    }
}

fn default_extensions() -> Vec<String> {
    DEFAULT_IMAGE_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

fn normalize_extensions(extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".folio").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's base directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}
