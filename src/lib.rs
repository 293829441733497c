//! folio - archive-backed reading library
//!
//! Catalogs zip archives and plain directories of page images, and serves
//! them to readers: ordered pages, cover thumbnails, tags derived from names,
//! per-user favorites, reading progress and viewing history.
//!
//! # Architecture
//!
//! - `container`: Ordered page access over zip archives and directories
//! - `library`: Catalog queries, thumbnails, tag parsing and page delivery
//! - `store`: Persistence behind the `Store` trait (SQLite implementation)
//! - `maintenance`: Background worker for bulk catalog tasks
//! - `domain`: Data structures (Entry, Tag, Progress, views)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Catalog a container under the data directory
//! folio register "Artist/[Action] Title.cbz"
//!
//! # Browse, newest first
//! folio list --sort created --order desc
//!
//! # Read page 3 at most 1200px tall
//! folio --user alice page 1 2 --height 1200 -o page.jpeg
//! ```

pub mod cli;
pub mod config;
pub mod container;
pub mod domain;
pub mod error;
pub mod library;
pub mod maintenance;
pub mod store;

// Re-export main types at crate root for convenience
pub use config::LibraryConfig;
pub use container::{open_container, Container};
pub use domain::{CatalogEntry, ContainerKind, CropRect, EntryId, Progress, Tag, TagId};
pub use error::{ErrorKind, LibraryError, Result};
pub use library::{CatalogQuery, LibraryService};
pub use maintenance::{MaintenanceHandle, MaintenanceTask, MaintenanceWorker, TaskStatus};
pub use store::{SqliteStore, Store};
