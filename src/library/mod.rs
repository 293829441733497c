//! Reading library: catalog queries, thumbnails and page delivery.
//!
//! # Storage Layout
//!
//! ```text
//! <data>/                        # containers, named relative to here
//! ├── Artist/[Tag] Title.cbz
//! └── Another Title/             # directory container
//!     ├── 001.jpg
//!     └── 002.jpg
//! <cache>/
//! └── thumbnails/
//!     └── <id>-<index>-<x>_<y>_<w>_<h>.jpg   # per cover selection, regenerated lazily
//! ```

pub mod delivery;
pub mod progress;
pub mod query;
pub mod service;
pub mod tags;
pub mod thumbnail;

pub use delivery::{chunk_payload, content_type_for, render_page, stream_chunks};
pub use progress::ProgressTracker;
pub use query::{
    CatalogQuery, EntryFilter, EntryQuery, SortField, SortOrder, TagFilter, TagQuery, TagSort,
};
pub use service::LibraryService;
pub use tags::TagParser;
pub use thumbnail::{default_crop, ThumbnailCache};
