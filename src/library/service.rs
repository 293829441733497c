//! The library service: every operation a transport can invoke.
//!
//! Each call resolves what it needs from the [`Store`], touches the
//! container on the blocking pool, and returns a complete response or an
//! error. No state survives between calls except the shared progress lock.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::delivery::{render_page, stream_chunks, ARCHIVE_CONTENT_TYPE, JPEG_CONTENT_TYPE};
use super::progress::ProgressTracker;
use super::query::{
    effective_page, total_pages, CatalogQuery, EntryQuery, Pagination, TagListQuery, TagQuery,
};
use super::tags::TagParser;
use super::thumbnail::ThumbnailCache;
use crate::config::{LibraryConfig, CHUNK_SIZE};
use crate::container::{open_container, Container};
use crate::domain::{
    normalize_identity, CatalogEntry, Chunk, ContainerKind, CropRect, EntryDetail, EntryId,
    EntryList, EntrySummary, HistoryItem, HistoryList, ImagePayload, Progress, RepairOutcome,
    SystemStats, Tag, TagDetail, TagList, TagListItem, TagSummary, ThumbnailDescriptor, User,
    UserId, UserStats,
};
use crate::error::{LibraryError, Result};
use crate::store::{SqliteStore, Store};

/// Reading-library operations over one catalog
pub struct LibraryService {
    config: Arc<LibraryConfig>,
    store: Arc<dyn Store>,
    thumbnails: ThumbnailCache,
    progress: ProgressTracker,
    tags: TagParser,
}

impl std::fmt::Debug for LibraryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryService")
            .field("data_path", &self.config.data_path)
            .field("thumbnails", &self.thumbnails)
            .finish_non_exhaustive()
    }
}

impl LibraryService {
    pub fn new(config: LibraryConfig, store: Arc<dyn Store>) -> Self {
        Self {
            thumbnails: ThumbnailCache::from_config(&config),
            tags: TagParser::from_config(&config),
            progress: ProgressTracker::new(),
            config: Arc::new(config),
            store,
        }
    }

    /// Service over the SQLite database named in `config`
    pub fn open(config: LibraryConfig) -> Result<Self> {
        let store = SqliteStore::open(&config.database_path)?;
        Ok(Self::new(config, Arc::new(store)))
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    // ---------------------------------------------------------------
    // Resolution helpers
    // ---------------------------------------------------------------

    async fn user(&self, identity: &str) -> Result<User> {
        self.store
            .get_or_create_user(normalize_identity(identity))
            .await
    }

    async fn entry(&self, id: EntryId) -> Result<CatalogEntry> {
        self.store
            .get_entry(id)
            .await?
            .ok_or_else(|| LibraryError::EntryNotFound(id.to_string()))
    }

    async fn tag_by_name(&self, name: &str) -> Result<Tag> {
        self.store
            .get_tag_by_name(name)
            .await?
            .ok_or_else(|| LibraryError::TagNotFound(name.to_string()))
    }

    /// Run `f` against the entry's container on the blocking pool
    async fn with_container<T, F>(&self, entry: &CatalogEntry, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Container) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let container = open_container(entry, &self.config);
        tokio::task::spawn_blocking(move || f(container.as_ref())).await?
    }

    async fn summarize(&self, user_id: UserId, entry: &CatalogEntry) -> Result<EntrySummary> {
        let progress = self.store.get_progress(user_id, entry.id).await?;

        Ok(EntrySummary {
            id: entry.id,
            name: entry.name.clone(),
            is_favorite: self.store.is_favorite_entry(user_id, entry.id).await?,
            is_read: progress.is_some(),
            page_count: entry.page_count(),
            current_page: progress.map(|p| p.page).unwrap_or(0),
            max_progress: progress.map(|p| p.max).unwrap_or(0),
            has_favorite_tag: self.store.has_favorite_tag(user_id, entry.id).await?,
        })
    }

    // ---------------------------------------------------------------
    // Catalog
    // ---------------------------------------------------------------

    /// Filtered, sorted, paginated catalog listing.
    ///
    /// An out-of-range page is served as page 0.
    #[instrument(skip(self, query), fields(identity = %query.identity))]
    pub async fn list(&self, query: &CatalogQuery) -> Result<EntryList> {
        let user = self.user(&query.identity).await?;

        let root = match query.tag.as_deref().filter(|t| !t.is_empty()) {
            Some(name) => Some(self.tag_by_name(name).await?),
            None => None,
        };

        let base = EntryQuery {
            user_id: user.id,
            name: query.name.clone().filter(|n| !n.is_empty()),
            tag_id: root.as_ref().map(|t| t.id),
            filter: query.filter,
            sort: query.sort,
            order: query.order,
            pagination: None,
        };

        let count = self.store.count_entries(&base).await?;
        let total = total_pages(count, query.page_size);
        let page = effective_page(query.page, total);

        let entries = self
            .store
            .query_entries(&base.with_page(page, query.page_size))
            .await?;

        let mut items = Vec::with_capacity(entries.len());
        for entry in &entries {
            items.push(self.summarize(user.id, entry).await?);
        }

        let tag_favorite = match root {
            Some(ref tag) => Some(self.store.is_favorite_tag(user.id, tag.id).await?),
            None => None,
        };

        info!(count, page, total_pages = total, "Browse");

        Ok(EntryList {
            items,
            page,
            total_pages: total,
            tag_favorite,
        })
    }

    /// Full record of one entry; records a view for the identity
    #[instrument(skip(self))]
    pub async fn detail(&self, identity: &str, id: EntryId) -> Result<EntryDetail> {
        let entry = self.entry(id).await?;
        let user = self.user(identity).await?;

        let mut tags = Vec::new();
        for tag in self.store.entry_tags(entry.id).await? {
            tags.push(TagSummary {
                is_favorite: self.store.is_favorite_tag(user.id, tag.id).await?,
                id: tag.id,
                name: tag.name,
                is_hidden: tag.hidden,
            });
        }

        let progress = self.store.get_progress(user.id, entry.id).await?;
        let favorite = self.store.is_favorite_entry(user.id, entry.id).await?;

        self.store.record_view(user.id, entry.id, Utc::now()).await?;
        info!(name = %entry.name, "View entry");

        Ok(EntryDetail {
            id: entry.id,
            page_count: entry.page_count(),
            name: entry.name,
            favorite,
            tags,
            current_page: progress.map(|p| p.page).unwrap_or(0),
            max_progress: progress.map(|p| p.max).unwrap_or(0),
        })
    }

    #[instrument(skip(self))]
    pub async fn set_favorite(&self, identity: &str, id: EntryId, favorite: bool) -> Result<bool> {
        let user = self.user(identity).await?;
        let entry = self.entry(id).await?;

        self.store
            .set_favorite_entry(user.id, entry.id, favorite)
            .await?;
        info!(name = %entry.name, favorite, "Set favorite");

        Ok(favorite)
    }

    /// Client-reported reading position
    #[instrument(skip(self))]
    pub async fn set_progress(&self, identity: &str, id: EntryId, page: usize) -> Result<Progress> {
        let entry = self.entry(id).await?;
        let user = self.user(identity).await?;

        self.progress
            .record(self.store.as_ref(), user.id, entry.id, page)
            .await
    }

    // ---------------------------------------------------------------
    // Thumbnails
    // ---------------------------------------------------------------

    /// Cover thumbnail of an entry, generated on first use
    #[instrument(skip(self))]
    pub async fn thumbnail(&self, id: EntryId) -> Result<ImagePayload> {
        let entry = self.entry(id).await?;
        self.entry_thumbnail(entry).await
    }

    async fn entry_thumbnail(&self, entry: CatalogEntry) -> Result<ImagePayload> {
        let id = entry.id;
        let thumbnails = self.thumbnails.clone();
        let target = entry.clone();
        let data = self
            .with_container(&entry, move |container| {
                thumbnails.get_or_create(&target, container)
            })
            .await?;

        Ok(ImagePayload {
            filename: format!("{}.jpg", id),
            content_type: JPEG_CONTENT_TYPE.to_string(),
            data,
        })
    }

    /// Choose the cover page and crop; the cached thumbnail is discarded
    #[instrument(skip(self))]
    pub async fn update_cover(&self, id: EntryId, index: usize, crop: CropRect) -> Result<CatalogEntry> {
        let mut entry = self.entry(id).await?;

        if index >= entry.page_count() {
            return Err(LibraryError::PageNotFound {
                entry: entry.name,
                index,
            });
        }

        entry.thumbnail = ThumbnailDescriptor { index, crop };
        self.store.upsert_entry(&entry).await?;
        self.thumbnails.delete(entry.id);

        info!(name = %entry.name, index, "Cover updated");
        Ok(entry)
    }

    // ---------------------------------------------------------------
    // Delivery
    // ---------------------------------------------------------------

    /// One page, raw or fitted to `width x height` and re-encoded.
    ///
    /// On success the identity's progress moves to `index`.
    #[instrument(skip(self))]
    pub async fn page_image(
        &self,
        identity: &str,
        id: EntryId,
        index: usize,
        width: u32,
        height: u32,
    ) -> Result<ImagePayload> {
        let entry = self.entry(id).await?;
        let user = self.user(identity).await?;
        let quality = self.config.thumbnail.quality;

        let payload = self
            .with_container(&entry, move |container| {
                let item = container.open_entry(index)?;
                render_page(item.data, &item.name, width, height, quality)
            })
            .await?;

        self.progress
            .record(self.store.as_ref(), user.id, entry.id, index)
            .await?;

        debug!(filename = %payload.filename, bytes = payload.data.len(), "Page rendered");
        Ok(payload)
    }

    /// [`page_image`](Self::page_image) sent as 1 MiB frames
    #[instrument(skip(self, tx))]
    pub async fn page_image_stream(
        &self,
        identity: &str,
        id: EntryId,
        index: usize,
        width: u32,
        height: u32,
        tx: &mpsc::Sender<Chunk>,
    ) -> Result<usize> {
        let payload = self.page_image(identity, id, index, width, height).await?;
        stream_chunks(&payload, CHUNK_SIZE, tx).await
    }

    /// Whole container as a zip; progress is not touched
    #[instrument(skip(self))]
    pub async fn download(&self, id: EntryId) -> Result<ImagePayload> {
        let entry = self.entry(id).await?;
        let download = self
            .with_container(&entry, |container| container.download())
            .await?;

        info!(filename = %download.filename, bytes = download.data.len(), "Download");

        Ok(ImagePayload {
            filename: download.filename,
            content_type: ARCHIVE_CONTENT_TYPE.to_string(),
            data: download.data,
        })
    }

    /// [`download`](Self::download) sent as 1 MiB frames
    #[instrument(skip(self, tx))]
    pub async fn download_stream(&self, id: EntryId, tx: &mpsc::Sender<Chunk>) -> Result<usize> {
        let payload = self.download(id).await?;
        stream_chunks(&payload, CHUNK_SIZE, tx).await
    }

    // ---------------------------------------------------------------
    // Repair and registration
    // ---------------------------------------------------------------

    /// Re-derive tags from the name and store them; returns the tag names
    pub async fn refresh_tags(&self, entry: &CatalogEntry) -> Result<Vec<String>> {
        let names = self.tags.parse(&entry.name);

        let mut ids = Vec::with_capacity(names.len());
        for name in &names {
            ids.push(self.store.upsert_tag(name).await?.id);
        }
        self.store.set_entry_tags(entry.id, &ids).await?;

        Ok(names)
    }

    /// Recompute tags, content indices and thumbnail of one entry.
    ///
    /// Repeating a repair on an unchanged container is a no-op.
    #[instrument(skip(self))]
    pub async fn repair(&self, id: EntryId) -> Result<RepairOutcome> {
        let entry = self.entry(id).await?;
        let outcome = self.rebuild(entry).await?;

        info!(name = %outcome.name, pages = outcome.page_count, "Repaired");
        Ok(outcome)
    }

    /// Catalog one container under the data directory.
    ///
    /// `name` is relative to the data directory. An existing row with the
    /// same name is reactivated and rebuilt. Nothing is written unless the
    /// container can be read.
    #[instrument(skip(self))]
    pub async fn register(&self, name: &str) -> Result<RepairOutcome> {
        let name = name.trim_matches('/');
        let path = self.config.container_path(name);

        if !path.exists() {
            return Err(LibraryError::ContainerNotFound(path));
        }
        let kind = ContainerKind::detect(&path)
            .ok_or_else(|| LibraryError::invalid(format!("not a supported container: {}", name)))?;

        let mut entry = match self.store.get_entry_by_name(name).await? {
            Some(existing) => existing,
            None => CatalogEntry::new(name, kind),
        };
        entry.active = true;
        entry.container_kind = kind;

        let outcome = self.rebuild(entry).await?;
        info!(name = %outcome.name, kind = %kind, pages = outcome.page_count, "Registered");
        Ok(outcome)
    }

    /// Derive tags and content indices, then persist both in one write.
    /// The cached thumbnail is dropped only after the new row is stored.
    async fn rebuild(&self, mut entry: CatalogEntry) -> Result<RepairOutcome> {
        let tags = self.tags.parse(&entry.name);

        entry.file_indices = self
            .with_container(&entry, |container| container.content_indices())
            .await?;

        if entry.thumbnail.index >= entry.page_count() {
            entry.thumbnail = ThumbnailDescriptor::default();
        }

        entry.id = self.store.save_entry(&entry, &tags).await?;
        self.thumbnails.delete(entry.id);

        Ok(RepairOutcome {
            id: entry.id,
            page_count: entry.page_count(),
            name: entry.name,
            tags,
        })
    }

    // ---------------------------------------------------------------
    // Tags
    // ---------------------------------------------------------------

    #[instrument(skip(self, query), fields(identity = %query.identity))]
    pub async fn tag_list(&self, query: &TagQuery) -> Result<TagList> {
        let user = self.user(&query.identity).await?;

        let base = TagListQuery {
            user_id: user.id,
            name: query.name.clone().filter(|n| !n.is_empty()),
            filter: query.filter,
            sort: query.sort,
            order: query.order,
            pagination: None,
        };

        let count = self.store.count_tags(&base).await?;
        let total = total_pages(count, query.page_size);
        let page = effective_page(query.page, total);

        let rows = self
            .store
            .query_tags(&base.with_page(page, query.page_size))
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for (tag, entry_count) in rows {
            items.push(TagListItem {
                is_favorite: self.store.is_favorite_tag(user.id, tag.id).await?,
                id: tag.id,
                name: tag.name,
                entry_count,
            });
        }

        Ok(TagList {
            items,
            page,
            total_pages: total,
        })
    }

    #[instrument(skip(self))]
    pub async fn tag_detail(&self, identity: &str, name: &str) -> Result<TagDetail> {
        let tag = self.tag_by_name(name).await?;
        let user = self.user(identity).await?;

        Ok(TagDetail {
            is_favorite: self.store.is_favorite_tag(user.id, tag.id).await?,
            entry_count: self.store.tag_entry_count(tag.id).await?,
            id: tag.id,
            name: tag.name,
            is_hidden: tag.hidden,
        })
    }

    /// Thumbnail of the tag's first visible member
    #[instrument(skip(self))]
    pub async fn tag_thumbnail(&self, name: &str) -> Result<ImagePayload> {
        let tag = self.tag_by_name(name).await?;
        let entry = self
            .store
            .first_entry_of_tag(tag.id)
            .await?
            .ok_or_else(|| LibraryError::EntryNotFound(format!("any entry tagged {}", name)))?;

        self.entry_thumbnail(entry).await
    }

    #[instrument(skip(self))]
    pub async fn tag_set_favorite(&self, identity: &str, name: &str, favorite: bool) -> Result<bool> {
        let tag = self.tag_by_name(name).await?;
        let user = self.user(identity).await?;

        self.store.set_favorite_tag(user.id, tag.id, favorite).await?;
        info!(tag = %tag.name, favorite, "Set tag favorite");

        Ok(favorite)
    }

    // ---------------------------------------------------------------
    // History and statistics
    // ---------------------------------------------------------------

    /// Viewing history, newest first
    #[instrument(skip(self))]
    pub async fn history(&self, identity: &str, page: i64, page_size: i64) -> Result<HistoryList> {
        let user = self.user(identity).await?;

        let count = self.store.count_history(user.id).await?;
        let total = total_pages(count, page_size);
        let page = effective_page(page, total);

        let records = self
            .store
            .history(user.id, Pagination::new(page, page_size))
            .await?;

        let mut items = Vec::with_capacity(records.len());
        for record in records {
            let Some(entry) = self.store.get_entry(record.entry_id).await? else {
                warn!(entry_id = record.entry_id, "History refers to a missing entry");
                continue;
            };

            items.push(HistoryItem {
                entry_id: entry.id,
                is_favorite: self.store.is_favorite_entry(user.id, entry.id).await?,
                has_favorite_tag: self.store.has_favorite_tag(user.id, entry.id).await?,
                page_count: entry.page_count(),
                name: entry.name,
                viewed_at: record.viewed_at,
            });
        }

        Ok(HistoryList {
            items,
            page,
            total_pages: total,
        })
    }

    pub async fn user_info(&self, identity: &str) -> Result<UserStats> {
        let user = self.user(identity).await?;
        let counts = self.store.user_counts(user.id).await?;

        Ok(UserStats {
            user_id: user.id,
            read_entry_count: counts.read_entries,
            favorite_entry_count: counts.favorite_entries,
            favorite_tag_count: counts.favorite_tags,
        })
    }

    pub async fn system_info(&self) -> Result<SystemStats> {
        Ok(SystemStats {
            version: env!("CARGO_PKG_VERSION").to_string(),
            entry_count: self.store.count_visible_entries().await?,
            tag_count: self.store.count_visible_tags().await?,
        })
    }

    // ---------------------------------------------------------------
    // Maintenance steps
    // ---------------------------------------------------------------

    pub async fn active_entries(&self) -> Result<Vec<CatalogEntry>> {
        self.store.list_active_entries().await
    }

    /// Drop one entry's cached thumbnail
    pub fn discard_thumbnail(&self, id: EntryId) {
        self.thumbnails.delete(id);
    }

    /// Remove every cached thumbnail
    pub async fn purge_cache(&self) -> Result<usize> {
        let thumbnails = self.thumbnails.clone();
        let removed = tokio::task::spawn_blocking(move || thumbnails.purge()).await??;

        info!(removed, "Cache purged");
        Ok(removed)
    }
}
