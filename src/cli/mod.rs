//! Command-line interface for folio.
//!
//! Provides commands for browsing the catalog, reading pages, managing
//! favorites, tags and covers, and running maintenance tasks.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::config::LibraryConfig;
use crate::domain::{Chunk, CropRect, EntryId, ImagePayload};
use crate::library::{
    CatalogQuery, EntryFilter, LibraryService, SortField, SortOrder, TagFilter, TagQuery, TagSort,
};

pub mod maintenance;
pub mod tag;

/// folio - archive-backed reading library
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (searched as .folio/config.yaml when omitted)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Identity that owns favorites, progress and history
    #[arg(short, long, global = true, env = "FOLIO_USER", default_value = "")]
    pub user: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List catalog entries
    List {
        /// Case-insensitive substring of the entry name
        #[arg(short, long)]
        search: Option<String>,

        /// Only entries carrying this tag
        #[arg(short, long)]
        tag: Option<String>,

        #[arg(short, long, value_enum, default_value = "none")]
        filter: FilterArg,

        #[arg(long, value_enum, default_value = "name")]
        sort: SortArg,

        #[arg(long, value_enum, default_value = "asc")]
        order: OrderArg,

        #[arg(short, long, default_value = "0")]
        page: i64,

        /// Items per page (0 disables paging)
        #[arg(long, default_value = "30")]
        per_page: i64,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one entry (records a view)
    Show {
        id: EntryId,

        #[arg(long)]
        json: bool,
    },

    /// Write one page image to a file
    Page {
        id: EntryId,

        /// Zero-based page index
        index: usize,

        /// Maximum width (0 = unbounded)
        #[arg(long, default_value = "0")]
        width: u32,

        /// Maximum height (0 = unbounded)
        #[arg(long, default_value = "0")]
        height: u32,

        /// Output file (defaults to the page's own name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write an entry's cover thumbnail to a file
    Thumbnail {
        id: EntryId,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download a whole entry as a zip
    Download {
        id: EntryId,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Recompute tags, pages and thumbnail of an entry
    Repair { id: EntryId },

    /// Catalog a container (path relative to the data directory)
    Register { name: String },

    /// Mark an entry as favorite
    Favorite {
        id: EntryId,

        /// Remove the mark instead
        #[arg(long)]
        off: bool,
    },

    /// Set the reading position of an entry
    Progress { id: EntryId, page: usize },

    /// Choose the cover page and crop of an entry
    Cover {
        id: EntryId,
        index: usize,

        #[arg(long, default_value = "0")]
        x: i32,

        #[arg(long, default_value = "0")]
        y: i32,

        /// Crop width (0 with height 0 = automatic crop)
        #[arg(long, default_value = "0")]
        width: i32,

        #[arg(long, default_value = "0")]
        height: i32,
    },

    /// List tags
    Tags {
        #[arg(short, long)]
        search: Option<String>,

        /// Only favorite tags
        #[arg(long)]
        favorites: bool,

        #[arg(long, value_enum, default_value = "name")]
        sort: TagSortArg,

        #[arg(long, value_enum, default_value = "asc")]
        order: OrderArg,

        #[arg(short, long, default_value = "0")]
        page: i64,

        #[arg(long, default_value = "30")]
        per_page: i64,
    },

    /// Inspect or mark a single tag
    Tag {
        #[command(subcommand)]
        command: tag::TagCommands,
    },

    /// Show viewing history
    History {
        #[arg(short, long, default_value = "0")]
        page: i64,

        #[arg(long, default_value = "30")]
        per_page: i64,
    },

    /// Show library and user statistics
    Info,

    /// Show resolved configuration (debug)
    Config,

    /// Run a maintenance task in the background and wait for it
    Maintenance {
        #[command(subcommand)]
        command: maintenance::MaintenanceCommands,
    },
}

/// Categorical filter for the CLI (maps to EntryFilter)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FilterArg {
    None,
    Favorites,
    FavoriteTags,
}

impl From<FilterArg> for EntryFilter {
    fn from(f: FilterArg) -> Self {
        match f {
            FilterArg::None => EntryFilter::None,
            FilterArg::Favorites => EntryFilter::FavoriteEntries,
            FilterArg::FavoriteTags => EntryFilter::FavoriteTags,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortArg {
    Name,
    Created,
    Pages,
}

impl From<SortArg> for SortField {
    fn from(s: SortArg) -> Self {
        match s {
            SortArg::Name => SortField::Name,
            SortArg::Created => SortField::CreationTime,
            SortArg::Pages => SortField::PageCount,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OrderArg {
    Asc,
    Desc,
}

impl From<OrderArg> for SortOrder {
    fn from(o: OrderArg) -> Self {
        match o {
            OrderArg::Asc => SortOrder::Ascending,
            OrderArg::Desc => SortOrder::Descending,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TagSortArg {
    Name,
    Count,
}

impl From<TagSortArg> for TagSort {
    fn from(s: TagSortArg) -> Self {
        match s {
            TagSortArg::Name => TagSort::Name,
            TagSortArg::Count => TagSort::EntryCount,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = match self.config {
            Some(ref path) => LibraryConfig::load_from(path)?,
            None => LibraryConfig::load()?,
        };

        if let Commands::Config = self.command {
            return show_config(&config);
        }

        let service = LibraryService::open(config).context("Failed to open library")?;
        let user = self.user.as_str();

        match self.command {
            Commands::List {
                search,
                tag,
                filter,
                sort,
                order,
                page,
                per_page,
                json,
            } => {
                let mut query = CatalogQuery::new(user)
                    .filter(filter.into())
                    .sort(sort.into(), order.into())
                    .page(page, per_page);
                if let Some(search) = search {
                    query = query.name_contains(search);
                }
                if let Some(tag) = tag {
                    query = query.in_tag(tag);
                }
                list_entries(&service, &query, json).await
            }
            Commands::Show { id, json } => show_entry(&service, user, id, json).await,
            Commands::Page {
                id,
                index,
                width,
                height,
                output,
            } => write_page(&service, user, id, index, width, height, output).await,
            Commands::Thumbnail { id, output } => {
                let payload = service.thumbnail(id).await?;
                write_payload(&payload, output).await
            }
            Commands::Download { id, output } => download_entry(&service, id, output).await,
            Commands::Repair { id } => {
                let outcome = service.repair(id).await?;
                println!(
                    "Repaired {} ({} pages, tags: {})",
                    outcome.name,
                    outcome.page_count,
                    outcome.tags.join(", ")
                );
                Ok(())
            }
            Commands::Register { name } => {
                let outcome = service.register(&name).await?;
                println!(
                    "Registered #{} {} ({} pages, tags: {})",
                    outcome.id,
                    outcome.name,
                    outcome.page_count,
                    outcome.tags.join(", ")
                );
                Ok(())
            }
            Commands::Favorite { id, off } => {
                let favorite = service.set_favorite(user, id, !off).await?;
                println!("Entry {} favorite: {}", id, favorite);
                Ok(())
            }
            Commands::Progress { id, page } => {
                let progress = service.set_progress(user, id, page).await?;
                println!(
                    "Entry {} at page {} (furthest {})",
                    id, progress.page, progress.max
                );
                Ok(())
            }
            Commands::Cover {
                id,
                index,
                x,
                y,
                width,
                height,
            } => {
                let entry = service
                    .update_cover(id, index, CropRect::new(x, y, width, height))
                    .await?;
                println!("Cover of {} set to page {}", entry.name, index);
                Ok(())
            }
            Commands::Tags {
                search,
                favorites,
                sort,
                order,
                page,
                per_page,
            } => {
                let query = TagQuery {
                    identity: user.to_string(),
                    name: search,
                    filter: if favorites {
                        TagFilter::FavoriteTags
                    } else {
                        TagFilter::None
                    },
                    sort: sort.into(),
                    order: order.into(),
                    page,
                    page_size: per_page,
                };
                tag::list_tags(&service, &query).await
            }
            Commands::Tag { command } => tag::execute(&service, user, command).await,
            Commands::History { page, per_page } => {
                show_history(&service, user, page, per_page).await
            }
            Commands::Info => show_info(&service, user).await,
            Commands::Config => Ok(()),
            Commands::Maintenance { command } => {
                maintenance::execute(service, command).await
            }
        }
    }
}

/// List catalog entries
async fn list_entries(service: &LibraryService, query: &CatalogQuery, json: bool) -> Result<()> {
    let list = service.list(query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    if list.items.is_empty() {
        println!("No entries found");
        return Ok(());
    }

    println!("{:<6} {:<4} {:<10} {}", "ID", "FAV", "PAGES", "NAME");
    println!("{}", "-".repeat(75));

    for item in &list.items {
        let progress = if item.is_read {
            format!("{}/{}", item.current_page + 1, item.page_count)
        } else {
            item.page_count.to_string()
        };
        let marker = match (item.is_favorite, item.has_favorite_tag) {
            (true, _) => "*",
            (false, true) => "+",
            _ => "",
        };
        println!("{:<6} {:<4} {:<10} {}", item.id, marker, progress, item.name);
    }

    println!();
    println!("Page {} of {}", list.page + 1, list.total_pages.max(1));
    if let Some(favorite) = list.tag_favorite {
        println!("Tag favorite: {}", favorite);
    }

    Ok(())
}

/// Show details of one entry
async fn show_entry(service: &LibraryService, user: &str, id: EntryId, json: bool) -> Result<()> {
    let detail = service.detail(user, id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    println!("ID:       {}", detail.id);
    println!("Name:     {}", detail.name);
    println!("Favorite: {}", detail.favorite);
    println!("Pages:    {}", detail.page_count);
    println!(
        "Progress: page {} (furthest {})",
        detail.current_page, detail.max_progress
    );

    if !detail.tags.is_empty() {
        println!("\nTags:");
        for tag in &detail.tags {
            let mut flags = Vec::new();
            if tag.is_favorite {
                flags.push("favorite");
            }
            if tag.is_hidden {
                flags.push("hidden");
            }
            if flags.is_empty() {
                println!("  {}", tag.name);
            } else {
                println!("  {} ({})", tag.name, flags.join(", "));
            }
        }
    }

    Ok(())
}

/// Stream a page into a file
async fn write_page(
    service: &LibraryService,
    user: &str,
    id: EntryId,
    index: usize,
    width: u32,
    height: u32,
    output: Option<PathBuf>,
) -> Result<()> {
    let (tx, rx) = mpsc::channel::<Chunk>(4);
    let writer = tokio::spawn(receive_chunks(rx, output));

    let sent = service
        .page_image_stream(user, id, index, width, height, &tx)
        .await;
    drop(tx);

    let written = writer.await.context("Writer task failed")??;
    let chunks = sent?;

    match written {
        Some((path, bytes)) => eprintln!(
            "Wrote {} ({} bytes, {} chunks)",
            path.display(),
            bytes,
            chunks
        ),
        None => eprintln!("Page is empty, nothing written"),
    }

    Ok(())
}

/// Stream a whole entry into a file
async fn download_entry(service: &LibraryService, id: EntryId, output: Option<PathBuf>) -> Result<()> {
    let (tx, rx) = mpsc::channel::<Chunk>(4);
    let writer = tokio::spawn(receive_chunks(rx, output));

    let sent = service.download_stream(id, &tx).await;
    drop(tx);

    let written = writer.await.context("Writer task failed")??;
    let chunks = sent?;

    if let Some((path, bytes)) = written {
        eprintln!("Wrote {} ({} bytes, {} chunks)", path.display(), bytes, chunks);
    }

    Ok(())
}

/// Write received frames to `output`, or to the frame's filename
async fn receive_chunks(
    mut rx: mpsc::Receiver<Chunk>,
    output: Option<PathBuf>,
) -> Result<Option<(PathBuf, usize)>> {
    let mut target: Option<(PathBuf, tokio::fs::File)> = None;
    let mut written = 0;

    while let Some(chunk) = rx.recv().await {
        if target.is_none() {
            let path = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(file_name_only(&chunk.filename)));
            let file = tokio::fs::File::create(&path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
            target = Some((path, file));
        }

        if let Some((_, file)) = target.as_mut() {
            file.write_all(&chunk.data).await?;
            written += chunk.size;
        }
    }

    match target {
        Some((path, mut file)) => {
            file.flush().await?;
            Ok(Some((path, written)))
        }
        None => Ok(None),
    }
}

/// Write a complete payload to `output`, or to its own filename
async fn write_payload(payload: &ImagePayload, output: Option<PathBuf>) -> Result<()> {
    let path = output.unwrap_or_else(|| PathBuf::from(file_name_only(&payload.filename)));
    tokio::fs::write(&path, &payload.data)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    eprintln!("Wrote {} ({} bytes)", path.display(), payload.data.len());
    Ok(())
}

fn file_name_only(name: &str) -> &str {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output.bin")
}

/// Show viewing history
async fn show_history(service: &LibraryService, user: &str, page: i64, per_page: i64) -> Result<()> {
    let history = service.history(user, page, per_page).await?;

    if history.items.is_empty() {
        println!("No history");
        return Ok(());
    }

    println!("{:<20} {:<6} {}", "VIEWED", "ID", "NAME");
    println!("{}", "-".repeat(75));
    for item in &history.items {
        println!(
            "{:<20} {:<6} {}",
            item.viewed_at.format("%Y-%m-%d %H:%M:%S"),
            item.entry_id,
            item.name
        );
    }

    println!();
    println!("Page {} of {}", history.page + 1, history.total_pages.max(1));
    Ok(())
}

/// Show library and user statistics
async fn show_info(service: &LibraryService, user: &str) -> Result<()> {
    let system = service.system_info().await?;
    let stats = service.user_info(user).await?;

    println!("folio {}", system.version);
    println!();
    println!("Library:");
    println!("  Entries: {}", system.entry_count);
    println!("  Tags:    {}", system.tag_count);
    println!();
    println!("User #{}:", stats.user_id);
    println!("  Read:           {}", stats.read_entry_count);
    println!("  Favorite items: {}", stats.favorite_entry_count);
    println!("  Favorite tags:  {}", stats.favorite_tag_count);

    Ok(())
}

/// Show resolved configuration
fn show_config(config: &LibraryConfig) -> Result<()> {
    match &config.config_file {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none - using defaults)"),
    }
    println!();
    println!("Paths:");
    println!("  Data:       {}", config.data_path.display());
    println!("  Cache:      {}", config.cache_path.display());
    println!("  Thumbnails: {}", config.thumbnail_dir().display());
    println!("  Database:   {}", config.database_path.display());
    println!();
    println!("Library:");
    println!("  Image extensions: {}", config.image_extensions.join(", "));
    println!("  First dir as tag: {}", config.first_dir_as_tag);
    println!();
    println!("Thumbnails:");
    println!("  Height:  {}px", config.thumbnail.height);
    println!("  Quality: {}", config.thumbnail.quality);

    Ok(())
}
