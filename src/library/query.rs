//! Typed catalog and tag query descriptors.
//!
//! A transport builds a [`CatalogQuery`] (or [`TagQuery`]) from user input.
//! The service resolves identity and tag names into ids, producing the
//! backend-agnostic [`EntryQuery`] / [`TagListQuery`] that a [`Store`]
//! translates into its native query. Unknown sort/filter/order names are
//! rejected as `InvalidArgument` while parsing.
//!
//! [`Store`]: crate::store::Store

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{TagId, UserId};
use crate::error::LibraryError;

/// Page size used when a transport does not choose one
pub const DEFAULT_PAGE_SIZE: i64 = 30;

/// Catalog sort key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortField {
    #[default]
    Name,
    CreationTime,
    /// Length of the content-index list
    PageCount,
}

impl FromStr for SortField {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(SortField::Name),
            "creation-time" | "creation_time" | "created" => Ok(SortField::CreationTime),
            "page-count" | "page_count" | "pages" => Ok(SortField::PageCount),
            _ => Err(LibraryError::invalid(format!("unknown sort field: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            _ => Err(LibraryError::invalid(format!("unknown sort order: {}", s))),
        }
    }
}

/// Categorical catalog filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryFilter {
    #[default]
    None,
    /// Entries the identity marked as favorite
    FavoriteEntries,
    /// Entries with at least one tag the identity marked as favorite
    FavoriteTags,
}

impl FromStr for EntryFilter {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(EntryFilter::None),
            "favorite-entries" | "favorite_entries" | "favorites" => {
                Ok(EntryFilter::FavoriteEntries)
            }
            "favorite-tags" | "favorite_tags" => Ok(EntryFilter::FavoriteTags),
            _ => Err(LibraryError::invalid(format!("unknown filter: {}", s))),
        }
    }
}

/// Tag listings only support no filter or favorite tags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagFilter {
    #[default]
    None,
    FavoriteTags,
}

impl FromStr for TagFilter {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(TagFilter::None),
            "favorite-tags" | "favorite_tags" | "favorites" => Ok(TagFilter::FavoriteTags),
            _ => Err(LibraryError::invalid(format!("unsupported tag filter: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagSort {
    #[default]
    Name,
    /// Number of visible member entries
    EntryCount,
}

impl FromStr for TagSort {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(TagSort::Name),
            "entry-count" | "entry_count" | "item-count" | "count" => Ok(TagSort::EntryCount),
            _ => Err(LibraryError::invalid(format!("unsupported tag sort: {}", s))),
        }
    }
}

/// Limit/offset window of one result page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: u64,
    pub offset: u64,
}

impl Pagination {
    /// Window for `page`, or `None` when `page_size <= 0` disables paging
    pub fn new(page: i64, page_size: i64) -> Option<Self> {
        if page_size <= 0 {
            return None;
        }

        Some(Self {
            limit: page_size as u64,
            offset: page.max(0) as u64 * page_size as u64,
        })
    }
}

/// Number of pages needed for `count` rows.
///
/// Without paging everything fits on one page (or none when empty).
pub fn total_pages(count: u64, page_size: i64) -> i64 {
    if page_size <= 0 {
        return if count > 0 { 1 } else { 0 };
    }

    let size = page_size as u64;
    count.div_ceil(size) as i64
}

/// Requested page, or 0 when it falls outside `[0, total)`
pub fn effective_page(page: i64, total: i64) -> i64 {
    if page < 0 || page >= total {
        0
    } else {
        page
    }
}

/// Catalog listing request as received from a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    /// Identity scoping favorites and progress; empty means default
    pub identity: String,

    /// Case-insensitive substring of the entry name
    pub name: Option<String>,

    /// Restrict to members of this tag
    pub tag: Option<String>,

    pub filter: EntryFilter,
    pub sort: SortField,
    pub order: SortOrder,
    pub page: i64,

    /// `<= 0` disables paging
    pub page_size: i64,
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            identity: String::new(),
            name: None,
            tag: None,
            filter: EntryFilter::None,
            sort: SortField::Name,
            order: SortOrder::Ascending,
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl CatalogQuery {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Self::default()
        }
    }

    pub fn name_contains(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into()).filter(|n: &String| !n.is_empty());
        self
    }

    pub fn in_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into()).filter(|t: &String| !t.is_empty());
        self
    }

    pub fn filter(mut self, filter: EntryFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sort(mut self, sort: SortField, order: SortOrder) -> Self {
        self.sort = sort;
        self.order = order;
        self
    }

    pub fn page(mut self, page: i64, page_size: i64) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }
}

/// Catalog query with identity and tag resolved, ready for a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryQuery {
    pub user_id: UserId,
    pub name: Option<String>,
    pub tag_id: Option<TagId>,
    pub filter: EntryFilter,
    pub sort: SortField,
    pub order: SortOrder,
    pub pagination: Option<Pagination>,
}

impl EntryQuery {
    /// Same predicates without a window, for counting
    pub fn unpaged(&self) -> Self {
        Self {
            pagination: None,
            ..self.clone()
        }
    }

    pub fn with_page(&self, page: i64, page_size: i64) -> Self {
        Self {
            pagination: Pagination::new(page, page_size),
            ..self.clone()
        }
    }
}

/// Tag listing request as received from a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagQuery {
    pub identity: String,
    pub name: Option<String>,
    pub filter: TagFilter,
    pub sort: TagSort,
    pub order: SortOrder,
    pub page: i64,
    pub page_size: i64,
}

impl Default for TagQuery {
    fn default() -> Self {
        Self {
            identity: String::new(),
            name: None,
            filter: TagFilter::None,
            sort: TagSort::Name,
            order: SortOrder::Ascending,
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Tag query with identity resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagListQuery {
    pub user_id: UserId,
    pub name: Option<String>,
    pub filter: TagFilter,
    pub sort: TagSort,
    pub order: SortOrder,
    pub pagination: Option<Pagination>,
}

impl TagListQuery {
    pub fn unpaged(&self) -> Self {
        Self {
            pagination: None,
            ..self.clone()
        }
    }

    pub fn with_page(&self, page: i64, page_size: i64) -> Self {
        Self {
            pagination: Pagination::new(page, page_size),
            ..self.clone()
        }
    }
}
