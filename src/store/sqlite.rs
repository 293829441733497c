//! SQLite-backed [`Store`].
//!
//! One connection guarded by a mutex; every statement runs on the blocking
//! pool. The content-index list is stored as a JSON array, and page-count
//! ordering uses `json_array_length(file_indices)` rather than a
//! denormalized column, so the list stays the only source of page count.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::debug;

use super::schema::SCHEMA;
use super::{Store, UserCounts};
use crate::domain::{
    CatalogEntry, ContainerKind, CropRect, EntryId, HistoryRecord, Progress, Tag, TagId,
    ThumbnailDescriptor, User, UserId,
};
use crate::error::Result;
use crate::library::query::{
    EntryFilter, EntryQuery, Pagination, SortField, TagFilter, TagListQuery, TagSort,
};

const ENTRY_COLUMNS: &str = "e.id, e.name, e.create_time, e.active, e.hidden, e.container_kind, \
     e.file_indices, e.thumbnail_index, e.thumbnail_x, e.thumbnail_y, e.thumbnail_width, \
     e.thumbnail_height";

const VISIBLE: &str = "e.active = 1 AND e.hidden = 0";

/// Catalog storage in a single SQLite database
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "Opened catalog database");
        Self::init(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f(&mut guard)
        })
        .await?
    }
}

fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogEntry> {
    let create_ms: i64 = row.get(2)?;
    let kind: String = row.get(5)?;
    let indices: String = row.get(6)?;
    let thumbnail_index: i64 = row.get(7)?;

    let container_kind = kind
        .parse::<ContainerKind>()
        .map_err(|e| conversion_error(5, e))?;
    let file_indices: Vec<usize> =
        serde_json::from_str(&indices).map_err(|e| conversion_error(6, e))?;

    Ok(CatalogEntry {
        id: row.get(0)?,
        name: row.get(1)?,
        create_time: DateTime::from_timestamp_millis(create_ms).unwrap_or_default(),
        active: row.get(3)?,
        hidden: row.get(4)?,
        container_kind,
        file_indices,
        thumbnail: ThumbnailDescriptor {
            index: thumbnail_index.max(0) as usize,
            crop: CropRect::new(row.get(8)?, row.get(9)?, row.get(10)?, row.get(11)?),
        },
    })
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        hidden: row.get(2)?,
    })
}

fn upsert_entry_row(conn: &Connection, entry: &CatalogEntry, indices: &str) -> rusqlite::Result<EntryId> {
    let crop = entry.thumbnail.crop;
    conn.query_row(
        "INSERT INTO entries (name, create_time, active, hidden, container_kind, \
             file_indices, thumbnail_index, thumbnail_x, thumbnail_y, \
             thumbnail_width, thumbnail_height) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
         ON CONFLICT(name) DO UPDATE SET \
             active = excluded.active, \
             hidden = excluded.hidden, \
             container_kind = excluded.container_kind, \
             file_indices = excluded.file_indices, \
             thumbnail_index = excluded.thumbnail_index, \
             thumbnail_x = excluded.thumbnail_x, \
             thumbnail_y = excluded.thumbnail_y, \
             thumbnail_width = excluded.thumbnail_width, \
             thumbnail_height = excluded.thumbnail_height \
         RETURNING id",
        params![
            entry.name,
            entry.create_time.timestamp_millis(),
            entry.active,
            entry.hidden,
            entry.container_kind.as_str(),
            indices,
            entry.thumbnail.index as i64,
            crop.x,
            crop.y,
            crop.width,
            crop.height,
        ],
        |r| r.get(0),
    )
}

fn upsert_tag_row(conn: &Connection, name: &str) -> rusqlite::Result<Tag> {
    conn.execute(
        "INSERT INTO tags (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        params![name],
    )?;
    conn.query_row(
        "SELECT id, name, hidden FROM tags WHERE name = ?1",
        params![name],
        tag_from_row,
    )
}

/// Caller owns the transaction
fn replace_entry_tags(conn: &Connection, entry_id: EntryId, tag_ids: &[TagId]) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM entry_tags WHERE entry_id = ?1", params![entry_id])?;
    let mut stmt =
        conn.prepare("INSERT OR IGNORE INTO entry_tags (entry_id, tag_id) VALUES (?1, ?2)")?;
    for tag_id in tag_ids {
        stmt.execute(params![entry_id, tag_id])?;
    }
    Ok(())
}

fn push_pagination(sql: &mut String, values: &mut Vec<Value>, pagination: Option<Pagination>) {
    if let Some(window) = pagination {
        sql.push_str(" LIMIT ? OFFSET ?");
        values.push(Value::Integer(window.limit as i64));
        values.push(Value::Integer(window.offset as i64));
    }
}

/// Translate an entry query into SQL and positional parameters
fn entry_query_sql(query: &EntryQuery, count: bool) -> (String, Vec<Value>) {
    let mut values = Vec::new();
    let mut clauses = vec![VISIBLE.to_string()];

    if let Some(tag_id) = query.tag_id {
        clauses.push(
            "EXISTS (SELECT 1 FROM entry_tags et WHERE et.entry_id = e.id AND et.tag_id = ?)"
                .to_string(),
        );
        values.push(Value::Integer(tag_id));
    }

    if let Some(ref name) = query.name {
        clauses.push("instr(lower(e.name), lower(?)) > 0".to_string());
        values.push(Value::Text(name.clone()));
    }

    match query.filter {
        EntryFilter::None => {}
        EntryFilter::FavoriteEntries => {
            clauses.push(
                "EXISTS (SELECT 1 FROM favorite_entries f \
                 WHERE f.entry_id = e.id AND f.user_id = ?)"
                    .to_string(),
            );
            values.push(Value::Integer(query.user_id));
        }
        EntryFilter::FavoriteTags => {
            clauses.push(
                "EXISTS (SELECT 1 FROM entry_tags et \
                 JOIN favorite_tags ft ON ft.tag_id = et.tag_id \
                 WHERE et.entry_id = e.id AND ft.user_id = ?)"
                    .to_string(),
            );
            values.push(Value::Integer(query.user_id));
        }
    }

    let select = if count {
        "SELECT COUNT(*)".to_string()
    } else {
        format!("SELECT {}", ENTRY_COLUMNS)
    };
    let mut sql = format!("{} FROM entries e WHERE {}", select, clauses.join(" AND "));

    if !count {
        let key = match query.sort {
            SortField::Name => "e.name",
            SortField::CreationTime => "e.create_time",
            SortField::PageCount => "json_array_length(e.file_indices)",
        };
        let direction = query.order.as_sql();
        sql.push_str(&format!(" ORDER BY {} {}, e.id {}", key, direction, direction));
        push_pagination(&mut sql, &mut values, query.pagination);
    }

    (sql, values)
}

/// Translate a tag query into SQL and positional parameters
fn tag_query_sql(query: &TagListQuery, count: bool) -> (String, Vec<Value>) {
    let mut values = Vec::new();
    let mut clauses = vec!["t.hidden = 0".to_string()];

    if let Some(ref name) = query.name {
        clauses.push("instr(lower(t.name), lower(?)) > 0".to_string());
        values.push(Value::Text(name.clone()));
    }

    if query.filter == TagFilter::FavoriteTags {
        clauses.push(
            "EXISTS (SELECT 1 FROM favorite_tags ft WHERE ft.tag_id = t.id AND ft.user_id = ?)"
                .to_string(),
        );
        values.push(Value::Integer(query.user_id));
    }

    let where_clause = clauses.join(" AND ");
    if count {
        return (format!("SELECT COUNT(*) FROM tags t WHERE {}", where_clause), values);
    }

    let mut sql = format!(
        "SELECT t.id, t.name, t.hidden, \
         (SELECT COUNT(*) FROM entry_tags et JOIN entries e ON e.id = et.entry_id \
          WHERE et.tag_id = t.id AND {}) AS entry_count \
         FROM tags t WHERE {}",
        VISIBLE, where_clause
    );

    let key = match query.sort {
        TagSort::Name => "t.name",
        TagSort::EntryCount => "entry_count",
    };
    let direction = query.order.as_sql();
    sql.push_str(&format!(" ORDER BY {} {}, t.id {}", key, direction, direction));
    push_pagination(&mut sql, &mut values, query.pagination);

    (sql, values)
}

fn count_query(conn: &Connection, sql: &str, values: &[Value]) -> Result<u64> {
    let count: i64 = conn.query_row(sql, params_from_iter(values.iter()), |r| r.get(0))?;
    Ok(count.max(0) as u64)
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_entry(&self, id: EntryId) -> Result<Option<CatalogEntry>> {
        self.with_conn(move |conn| {
            let sql = format!("SELECT {} FROM entries e WHERE e.id = ?1", ENTRY_COLUMNS);
            Ok(conn.query_row(&sql, params![id], entry_from_row).optional()?)
        })
        .await
    }

    async fn get_entry_by_name(&self, name: &str) -> Result<Option<CatalogEntry>> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {} FROM entries e WHERE e.name = ?1", ENTRY_COLUMNS);
            Ok(conn.query_row(&sql, params![name], entry_from_row).optional()?)
        })
        .await
    }

    async fn upsert_entry(&self, entry: &CatalogEntry) -> Result<EntryId> {
        let entry = entry.clone();
        let indices = serde_json::to_string(&entry.file_indices)?;

        self.with_conn(move |conn| Ok(upsert_entry_row(conn, &entry, &indices)?))
            .await
    }

    async fn save_entry(&self, entry: &CatalogEntry, tags: &[String]) -> Result<EntryId> {
        let entry = entry.clone();
        let tags = tags.to_vec();
        let indices = serde_json::to_string(&entry.file_indices)?;

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let id = upsert_entry_row(&tx, &entry, &indices)?;

            let mut tag_ids = Vec::with_capacity(tags.len());
            for name in &tags {
                tag_ids.push(upsert_tag_row(&tx, name)?.id);
            }
            replace_entry_tags(&tx, id, &tag_ids)?;

            tx.commit()?;
            Ok(id)
        })
        .await
    }

    async fn list_active_entries(&self) -> Result<Vec<CatalogEntry>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM entries e WHERE e.active = 1 ORDER BY e.id",
                ENTRY_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], entry_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn query_entries(&self, query: &EntryQuery) -> Result<Vec<CatalogEntry>> {
        let (sql, values) = entry_query_sql(query, false);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), entry_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn count_entries(&self, query: &EntryQuery) -> Result<u64> {
        let (sql, values) = entry_query_sql(query, true);
        self.with_conn(move |conn| count_query(conn, &sql, &values))
            .await
    }

    async fn get_tag(&self, id: TagId) -> Result<Option<Tag>> {
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT id, name, hidden FROM tags WHERE id = ?1",
                    params![id],
                    tag_from_row,
                )
                .optional()?)
        })
        .await
    }

    async fn get_tag_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT id, name, hidden FROM tags WHERE name = ?1",
                    params![name],
                    tag_from_row,
                )
                .optional()?)
        })
        .await
    }

    async fn upsert_tag(&self, name: &str) -> Result<Tag> {
        let name = name.to_string();
        self.with_conn(move |conn| Ok(upsert_tag_row(conn, &name)?))
            .await
    }

    async fn set_entry_tags(&self, entry_id: EntryId, tag_ids: &[TagId]) -> Result<()> {
        let tag_ids = tag_ids.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            replace_entry_tags(&tx, entry_id, &tag_ids)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn entry_tags(&self, entry_id: EntryId) -> Result<Vec<Tag>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT t.id, t.name, t.hidden FROM tags t \
                 JOIN entry_tags et ON et.tag_id = t.id \
                 WHERE et.entry_id = ?1 ORDER BY t.name",
            )?;
            let rows = stmt.query_map(params![entry_id], tag_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn first_entry_of_tag(&self, tag_id: TagId) -> Result<Option<CatalogEntry>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM entries e JOIN entry_tags et ON et.entry_id = e.id \
                 WHERE et.tag_id = ?1 AND {} ORDER BY e.name, e.id LIMIT 1",
                ENTRY_COLUMNS, VISIBLE
            );
            Ok(conn.query_row(&sql, params![tag_id], entry_from_row).optional()?)
        })
        .await
    }

    async fn tag_entry_count(&self, tag_id: TagId) -> Result<u64> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT COUNT(*) FROM entries e JOIN entry_tags et ON et.entry_id = e.id \
                 WHERE et.tag_id = ? AND {}",
                VISIBLE
            );
            count_query(conn, &sql, &[Value::Integer(tag_id)])
        })
        .await
    }

    async fn query_tags(&self, query: &TagListQuery) -> Result<Vec<(Tag, u64)>> {
        let (sql, values) = tag_query_sql(query, false);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
                let count: i64 = row.get(3)?;
                Ok((tag_from_row(row)?, count.max(0) as u64))
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn count_tags(&self, query: &TagListQuery) -> Result<u64> {
        let (sql, values) = tag_query_sql(query, true);
        self.with_conn(move |conn| count_query(conn, &sql, &values))
            .await
    }

    async fn get_or_create_user(&self, email: &str) -> Result<User> {
        let email = email.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO users (email) VALUES (?1) ON CONFLICT(email) DO NOTHING",
                params![email],
            )?;
            Ok(conn.query_row(
                "SELECT id, email FROM users WHERE email = ?1",
                params![email],
                |r| {
                    Ok(User {
                        id: r.get(0)?,
                        email: r.get(1)?,
                    })
                },
            )?)
        })
        .await
    }

    async fn is_favorite_entry(&self, user_id: UserId, entry_id: EntryId) -> Result<bool> {
        self.with_conn(move |conn| {
            Ok(conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM favorite_entries WHERE user_id = ?1 AND entry_id = ?2)",
                params![user_id, entry_id],
                |r| r.get(0),
            )?)
        })
        .await
    }

    async fn set_favorite_entry(&self, user_id: UserId, entry_id: EntryId, favorite: bool) -> Result<()> {
        self.with_conn(move |conn| {
            if favorite {
                conn.execute(
                    "INSERT OR IGNORE INTO favorite_entries (user_id, entry_id) VALUES (?1, ?2)",
                    params![user_id, entry_id],
                )?;
            } else {
                conn.execute(
                    "DELETE FROM favorite_entries WHERE user_id = ?1 AND entry_id = ?2",
                    params![user_id, entry_id],
                )?;
            }
            Ok(())
        })
        .await
    }

    async fn is_favorite_tag(&self, user_id: UserId, tag_id: TagId) -> Result<bool> {
        self.with_conn(move |conn| {
            Ok(conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM favorite_tags WHERE user_id = ?1 AND tag_id = ?2)",
                params![user_id, tag_id],
                |r| r.get(0),
            )?)
        })
        .await
    }

    async fn set_favorite_tag(&self, user_id: UserId, tag_id: TagId, favorite: bool) -> Result<()> {
        self.with_conn(move |conn| {
            if favorite {
                conn.execute(
                    "INSERT OR IGNORE INTO favorite_tags (user_id, tag_id) VALUES (?1, ?2)",
                    params![user_id, tag_id],
                )?;
            } else {
                conn.execute(
                    "DELETE FROM favorite_tags WHERE user_id = ?1 AND tag_id = ?2",
                    params![user_id, tag_id],
                )?;
            }
            Ok(())
        })
        .await
    }

    async fn has_favorite_tag(&self, user_id: UserId, entry_id: EntryId) -> Result<bool> {
        self.with_conn(move |conn| {
            Ok(conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM entry_tags et \
                 JOIN favorite_tags ft ON ft.tag_id = et.tag_id \
                 WHERE et.entry_id = ?1 AND ft.user_id = ?2)",
                params![entry_id, user_id],
                |r| r.get(0),
            )?)
        })
        .await
    }

    async fn get_progress(&self, user_id: UserId, entry_id: EntryId) -> Result<Option<Progress>> {
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT page, max_page FROM progress WHERE user_id = ?1 AND entry_id = ?2",
                    params![user_id, entry_id],
                    |r| {
                        let page: i64 = r.get(0)?;
                        let max: i64 = r.get(1)?;
                        Ok(Progress {
                            user_id,
                            entry_id,
                            page: page.max(0) as usize,
                            max: max.max(0) as usize,
                        })
                    },
                )
                .optional()?)
        })
        .await
    }

    async fn save_progress(&self, progress: &Progress) -> Result<()> {
        let progress = *progress;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO progress (user_id, entry_id, page, max_page) VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(user_id, entry_id) DO UPDATE SET \
                     page = excluded.page, max_page = excluded.max_page",
                params![
                    progress.user_id,
                    progress.entry_id,
                    progress.page as i64,
                    progress.max as i64
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn record_view(&self, user_id: UserId, entry_id: EntryId, at: DateTime<Utc>) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO history (user_id, entry_id, viewed_at) VALUES (?1, ?2, ?3)",
                params![user_id, entry_id, at.timestamp_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn history(&self, user_id: UserId, pagination: Option<Pagination>) -> Result<Vec<HistoryRecord>> {
        self.with_conn(move |conn| {
            let mut sql = String::from(
                "SELECT user_id, entry_id, viewed_at FROM history WHERE user_id = ? \
                 ORDER BY viewed_at DESC, id DESC",
            );
            let mut values = vec![Value::Integer(user_id)];
            push_pagination(&mut sql, &mut values, pagination);

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), |r| {
                let viewed_ms: i64 = r.get(2)?;
                Ok(HistoryRecord {
                    user_id: r.get(0)?,
                    entry_id: r.get(1)?,
                    viewed_at: DateTime::from_timestamp_millis(viewed_ms).unwrap_or_default(),
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn count_history(&self, user_id: UserId) -> Result<u64> {
        self.with_conn(move |conn| {
            count_query(
                conn,
                "SELECT COUNT(*) FROM history WHERE user_id = ?",
                &[Value::Integer(user_id)],
            )
        })
        .await
    }

    async fn count_visible_entries(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let sql = format!("SELECT COUNT(*) FROM entries e WHERE {}", VISIBLE);
            count_query(conn, &sql, &[])
        })
        .await
    }

    async fn count_visible_tags(&self) -> Result<u64> {
        self.with_conn(|conn| count_query(conn, "SELECT COUNT(*) FROM tags WHERE hidden = 0", &[]))
            .await
    }

    async fn user_counts(&self, user_id: UserId) -> Result<UserCounts> {
        self.with_conn(move |conn| {
            let user = [Value::Integer(user_id)];
            let read_entries = count_query(
                conn,
                &format!(
                    "SELECT COUNT(*) FROM progress p JOIN entries e ON e.id = p.entry_id \
                     WHERE p.user_id = ? AND {}",
                    VISIBLE
                ),
                &user,
            )?;
            let favorite_entries = count_query(
                conn,
                &format!(
                    "SELECT COUNT(*) FROM favorite_entries f JOIN entries e ON e.id = f.entry_id \
                     WHERE f.user_id = ? AND {}",
                    VISIBLE
                ),
                &user,
            )?;
            let favorite_tags = count_query(
                conn,
                "SELECT COUNT(*) FROM favorite_tags f JOIN tags t ON t.id = f.tag_id \
                 WHERE f.user_id = ? AND t.hidden = 0",
                &user,
            )?;

            Ok(UserCounts {
                read_entries,
                favorite_entries,
                favorite_tags,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::query::SortOrder;

    fn entry(name: &str, pages: usize) -> CatalogEntry {
        let mut entry = CatalogEntry::new(name, ContainerKind::Zip);
        entry.file_indices = (0..pages).collect();
        entry
    }

    fn query(user_id: UserId) -> EntryQuery {
        EntryQuery {
            user_id,
            name: None,
            tag_id: None,
            filter: EntryFilter::None,
            sort: SortField::Name,
            order: SortOrder::Ascending,
            pagination: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_keeps_id_and_creation_time() {
        let store = SqliteStore::open_in_memory().unwrap();

        let first = entry("a.zip", 2);
        let id = store.upsert_entry(&first).await.unwrap();

        let mut changed = entry("a.zip", 5);
        changed.create_time = first.create_time + chrono::Duration::days(3);
        changed.thumbnail.crop = CropRect::new(1, 2, 3, 4);
        assert_eq!(store.upsert_entry(&changed).await.unwrap(), id);

        let stored = store.get_entry(id).await.unwrap().unwrap();
        assert_eq!(stored.page_count(), 5);
        assert_eq!(stored.thumbnail.crop, CropRect::new(1, 2, 3, 4));
        assert_eq!(
            stored.create_time.timestamp_millis(),
            first.create_time.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_page_count_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        for (name, pages) in [("a.zip", 12), ("b.zip", 3), ("c.zip", 7)] {
            store.upsert_entry(&entry(name, pages)).await.unwrap();
        }

        let mut q = query(1);
        q.sort = SortField::PageCount;
        let names: Vec<String> = store
            .query_entries(&q)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["b.zip", "c.zip", "a.zip"]);

        q.order = SortOrder::Descending;
        let first = store.query_entries(&q).await.unwrap().remove(0);
        assert_eq!(first.name, "a.zip");
    }

    #[tokio::test]
    async fn test_name_filter_is_case_insensitive() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_entry(&entry("[Circle] Book One.zip", 1)).await.unwrap();
        store.upsert_entry(&entry("Other.zip", 1)).await.unwrap();

        let mut q = query(1);
        q.name = Some("book".to_string());
        assert_eq!(store.count_entries(&q).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_entry_tags_replace() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.upsert_entry(&entry("x.zip", 1)).await.unwrap();
        let a = store.upsert_tag("A").await.unwrap();
        let b = store.upsert_tag("B").await.unwrap();
        assert_eq!(store.upsert_tag("A").await.unwrap().id, a.id);

        store.set_entry_tags(id, &[a.id, b.id]).await.unwrap();
        assert_eq!(store.entry_tags(id).await.unwrap().len(), 2);

        store.set_entry_tags(id, &[b.id]).await.unwrap();
        let tags = store.entry_tags(id).await.unwrap();
        assert_eq!(tags, vec![b]);
        assert_eq!(store.tag_entry_count(a.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_entry_writes_row_and_tags_together() {
        let store = SqliteStore::open_in_memory().unwrap();
        let tags = vec!["Action".to_string(), "Comedy".to_string()];

        let id = store.save_entry(&entry("[Action][Comedy] x.zip", 4), &tags).await.unwrap();
        let names: Vec<String> = store
            .entry_tags(id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, tags);

        // Saving again keeps the id and replaces the tag set
        let again = store
            .save_entry(&entry("[Action][Comedy] x.zip", 6), &["Action".to_string()])
            .await
            .unwrap();
        assert_eq!(again, id);
        assert_eq!(store.get_entry(id).await.unwrap().unwrap().page_count(), 6);
        assert_eq!(store.entry_tags(id).await.unwrap().len(), 1);
        let comedy = store.get_tag_by_name("Comedy").await.unwrap().unwrap();
        assert_eq!(store.tag_entry_count(comedy.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_users_are_created_once() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store.get_or_create_user("a@example.com").await.unwrap();
        let again = store.get_or_create_user("a@example.com").await.unwrap();
        let other = store.get_or_create_user("b@example.com").await.unwrap();

        assert_eq!(first, again);
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn test_progress_single_record() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store.get_or_create_user("a@example.com").await.unwrap();
        let id = store.upsert_entry(&entry("x.zip", 10)).await.unwrap();

        store.save_progress(&Progress::start(user.id, id, 4)).await.unwrap();
        let mut progress = store.get_progress(user.id, id).await.unwrap().unwrap();
        progress.advance(2);
        store.save_progress(&progress).await.unwrap();

        let stored = store.get_progress(user.id, id).await.unwrap().unwrap();
        assert_eq!((stored.page, stored.max), (2, 4));
    }
}
