//! Registration, repair, tags, covers, history and statistics.

mod common;

use common::{png, write_zip, TestLibrary};
use folio::library::{TagFilter, TagQuery, TagSort};
use folio::{CatalogQuery, CropRect, ErrorKind};

#[tokio::test]
async fn test_register_and_repair_are_idempotent() {
    let lib = TestLibrary::new();
    lib.add_zip("[Action][Comedy] Alpha.zip", 3);

    let first = lib.service.register("[Action][Comedy] Alpha.zip").await.unwrap();
    assert_eq!(first.page_count, 3);
    assert_eq!(first.tags, vec!["Action", "Comedy"]);

    let again = lib.service.register("[Action][Comedy] Alpha.zip").await.unwrap();
    assert_eq!(again, first);

    let store = lib.service.store();
    let before = store.get_entry(first.id).await.unwrap().unwrap();

    let repaired = lib.service.repair(first.id).await.unwrap();
    let repaired_again = lib.service.repair(first.id).await.unwrap();
    assert_eq!(repaired, repaired_again);

    let after = store.get_entry(first.id).await.unwrap().unwrap();
    assert_eq!(after, before);
    assert_eq!(store.entry_tags(first.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_repair_picks_up_container_changes() {
    let lib = TestLibrary::new();
    let id = lib.register_zip("Alpha.zip", 3).await;
    lib.service
        .update_cover(id, 2, CropRect::empty())
        .await
        .unwrap();

    write_zip(
        &lib.data_path().join("Alpha.zip"),
        &[("001.png", png(60, 80))],
    );
    let outcome = lib.service.repair(id).await.unwrap();
    assert_eq!(outcome.page_count, 1);

    let entry = lib.service.store().get_entry(id).await.unwrap().unwrap();
    assert_eq!(entry.thumbnail.index, 0);
}

#[tokio::test]
async fn test_register_rejects_missing_and_unsupported_paths() {
    let lib = TestLibrary::new();

    let err = lib.service.register("missing.zip").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    std::fs::write(lib.data_path().join("notes.txt"), b"text").unwrap();
    let err = lib.service.register("notes.txt").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = lib.service.repair(42).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_unreadable_container_is_not_cataloged() {
    let lib = TestLibrary::new();
    std::fs::write(lib.data_path().join("[Broken] Bad.zip"), b"not a zip at all").unwrap();

    assert!(lib.service.register("[Broken] Bad.zip").await.is_err());

    assert!(lib.names(&CatalogQuery::default()).await.is_empty());
    let store = lib.service.store();
    assert!(store.get_entry_by_name("[Broken] Bad.zip").await.unwrap().is_none());
    assert!(store.get_tag_by_name("Broken").await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_repair_keeps_the_previous_row() {
    let lib = TestLibrary::new();
    let id = lib.register_zip("[Action] Alpha.zip", 3).await;
    lib.service.thumbnail(id).await.unwrap();
    let before = lib.service.store().get_entry(id).await.unwrap().unwrap();

    std::fs::write(lib.data_path().join("[Action] Alpha.zip"), b"truncated").unwrap();
    assert!(lib.service.repair(id).await.is_err());

    let store = lib.service.store();
    assert_eq!(store.get_entry(id).await.unwrap().unwrap(), before);
    assert_eq!(store.entry_tags(id).await.unwrap().len(), 1);
    assert_eq!(lib.cached_thumbnails(id), 1);
}

#[tokio::test]
async fn test_first_directory_becomes_a_tag() {
    let lib = TestLibrary::with_config(|config| config.first_dir_as_tag = true);
    lib.add_zip("Artist/[Action] Alpha.zip", 1);

    let outcome = lib.service.register("Artist/[Action] Alpha.zip").await.unwrap();

    assert_eq!(outcome.tags, vec!["Artist", "Action"]);
}

#[tokio::test]
async fn test_tag_list_detail_and_favorites() {
    let lib = TestLibrary::new();
    lib.register_zip("[Action] Alpha.zip", 1).await;
    lib.register_zip("[Action][Drama] Bravo.zip", 1).await;
    lib.register_zip("[Comedy] Charlie.zip", 1).await;

    let by_count = TagQuery {
        identity: "alice".to_string(),
        sort: TagSort::EntryCount,
        order: folio::library::SortOrder::Descending,
        ..TagQuery::default()
    };
    let list = lib.service.tag_list(&by_count).await.unwrap();
    assert_eq!(list.items.len(), 3);
    assert_eq!(list.items[0].name, "Action");
    assert_eq!(list.items[0].entry_count, 2);

    assert!(lib.service.tag_set_favorite("alice", "Drama", true).await.unwrap());
    let favorites = TagQuery {
        identity: "alice".to_string(),
        filter: TagFilter::FavoriteTags,
        ..TagQuery::default()
    };
    let list = lib.service.tag_list(&favorites).await.unwrap();
    assert_eq!(list.items.len(), 1);
    assert_eq!(list.items[0].name, "Drama");
    assert!(list.items[0].is_favorite);

    let detail = lib.service.tag_detail("alice", "Drama").await.unwrap();
    assert!(detail.is_favorite);
    assert!(!detail.is_hidden);
    assert_eq!(detail.entry_count, 1);

    let err = lib.service.tag_detail("alice", "Nope").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let named = TagQuery {
        name: Some("medy".to_string()),
        ..TagQuery::default()
    };
    let list = lib.service.tag_list(&named).await.unwrap();
    assert_eq!(list.items.len(), 1);
    assert_eq!(list.items[0].name, "Comedy");
}

#[tokio::test]
async fn test_thumbnails_are_cached_and_scaled() {
    let lib = TestLibrary::with_config(|config| config.thumbnail.height = 40);
    let id = lib.register_zip("[Action] Alpha.zip", 2).await;
    assert_eq!(lib.cached_thumbnails(id), 0);

    let payload = lib.service.thumbnail(id).await.unwrap();
    assert_eq!(payload.content_type, "image/jpeg");
    assert_eq!(lib.cached_thumbnails(id), 1);

    let decoded = image::load_from_memory(&payload.data).unwrap();
    assert_eq!(decoded.height(), 40);
    assert!(decoded.width() < 40);

    let again = lib.service.thumbnail(id).await.unwrap();
    assert_eq!(again.data, payload.data);

    let by_tag = lib.service.tag_thumbnail("Action").await.unwrap();
    assert_eq!(by_tag.data, payload.data);
}

#[tokio::test]
async fn test_update_cover_validates_and_invalidates() {
    let lib = TestLibrary::new();
    let id = lib.register_zip("Alpha.zip", 2).await;
    lib.service.thumbnail(id).await.unwrap();

    let err = lib
        .service
        .update_cover(id, 2, CropRect::empty())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(lib.cached_thumbnails(id), 1);

    let crop = CropRect::new(10, 10, 20, 30);
    let entry = lib.service.update_cover(id, 1, crop).await.unwrap();
    assert_eq!(entry.thumbnail.index, 1);
    assert_eq!(entry.thumbnail.crop, crop);
    assert_eq!(lib.cached_thumbnails(id), 0);

    let payload = lib.service.thumbnail(id).await.unwrap();
    let decoded = image::load_from_memory(&payload.data).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (20, 30));
}

#[tokio::test]
async fn test_history_is_newest_first() {
    let lib = TestLibrary::new();
    let alpha = lib.register_zip("Alpha.zip", 1).await;
    let bravo = lib.register_zip("Bravo.zip", 1).await;

    lib.service.detail("alice", alpha).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    lib.service.detail("alice", bravo).await.unwrap();

    let history = lib.service.history("alice", 0, 30).await.unwrap();
    let ids: Vec<_> = history.items.iter().map(|i| i.entry_id).collect();
    assert_eq!(ids, vec![bravo, alpha]);
    assert_eq!(history.total_pages, 1);

    let empty = lib.service.history("bob", 0, 30).await.unwrap();
    assert!(empty.items.is_empty());
    assert_eq!(empty.total_pages, 0);
}

#[tokio::test]
async fn test_user_and_system_counters() {
    let lib = TestLibrary::new();
    let alpha = lib.register_zip("[Action] Alpha.zip", 2).await;
    lib.register_zip("[Drama] Bravo.zip", 2).await;

    lib.service.set_favorite("alice", alpha, true).await.unwrap();
    lib.service.set_progress("alice", alpha, 1).await.unwrap();
    lib.service
        .tag_set_favorite("alice", "Drama", true)
        .await
        .unwrap();

    let stats = lib.service.user_info("alice").await.unwrap();
    assert_eq!(stats.read_entry_count, 1);
    assert_eq!(stats.favorite_entry_count, 1);
    assert_eq!(stats.favorite_tag_count, 1);

    let system = lib.service.system_info().await.unwrap();
    assert_eq!(system.entry_count, 2);
    assert_eq!(system.tag_count, 2);
    assert_eq!(system.version, env!("CARGO_PKG_VERSION"));
}
