//! Page delivery, chunked transfers and the progress they record.

mod common;

use std::io::Cursor;

use common::{noise, png, write_dir, write_zip, TestLibrary};
use folio::config::CHUNK_SIZE;
use folio::domain::Chunk;
use folio::{ErrorKind, LibraryError};
use tokio::sync::mpsc;

/// Drain a channel on a separate task until the sender side is dropped
fn collect(mut rx: mpsc::Receiver<Chunk>) -> tokio::task::JoinHandle<Vec<Chunk>> {
    tokio::spawn(async move {
        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }
        chunks
    })
}

#[tokio::test]
async fn test_unbounded_page_is_returned_verbatim() {
    let lib = TestLibrary::new();
    let id = lib.register_zip("Alpha.zip", 3).await;

    let payload = lib.service.page_image("alice", id, 0, 0, 0).await.unwrap();

    assert_eq!(payload.filename, "001.png");
    assert_eq!(payload.content_type, "image/png");
    assert_eq!(payload.data, png(60, 80));
}

#[tokio::test]
async fn test_bounded_page_is_resized_and_reencoded() {
    let lib = TestLibrary::new();
    let id = lib.register_zip("Alpha.zip", 3).await;

    let payload = lib.service.page_image("alice", id, 1, 0, 40).await.unwrap();

    assert_eq!(payload.filename, "002.png.jpeg");
    assert_eq!(payload.content_type, "image/jpeg");

    let decoded = image::load_from_memory(&payload.data).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (30, 40));
}

#[tokio::test]
async fn test_page_reads_move_progress() {
    let lib = TestLibrary::new();
    let id = lib.register_zip("Alpha.zip", 4).await;

    lib.service.page_image("alice", id, 2, 0, 0).await.unwrap();
    let detail = lib.service.detail("alice", id).await.unwrap();
    assert_eq!(detail.current_page, 2);
    assert_eq!(detail.max_progress, 2);

    lib.service.page_image("alice", id, 1, 0, 0).await.unwrap();
    let detail = lib.service.detail("alice", id).await.unwrap();
    assert_eq!(detail.current_page, 1);
    assert_eq!(detail.max_progress, 2);

    lib.service.page_image("alice", id, 3, 0, 0).await.unwrap();
    let detail = lib.service.detail("alice", id).await.unwrap();
    assert_eq!(detail.max_progress, 3);

    let other = lib.service.detail("bob", id).await.unwrap();
    assert_eq!(other.current_page, 0);
    assert_eq!(other.max_progress, 0);
}

#[tokio::test]
async fn test_missing_page_is_not_found_and_records_nothing() {
    let lib = TestLibrary::new();
    let id = lib.register_zip("Alpha.zip", 2).await;

    let err = lib
        .service
        .page_image("alice", id, 10, 0, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, LibraryError::PageNotFound { index: 10, .. }));

    let stats = lib.service.user_info("alice").await.unwrap();
    assert_eq!(stats.read_entry_count, 0);

    let err = lib.service.page_image("alice", 999, 0, 0, 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_page_stream_matches_page() {
    let lib = TestLibrary::new();
    let id = lib.register_zip("Alpha.zip", 2).await;

    let (tx, rx) = mpsc::channel(4);
    let collector = collect(rx);
    let sent = lib
        .service
        .page_image_stream("alice", id, 0, 0, 0, &tx)
        .await
        .unwrap();
    drop(tx);
    let chunks = collector.await.unwrap();

    assert_eq!(sent, 1);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].filename, "001.png");
    assert_eq!(chunks[0].data, png(60, 80));
    assert_eq!(chunks[0].size, chunks[0].data.len());
}

#[tokio::test]
async fn test_download_stream_uses_full_size_frames() {
    let lib = TestLibrary::new();
    let path = lib.data_path().join("Large.zip");
    write_zip(
        &path,
        &[
            ("001.png", png(60, 80)),
            ("extras/blob.bin", noise(CHUNK_SIZE * 2 + CHUNK_SIZE / 2)),
        ],
    );
    let outcome = lib.service.register("Large.zip").await.unwrap();
    assert_eq!(outcome.page_count, 1);

    let (tx, rx) = mpsc::channel(2);
    let collector = collect(rx);
    let sent = lib.service.download_stream(outcome.id, &tx).await.unwrap();
    drop(tx);
    let chunks = collector.await.unwrap();

    let original = std::fs::read(&path).unwrap();
    let expected = original.len().div_ceil(CHUNK_SIZE);
    assert_eq!(sent, expected);
    assert_eq!(chunks.len(), expected);

    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.size, chunk.data.len());
        assert_eq!(chunk.filename, "Large.zip");
        assert_eq!(chunk.content_type, "application/zip");
        if i + 1 < chunks.len() {
            assert_eq!(chunk.size, CHUNK_SIZE);
        }
    }

    let joined: Vec<u8> = chunks.into_iter().flat_map(|c| c.data).collect();
    assert_eq!(joined, original);
}

#[tokio::test]
async fn test_download_does_not_touch_progress() {
    let lib = TestLibrary::new();
    let id = lib.register_zip("Alpha.zip", 2).await;

    let payload = lib.service.download(id).await.unwrap();
    assert_eq!(payload.filename, "Alpha.zip");
    assert_eq!(payload.content_type, "application/zip");

    let stats = lib.service.user_info("").await.unwrap();
    assert_eq!(stats.read_entry_count, 0);
}

#[tokio::test]
async fn test_directory_download_is_a_zip_of_its_files() {
    let lib = TestLibrary::new();
    write_dir(
        &lib.data_path().join("Foxtrot"),
        &[
            ("ch1/002.png", png(10, 10)),
            ("ch1/001.png", png(10, 10)),
            ("notes.txt", b"hello".to_vec()),
        ],
    );
    let outcome = lib.service.register("Foxtrot").await.unwrap();
    assert_eq!(outcome.page_count, 2);

    let payload = lib.service.download(outcome.id).await.unwrap();
    assert_eq!(payload.filename, "Foxtrot.zip");

    let archive = zip::ZipArchive::new(Cursor::new(payload.data)).unwrap();
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort();
    assert_eq!(names, vec!["ch1/001.png", "ch1/002.png", "notes.txt"]);
}

#[tokio::test]
async fn test_closed_receiver_stops_the_stream() {
    let lib = TestLibrary::new();
    let id = lib.register_zip("Alpha.zip", 1).await;

    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    let err = lib.service.download_stream(id, &tx).await.unwrap_err();
    assert!(matches!(err, LibraryError::StreamClosed));
}
