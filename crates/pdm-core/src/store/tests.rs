//! Tests for the download store (in-memory database).

use crate::status::StatusCode;
use crate::store::{DownloadInfo, DownloadStore, Header};

fn sample_info() -> DownloadInfo {
    let mut info = DownloadInfo::new("https://example.com/file.bin", "/tmp/dl", "file.bin");
    info.total_bytes = 1000;
    info.num_pieces = 4;
    info.partial_support = true;
    info.checksum = Some("d41d8cd98f00b204e9800998ecf8427e".into());
    info
}

#[tokio::test]
async fn add_and_get_roundtrip() {
    let store = DownloadStore::open_memory().await.unwrap();
    let info = sample_info();
    let pieces = info.make_pieces();
    let headers = vec![Header::new(info.id, "User-Agent", "pdm-test")];
    store
        .add_info_with_pieces_and_headers(&info, &pieces, &headers)
        .await
        .unwrap();

    let got = store.get_info(info.id).await.unwrap().unwrap();
    assert_eq!(got, info);
    let got_pieces = store.get_pieces(info.id).await.unwrap();
    assert_eq!(got_pieces, pieces);
    assert_eq!(got_pieces[3].size, 250);
    assert_eq!(got_pieces[3].cur_bytes, 750);
    assert_eq!(store.get_headers(info.id).await.unwrap(), headers);
    assert_eq!(store.get_all_info().await.unwrap().len(), 1);
}

#[tokio::test]
async fn missing_rows_are_none() {
    let store = DownloadStore::open_memory().await.unwrap();
    let id = uuid::Uuid::new_v4();
    assert!(store.get_info(id).await.unwrap().is_none());
    assert!(store.get_pieces(id).await.unwrap().is_empty());
    assert!(store.get_info_and_pieces(id).await.unwrap().is_none());
}

#[tokio::test]
async fn pieces_require_parent() {
    let store = DownloadStore::open_memory().await.unwrap();
    let info = sample_info();
    // Foreign key violation rolls back the whole insert.
    let orphan = crate::store::DownloadPiece::new(uuid::Uuid::new_v4(), 0, 10, 0);
    assert!(store
        .add_info_with_pieces_and_headers(&info, &[orphan], &[])
        .await
        .is_err());
    assert!(store.get_info(info.id).await.unwrap().is_none());
}

#[tokio::test]
async fn update_info_and_piece() {
    let store = DownloadStore::open_memory().await.unwrap();
    let mut info = sample_info();
    let mut pieces = info.make_pieces();
    store
        .add_info_with_pieces_and_headers(&info, &pieces, &[])
        .await
        .unwrap();

    info.status_code = StatusCode::HttpError(503);
    info.status_msg = Some("Service Unavailable".into());
    info.num_failed = 2;
    info.retry_after = 30_000;
    store.update_info(&info).await.unwrap();
    let got = store.get_info(info.id).await.unwrap().unwrap();
    assert_eq!(got.status_code, StatusCode::HttpError(503));
    assert_eq!(got.num_failed, 2);
    assert_eq!(got.retry_after, 30_000);

    pieces[2].cur_bytes = 600;
    pieces[2].status_code = StatusCode::Success;
    store.update_piece(&pieces[2]).await.unwrap();
    let got = store.get_piece(info.id, 2).await.unwrap().unwrap();
    assert_eq!(got.cur_bytes, 600);
    assert_eq!(got.status_code, StatusCode::Success);
}

#[tokio::test]
async fn replace_pieces_swaps_plan() {
    let store = DownloadStore::open_memory().await.unwrap();
    let mut info = sample_info();
    store
        .add_info_with_pieces_and_headers(&info, &info.make_pieces(), &[])
        .await
        .unwrap();
    info.num_pieces = 2;
    store
        .update_info_and_replace_pieces(&info, &info.make_pieces())
        .await
        .unwrap();
    let pieces = store.get_pieces(info.id).await.unwrap();
    assert_eq!(pieces.len(), 2);
    assert_eq!(pieces[1].cur_bytes, 500);
    assert_eq!(store.get_info(info.id).await.unwrap().unwrap().num_pieces, 2);

    info.num_pieces = 1;
    store.replace_pieces(info.id, &info.make_pieces()).await.unwrap();
    assert_eq!(store.get_pieces(info.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn set_header_replaces_case_insensitively() {
    let store = DownloadStore::open_memory().await.unwrap();
    let info = sample_info();
    store
        .add_info_with_pieces_and_headers(&info, &[], &[Header::new(info.id, "etag", "\"a\"")])
        .await
        .unwrap();
    store.set_header(info.id, "ETag", "\"b\"").await.unwrap();
    let headers = store.get_headers(info.id).await.unwrap();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].value, "\"b\"");
    store.remove_header(info.id, "ETAG").await.unwrap();
    assert!(store.get_headers(info.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_cascades_to_pieces_and_headers() {
    let store = DownloadStore::open_memory().await.unwrap();
    let info = sample_info();
    store
        .add_info_with_pieces_and_headers(
            &info,
            &info.make_pieces(),
            &[Header::new(info.id, "Referer", "https://example.com/")],
        )
        .await
        .unwrap();
    store.delete_info(info.id).await.unwrap();
    assert!(store.get_info(info.id).await.unwrap().is_none());
    assert!(store.get_pieces(info.id).await.unwrap().is_empty());
    assert!(store.get_headers(info.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn observe_info_emits_fresh_rows() {
    let store = DownloadStore::open_memory().await.unwrap();
    let mut info = sample_info();
    store
        .add_info_with_pieces_and_headers(&info, &info.make_pieces(), &[])
        .await
        .unwrap();
    let mut obs = store.observe_info(info.id);
    let first = obs.next().await.unwrap().unwrap();
    assert_eq!(first.info.status_code, StatusCode::Pending);

    info.status_code = StatusCode::Running;
    store.update_info(&info).await.unwrap();
    let second = obs.next().await.unwrap().unwrap();
    assert_eq!(second.info.status_code, StatusCode::Running);
    assert_eq!(second.pieces.len(), 4);

    store.delete_info(info.id).await.unwrap();
    assert!(obs.next().await.unwrap().is_none());
}

#[tokio::test]
async fn observe_all_emits_after_insert() {
    let store = DownloadStore::open_memory().await.unwrap();
    let mut obs = store.observe_all_info();
    assert!(obs.next().await.unwrap().unwrap().is_empty());
    let info = sample_info();
    store
        .add_info_with_pieces_and_headers(&info, &info.make_pieces(), &[])
        .await
        .unwrap();
    let all = obs.next().await.unwrap().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].info.id, info.id);
}

#[tokio::test]
async fn open_at_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("downloads.db");
    let info = sample_info();
    {
        let store = DownloadStore::open_at(&path).await.unwrap();
        store
            .add_info_with_pieces_and_headers(&info, &info.make_pieces(), &[])
            .await
            .unwrap();
        store.pool.close().await;
    }
    let store = DownloadStore::open_at(&path).await.unwrap();
    assert_eq!(store.get_info(info.id).await.unwrap().unwrap().url, info.url);
    assert_eq!(store.get_pieces(info.id).await.unwrap().len(), 4);
}
