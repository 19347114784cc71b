//! Integration tests for the asset store: atomic uploads, selection and
//! background pictures.

mod common;

use assert_matches::assert_matches;
use common::{api_error, png, FakeService};
use cutout_core::asset::AssetId;
use cutout_service::messages::UploadResponse;
use cutout_session::assets::AssetStore;
use cutout_session::SessionError;

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Uploading two images adds both in order and selects the first.
#[tokio::test]
async fn upload_appends_in_order_and_selects_first() {
    let fake = FakeService::new();
    let mut store = AssetStore::new(fake.clone());

    let added = store.upload(vec![png("A.png"), png("B.png")]).await.unwrap();

    assert_eq!(added.assets.len(), 2);
    assert_eq!(store.ids(), vec![AssetId::new("A"), AssetId::new("B")]);
    assert_eq!(store.current().unwrap().id, AssetId::new("A"));
    assert_eq!(store.current().unwrap().local_display_ref, "A.png");
    // One call for the whole batch.
    assert_eq!(fake.uploads(), vec![vec!["A.png".to_string(), "B.png".to_string()]]);
}

/// A later upload appends but leaves the existing selection alone.
#[tokio::test]
async fn second_upload_keeps_current_selection() {
    let fake = FakeService::new();
    let mut store = AssetStore::new(fake.clone());

    store.upload(vec![png("A.png")]).await.unwrap();
    store.upload(vec![png("B.png"), png("C.png")]).await.unwrap();

    assert_eq!(store.len(), 3);
    assert_eq!(store.current().unwrap().id, AssetId::new("A"));
}

/// A rejected upload adds nothing.
#[tokio::test]
async fn failed_upload_leaves_store_unchanged() {
    let fake = FakeService::new();
    let mut store = AssetStore::new(fake.clone());
    store.upload(vec![png("A.png")]).await.unwrap();

    fake.queue_upload(Err(api_error(400, "Invalid image file: notes.txt")));
    let err = store
        .upload(vec![png("B.png"), png("notes.txt")])
        .await
        .unwrap_err();

    assert_matches!(err, SessionError::Upload(ref msg) if msg.contains("Invalid image file"));
    assert_eq!(store.len(), 1);
    assert_eq!(store.current().unwrap().id, AssetId::new("A"));
}

/// A response that does not cover every file is treated as a failure.
#[tokio::test]
async fn short_id_list_is_rejected() {
    let fake = FakeService::new();
    let mut store = AssetStore::new(fake.clone());

    fake.queue_upload(Ok(UploadResponse {
        file_ids: vec!["A".into()],
        preview: None,
        mask: None,
    }));
    let err = store.upload(vec![png("A.png"), png("B.png")]).await.unwrap_err();

    assert_matches!(err, SessionError::Upload(_));
    assert!(store.is_empty());
    assert!(store.current().is_none());
}

/// An empty batch fails without contacting the service.
#[tokio::test]
async fn empty_upload_is_rejected_locally() {
    let fake = FakeService::new();
    let mut store = AssetStore::new(fake.clone());

    assert_matches!(store.upload(Vec::new()).await, Err(SessionError::Upload(_)));
    assert!(fake.uploads().is_empty());
}

/// The initial preview and mask from the upload response are passed on.
#[tokio::test]
async fn upload_outcome_carries_preview_and_mask() {
    let fake = FakeService::new();
    let mut store = AssetStore::new(fake.clone());

    fake.queue_upload(Ok(UploadResponse {
        file_ids: vec!["A".into()],
        preview: Some("data:image/png;base64,AAAA".into()),
        mask: Some("data:image/png;base64,BBBB".into()),
    }));
    let outcome = store.upload(vec![png("A.png")]).await.unwrap();

    assert_eq!(outcome.preview.unwrap().as_str(), "data:image/png;base64,AAAA");
    assert_eq!(outcome.mask.unwrap().as_str(), "data:image/png;base64,BBBB");
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Selecting a member moves the current pointer.
#[tokio::test]
async fn select_existing_asset() {
    let fake = FakeService::new();
    let mut store = AssetStore::new(fake.clone());
    store.upload(vec![png("A.png"), png("B.png")]).await.unwrap();

    let selected = store.select(&AssetId::new("B")).unwrap();
    assert_eq!(selected.id, AssetId::new("B"));
    assert_eq!(store.current().unwrap().id, AssetId::new("B"));
    // Order is unaffected by selection.
    assert_eq!(store.ids(), vec![AssetId::new("A"), AssetId::new("B")]);
}

/// Selecting an unknown id fails and keeps the current asset.
#[tokio::test]
async fn select_unknown_asset_is_not_found() {
    let fake = FakeService::new();
    let mut store = AssetStore::new(fake.clone());
    store.upload(vec![png("A.png")]).await.unwrap();

    let err = store.select(&AssetId::new("Z")).unwrap_err();
    assert_matches!(err, SessionError::NotFound { entity: "Asset", ref id } if id == "Z");
    assert_eq!(store.current().unwrap().id, AssetId::new("A"));
}

// ---------------------------------------------------------------------------
// Background pictures
// ---------------------------------------------------------------------------

/// Background pictures are kept out of the exportable sequence.
#[tokio::test]
async fn background_upload_is_not_an_exportable_asset() {
    let fake = FakeService::new();
    let mut store = AssetStore::new(fake.clone());
    store.upload(vec![png("A.png")]).await.unwrap();

    let bg = store.upload_background(png("beach.jpg")).await.unwrap();

    assert_eq!(bg.id, AssetId::new("beach"));
    assert_eq!(store.ids(), vec![AssetId::new("A")]);
    assert_eq!(store.backgrounds().len(), 1);
    assert_eq!(store.current().unwrap().id, AssetId::new("A"));
}
