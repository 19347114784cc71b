//! Integration tests for the preview driver task, run on a paused clock.
//!
//! Tests cover debouncing, cancellation of outstanding requests, the
//! staleness guard for seeded renderings, and swallowed failures.

mod common;

use std::time::Duration;

use common::{preview_url, FakeService};
use cutout_core::asset::AssetId;
use cutout_core::options::{EditOptions, OptionsEdit, OptionsModel};
use cutout_service::data_url::DataUrl;
use cutout_session::config::PreviewConfig;
use cutout_session::preview::{PreviewHandle, PreviewKey, PreviewOrchestrator};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn key(asset: &str, blur: i64) -> PreviewKey {
    let mut model = OptionsModel::default();
    model.set([OptionsEdit::BlurBackground(blur)]);
    PreviewKey::new(AssetId::new(asset), model.snapshot())
}

fn spawn(fake: &std::sync::Arc<FakeService>, timeout: Duration) -> PreviewHandle {
    let config = PreviewConfig {
        debounce: Duration::from_millis(150),
        timeout,
    };
    PreviewOrchestrator::spawn(fake.clone(), config, &CancellationToken::new())
}

fn latest_image(handle: &PreviewHandle) -> Option<String> {
    handle.latest().map(|p| p.image.as_str().to_string())
}

// ---------------------------------------------------------------------------
// Debounce
// ---------------------------------------------------------------------------

/// A burst of edits faster than the quiet period yields exactly one
/// request, built from the last edit.
#[tokio::test(start_paused = true)]
async fn burst_of_edits_sends_one_request_for_last_state() {
    let fake = FakeService::new();
    let mut handle = spawn(&fake, Duration::from_secs(10));

    for blur in [1, 2, 3, 4, 5] {
        handle.notify(Some(key("A", blur)));
        sleep(Duration::from_millis(50)).await;
    }
    sleep(Duration::from_secs(1)).await;

    let sent = fake.previews();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].file_id, "A");
    assert_eq!(sent[0].options.blur_background, 5);
    assert!(sent[0].fast);
    assert_eq!(latest_image(&handle), Some(preview_url("A", 5)));

    let stats = handle.shutdown().await.unwrap();
    assert_eq!((stats.sent, stats.applied), (1, 1));
}

/// Nothing is sent before the quiet period has elapsed.
#[tokio::test(start_paused = true)]
async fn request_waits_for_quiet_period() {
    let fake = FakeService::new();
    let handle = spawn(&fake, Duration::from_secs(10));

    handle.notify(Some(key("A", 1)));
    sleep(Duration::from_millis(100)).await;
    assert!(fake.previews().is_empty());

    sleep(Duration::from_millis(100)).await;
    assert_eq!(fake.previews().len(), 1);
}

/// Re-reporting the pair that is already shown does not trigger a request.
#[tokio::test(start_paused = true)]
async fn unchanged_pair_is_not_requested_again() {
    let fake = FakeService::new();
    let handle = spawn(&fake, Duration::from_secs(10));

    handle.notify(Some(key("A", 1)));
    sleep(Duration::from_secs(1)).await;
    handle.notify(Some(key("A", 1)));
    sleep(Duration::from_secs(1)).await;

    assert_eq!(fake.previews().len(), 1);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// An edit during a slow request cancels it; only the newer rendering is
/// ever shown.
#[tokio::test(start_paused = true)]
async fn edit_during_flight_cancels_previous_request() {
    let fake = FakeService::new();
    fake.set_preview_delay(Duration::from_millis(500));
    let mut handle = spawn(&fake, Duration::from_secs(10));
    let mut updates = handle.subscribe();

    handle.notify(Some(key("A", 1)));
    // In flight from 150ms until 650ms.
    sleep(Duration::from_millis(300)).await;
    handle.notify(Some(key("A", 2)));

    updates.changed().await.unwrap();
    let shown = updates.borrow_and_update().clone().unwrap();
    assert_eq!(shown.key, key("A", 2));
    assert_eq!(shown.image.as_str(), preview_url("A", 2));

    sleep(Duration::from_secs(2)).await;
    assert_eq!(fake.previews().len(), 2);
    assert_eq!(latest_image(&handle), Some(preview_url("A", 2)));

    let stats = handle.shutdown().await.unwrap();
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.applied, 1);
}

/// A response that becomes ready together with a newer edit is never
/// shown; the edit wins and its own rendering follows.
#[tokio::test(start_paused = true)]
async fn response_released_after_newer_edit_is_not_applied() {
    let fake = FakeService::new();
    fake.gate_previews();
    let mut handle = spawn(&fake, Duration::from_secs(10));

    handle.notify(Some(key("A", 1)));
    sleep(Duration::from_millis(200)).await;
    assert_eq!(fake.previews().len(), 1);

    handle.notify(Some(key("A", 2)));
    fake.release_previews(1);
    sleep(Duration::from_millis(10)).await;
    assert!(handle.latest().is_none());

    fake.release_previews(1);
    sleep(Duration::from_secs(1)).await;
    assert_eq!(fake.previews().len(), 2);
    assert_eq!(latest_image(&handle), Some(preview_url("A", 2)));

    let stats = handle.shutdown().await.unwrap();
    assert_eq!((stats.cancelled, stats.applied), (1, 1));
}

/// Clearing the selection cancels the outstanding request and nothing is
/// shown.
#[tokio::test(start_paused = true)]
async fn clearing_selection_cancels_request() {
    let fake = FakeService::new();
    fake.set_preview_delay(Duration::from_millis(500));
    let handle = spawn(&fake, Duration::from_secs(10));

    handle.notify(Some(key("A", 1)));
    sleep(Duration::from_millis(300)).await;
    handle.notify(None);
    sleep(Duration::from_secs(2)).await;

    assert_eq!(fake.previews().len(), 1);
    assert!(handle.latest().is_none());
}

// ---------------------------------------------------------------------------
// Seeded renderings
// ---------------------------------------------------------------------------

/// A seed for the current pair is shown and replaces the pending request.
#[tokio::test(start_paused = true)]
async fn matching_seed_is_applied_without_request() {
    let fake = FakeService::new();
    let handle = spawn(&fake, Duration::from_secs(10));
    let current = PreviewKey::new(AssetId::new("A"), EditOptions::default());

    handle.notify(Some(current.clone()));
    handle.seed(current, DataUrl::new("data:image/png;base64,SEED"));
    sleep(Duration::from_secs(1)).await;

    assert_eq!(latest_image(&handle).as_deref(), Some("data:image/png;base64,SEED"));
    assert!(fake.previews().is_empty());
}

/// A seed for a pair that is no longer current is dropped.
#[tokio::test(start_paused = true)]
async fn stale_seed_is_discarded() {
    let fake = FakeService::new();
    let handle = spawn(&fake, Duration::from_secs(10));

    handle.notify(Some(key("A", 7)));
    handle.seed(
        PreviewKey::new(AssetId::new("A"), EditOptions::default()),
        DataUrl::new("data:image/png;base64,SEED"),
    );
    sleep(Duration::from_secs(1)).await;

    assert_eq!(latest_image(&handle), Some(preview_url("A", 7)));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

/// A failed preview is swallowed and the next edit still renders.
#[tokio::test(start_paused = true)]
async fn failure_is_swallowed_and_does_not_block() {
    let fake = FakeService::new();
    fake.set_fail_previews(true);
    let mut handle = spawn(&fake, Duration::from_secs(10));

    handle.notify(Some(key("A", 1)));
    sleep(Duration::from_secs(1)).await;
    assert!(handle.latest().is_none());

    fake.set_fail_previews(false);
    handle.notify(Some(key("A", 2)));
    sleep(Duration::from_secs(1)).await;
    assert_eq!(latest_image(&handle), Some(preview_url("A", 2)));

    let stats = handle.shutdown().await.unwrap();
    assert_eq!(stats.failed, 1);
}

/// A request exceeding the timeout is abandoned as a failure.
#[tokio::test(start_paused = true)]
async fn slow_preview_times_out() {
    let fake = FakeService::new();
    fake.set_preview_delay(Duration::from_secs(30));
    let mut handle = spawn(&fake, Duration::from_secs(2));

    handle.notify(Some(key("A", 1)));
    sleep(Duration::from_secs(5)).await;

    assert!(handle.latest().is_none());
    let stats = handle.shutdown().await.unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.applied, 0);
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Cancelling the parent token stops the driver.
#[tokio::test(start_paused = true)]
async fn parent_cancellation_stops_driver() {
    let fake = FakeService::new();
    let parent = CancellationToken::new();
    let mut handle = PreviewOrchestrator::spawn(fake.clone(), PreviewConfig::default(), &parent);

    parent.cancel();
    handle.notify(Some(key("A", 1)));
    sleep(Duration::from_secs(1)).await;

    assert!(fake.previews().is_empty());
    assert!(handle.shutdown().await.is_some());
}
