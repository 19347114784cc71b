//! Live preview pipeline.
//!
//! [`PreviewScheduler`] is a pure state machine over simulated time: it
//! debounces edits, hands out at most one [`PreviewRequest`] at a time and
//! decides whether a finished request may be shown. [`PreviewOrchestrator`]
//! drives it from a tokio task, performs the network calls and publishes
//! accepted renderings on a `watch` channel.
//!
//! ```text
//! Idle ──edit──▶ Scheduled ──quiet period──▶ InFlight ──done──▶ Idle
//!                    ▲                          │
//!                    └──────edit (cancel)───────┘
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use cutout_core::asset::AssetId;
use cutout_core::options::EditOptions;
use cutout_service::data_url::DataUrl;
use cutout_service::messages::{PreviewPayload, WireOptions};
use cutout_service::ProcessingService;
use futures::future::OptionFuture;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::PreviewConfig;
use crate::error::PreviewError;

/// The (asset, options) pair a preview is rendered from.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewKey {
    pub asset_id: AssetId,
    pub options: EditOptions,
}

impl PreviewKey {
    pub fn new(asset_id: AssetId, options: EditOptions) -> Self {
        Self { asset_id, options }
    }
}

/// One preview round trip handed out by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewRequest {
    pub ticket: u64,
    pub key: PreviewKey,
    pub fast: bool,
}

impl PreviewRequest {
    pub fn payload(&self) -> PreviewPayload {
        PreviewPayload {
            file_id: self.key.asset_id.to_string(),
            options: WireOptions::from(&self.key.options),
            fast: self.fast,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewState {
    Idle,
    Scheduled { deadline: Instant },
    InFlight { ticket: u64 },
}

/// What a call to [`PreviewScheduler::notify`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// The pair did not change; nothing to do.
    Unchanged,
    /// The quiet timer was (re)armed.
    Scheduled { cancelled: Option<u64> },
    /// There is nothing to preview any more.
    Cleared { cancelled: Option<u64> },
}

impl EditOutcome {
    /// Ticket of the in-flight request that must be aborted, if any.
    pub fn cancelled(self) -> Option<u64> {
        match self {
            Self::Unchanged => None,
            Self::Scheduled { cancelled } | Self::Cleared { cancelled } => cancelled,
        }
    }
}

/// Counters kept over the lifetime of a scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewStats {
    pub sent: u64,
    pub cancelled: u64,
    pub applied: u64,
    pub discarded: u64,
    pub failed: u64,
}

/// Debounce + latest-wins state machine.
///
/// The scheduler never sleeps or performs I/O; callers pass `now` in and
/// read [`deadline`](Self::deadline) back out.
#[derive(Debug)]
pub struct PreviewScheduler {
    debounce: Duration,
    state: PreviewState,
    current: Option<PreviewKey>,
    next_ticket: u64,
    stats: PreviewStats,
}

impl PreviewScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            state: PreviewState::Idle,
            current: None,
            next_ticket: 1,
            stats: PreviewStats::default(),
        }
    }

    pub fn state(&self) -> PreviewState {
        self.state
    }

    pub fn current(&self) -> Option<&PreviewKey> {
        self.current.as_ref()
    }

    pub fn stats(&self) -> PreviewStats {
        self.stats
    }

    /// When the armed timer expires, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            PreviewState::Scheduled { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Record the latest pair. Every change restarts the quiet period and
    /// cancels an outstanding request.
    pub fn notify(&mut self, key: Option<PreviewKey>, now: Instant) -> EditOutcome {
        if key == self.current {
            return EditOutcome::Unchanged;
        }
        self.current = key;

        let cancelled = match self.state {
            PreviewState::InFlight { ticket } => {
                self.stats.cancelled += 1;
                Some(ticket)
            }
            _ => None,
        };

        if self.current.is_some() {
            self.state = PreviewState::Scheduled {
                deadline: now + self.debounce,
            };
            EditOutcome::Scheduled { cancelled }
        } else {
            self.state = PreviewState::Idle;
            EditOutcome::Cleared { cancelled }
        }
    }

    /// Hand out the request for the current pair once the quiet period
    /// has elapsed.
    pub fn fire(&mut self, now: Instant) -> Option<PreviewRequest> {
        let PreviewState::Scheduled { deadline } = self.state else {
            return None;
        };
        if now < deadline {
            return None;
        }
        let Some(key) = self.current.clone() else {
            self.state = PreviewState::Idle;
            return None;
        };

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.state = PreviewState::InFlight { ticket };
        self.stats.sent += 1;
        Some(PreviewRequest {
            ticket,
            key,
            fast: true,
        })
    }

    /// Settle request `ticket`. Returns the rendering only when it is for
    /// the outstanding request and its pair is still current.
    pub fn complete<T>(
        &mut self,
        ticket: u64,
        key: &PreviewKey,
        result: Result<T, PreviewError>,
    ) -> Option<T> {
        if self.state != (PreviewState::InFlight { ticket }) {
            tracing::debug!(ticket, "Discarding superseded preview");
            self.stats.discarded += 1;
            return None;
        }
        self.state = PreviewState::Idle;

        match result {
            Err(e) => {
                tracing::warn!(ticket, error = %e, "Preview request failed");
                self.stats.failed += 1;
                None
            }
            Ok(_) if self.current.as_ref() != Some(key) => {
                tracing::debug!(ticket, "Discarding stale preview");
                self.stats.discarded += 1;
                None
            }
            Ok(rendered) => {
                self.stats.applied += 1;
                Some(rendered)
            }
        }
    }

    /// Offer a rendering that was produced elsewhere (the upload response).
    ///
    /// It is accepted only if `key` is the current pair, in which case a
    /// pending timer for that pair is no longer needed.
    pub fn seed<T>(&mut self, key: &PreviewKey, rendered: T) -> Option<T> {
        if self.current.as_ref() != Some(key) {
            self.stats.discarded += 1;
            return None;
        }
        if matches!(self.state, PreviewState::Scheduled { .. }) {
            self.state = PreviewState::Idle;
        }
        self.stats.applied += 1;
        Some(rendered)
    }
}

/* -------------------------------------------------------------------------- */

/// A preview that passed the staleness guard.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPreview {
    pub key: PreviewKey,
    pub image: DataUrl,
}

#[derive(Debug)]
enum PreviewCommand {
    Notify(Option<PreviewKey>),
    Seed(PreviewKey, DataUrl),
}

struct Completed {
    ticket: u64,
    key: PreviewKey,
    result: Result<DataUrl, PreviewError>,
}

type InFlight = Pin<Box<dyn Future<Output = Completed> + Send>>;

/// Spawns the preview driver task.
pub struct PreviewOrchestrator;

impl PreviewOrchestrator {
    /// Start the driver. It stops when `parent` is cancelled, when
    /// [`PreviewHandle::shutdown`] is called, or when every handle is dropped.
    pub fn spawn(
        service: Arc<dyn ProcessingService>,
        config: PreviewConfig,
        parent: &CancellationToken,
    ) -> PreviewHandle {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (rendered_tx, rendered) = watch::channel(None);
        let cancel = parent.child_token();

        let driver = Driver {
            service,
            timeout: config.timeout,
            scheduler: PreviewScheduler::new(config.debounce),
            rendered: rendered_tx,
        };
        let task = tokio::spawn(driver.run(command_rx, cancel.clone()));

        PreviewHandle {
            commands,
            rendered,
            cancel,
            task: Some(task),
        }
    }
}

/// Client side of a running [`PreviewOrchestrator`].
pub struct PreviewHandle {
    commands: mpsc::UnboundedSender<PreviewCommand>,
    rendered: watch::Receiver<Option<Arc<RenderedPreview>>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<PreviewStats>>,
}

impl PreviewHandle {
    /// Report the latest (asset, options) pair, or `None` when no asset
    /// is selected.
    pub fn notify(&self, key: Option<PreviewKey>) {
        let _ = self.commands.send(PreviewCommand::Notify(key));
    }

    /// Offer a rendering obtained outside the pipeline.
    pub fn seed(&self, key: PreviewKey, image: DataUrl) {
        let _ = self.commands.send(PreviewCommand::Seed(key, image));
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<RenderedPreview>>> {
        self.rendered.clone()
    }

    /// The most recently accepted rendering.
    pub fn latest(&self) -> Option<Arc<RenderedPreview>> {
        self.rendered.borrow().clone()
    }

    /// Stop the driver, aborting any outstanding request, and return its
    /// counters. Waits up to 5 seconds for the task to finish.
    pub async fn shutdown(&mut self) -> Option<PreviewStats> {
        self.cancel.cancel();
        let task = self.task.take()?;
        match tokio::time::timeout(Duration::from_secs(5), task).await {
            Ok(Ok(stats)) => Some(stats),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Preview task panicked");
                None
            }
            Err(_) => {
                tracing::warn!("Preview task did not stop within timeout");
                None
            }
        }
    }
}

struct Driver {
    service: Arc<dyn ProcessingService>,
    timeout: Duration,
    scheduler: PreviewScheduler,
    rendered: watch::Sender<Option<Arc<RenderedPreview>>>,
}

impl Driver {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<PreviewCommand>,
        cancel: CancellationToken,
    ) -> PreviewStats {
        // Dropping this future aborts the HTTP request.
        let mut in_flight: Option<InFlight> = None;

        loop {
            let deadline = self.scheduler.deadline();

            // Queued commands go before a ready completion so the staleness
            // check always sees the newest pair.
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                command = commands.recv() => {
                    let Some(command) = command else { break };
                    match command {
                        PreviewCommand::Notify(key) => {
                            let outcome = self.scheduler.notify(key, Instant::now());
                            if let Some(ticket) = outcome.cancelled() {
                                tracing::debug!(ticket, "Cancelling in-flight preview");
                                in_flight = None;
                            }
                        }
                        PreviewCommand::Seed(key, image) => {
                            if let Some(image) = self.scheduler.seed(&key, image) {
                                self.publish(key, image);
                            }
                        }
                    }
                }

                Some(done) = OptionFuture::from(in_flight.as_mut()), if in_flight.is_some() => {
                    in_flight = None;
                    if let Some(image) = self.scheduler.complete(done.ticket, &done.key, done.result) {
                        self.publish(done.key, image);
                    }
                }

                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() =>
                {
                    if let Some(request) = self.scheduler.fire(Instant::now()) {
                        tracing::debug!(
                            ticket = request.ticket,
                            asset_id = %request.key.asset_id,
                            "Sending preview request",
                        );
                        in_flight = Some(self.start(request));
                    }
                }
            }
        }

        let stats = self.scheduler.stats();
        tracing::info!(
            sent = stats.sent,
            applied = stats.applied,
            cancelled = stats.cancelled,
            discarded = stats.discarded,
            failed = stats.failed,
            "Preview pipeline stopped",
        );
        stats
    }

    // ---- private helpers ----

    fn start(&self, request: PreviewRequest) -> InFlight {
        let service = Arc::clone(&self.service);
        let timeout = self.timeout;
        let payload = request.payload();

        Box::pin(async move {
            let result = match tokio::time::timeout(timeout, service.preview(&payload)).await {
                Ok(Ok(response)) => Ok(DataUrl::new(response.preview)),
                Ok(Err(e)) => Err(PreviewError::Service(e)),
                Err(_) => Err(PreviewError::Timeout(timeout)),
            };
            Completed {
                ticket: request.ticket,
                key: request.key,
                result,
            }
        })
    }

    fn publish(&self, key: PreviewKey, image: DataUrl) {
        tracing::debug!(asset_id = %key.asset_id, "Preview updated");
        self.rendered
            .send_replace(Some(Arc::new(RenderedPreview { key, image })));
    }
}
