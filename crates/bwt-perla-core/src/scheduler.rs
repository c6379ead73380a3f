//! Adaptive poll scheduler.
//!
//! One scheduler drives one device entry. Each cycle fetches a payload,
//! decodes it, publishes the snapshot and derives the next interval from the
//! decoded flow. Polling is suspended while nobody is subscribed and stops
//! for good on unload or on an authentication failure.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::decoder::Decoder;
use crate::error::{PerlaError, Result};
use crate::interval::PollInterval;
use crate::model::DeviceModel;
use crate::snapshot::Snapshot;
use crate::transport::Transport;

/// Outcome of the most recent refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateStatus {
    /// No refresh finished yet.
    Pending,
    /// The last refresh produced a snapshot.
    Available,
    /// The last refresh failed; polling continues at the same interval.
    Unavailable(String),
    /// The device rejected the code; polling has stopped.
    AuthFailed(String),
}

/// State published to subscribers after every refresh.
#[derive(Debug, Clone)]
pub struct PollState {
    /// Most recent successful snapshot, kept across failed refreshes.
    pub snapshot: Option<Arc<Snapshot>>,
    pub status: UpdateStatus,
    /// Interval until the next refresh.
    pub interval: PollInterval,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl PollState {
    fn initial() -> Self {
        Self {
            snapshot: None,
            status: UpdateStatus::Pending,
            interval: PollInterval::max(),
            refreshed_at: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == UpdateStatus::Available
    }
}

/// Consumer notified with every published state.
pub trait SnapshotSubscriber: Send {
    fn on_update(&mut self, state: &PollState);
}

/// Shared between the scheduler task and its handles.
struct Shared {
    state: watch::Sender<PollState>,
    /// Signalled when a subscriber attaches.
    subscribed: Notify,
    /// Signalled to cut the current wait short.
    refresh_requested: Notify,
}

/// Receives published poll states.
///
/// While at least one subscription is alive the scheduler keeps polling.
pub struct Subscription {
    rx: watch::Receiver<PollState>,
}

impl Subscription {
    /// The latest published state.
    pub fn current(&self) -> PollState {
        self.rx.borrow().clone()
    }

    /// Wait for the next published state. `None` once the scheduler is gone.
    pub async fn changed(&mut self) -> Option<PollState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Feed every published state into `subscriber` until the scheduler stops.
    pub async fn forward_to<S: SnapshotSubscriber>(mut self, mut subscriber: S) -> S {
        while let Some(state) = self.changed().await {
            subscriber.on_update(&state);
        }
        subscriber
    }
}

/// Polls one device with an adaptive interval.
pub struct PollScheduler {
    model: DeviceModel,
    transport: Arc<dyn Transport>,
    decoder: Decoder,
    refresh_timeout: Duration,
    interval: PollInterval,
    shared: Arc<Shared>,
}

impl PollScheduler {
    pub fn new(
        transport: Arc<dyn Transport>,
        decoder: Decoder,
        refresh_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(PollState::initial());
        Self {
            model: transport.model(),
            transport,
            decoder,
            refresh_timeout,
            interval: PollInterval::max(),
            shared: Arc::new(Shared {
                state,
                subscribed: Notify::new(),
                refresh_requested: Notify::new(),
            }),
        }
    }

    pub fn model(&self) -> DeviceModel {
        self.model
    }

    pub fn interval(&self) -> PollInterval {
        self.interval
    }

    pub fn current(&self) -> PollState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> Subscription {
        subscribe(&self.shared)
    }

    /// Run one fetch + decode cycle under the refresh timeout.
    ///
    /// On success the snapshot replaces the previous one and the interval is
    /// recomputed from its flow. On failure the previous snapshot and the
    /// interval are kept and the failure is published.
    pub async fn refresh(&mut self) -> Result<Arc<Snapshot>> {
        let cycle = async {
            let raw = self.transport.fetch().await?;
            self.decoder.decode(raw, self.model)
        };
        let outcome = match tokio::time::timeout(self.refresh_timeout, cycle).await {
            Ok(result) => result,
            Err(_) => Err(PerlaError::Timeout(self.refresh_timeout.as_secs())),
        };

        match outcome {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                let flow = snapshot.current_flow();
                self.interval = self.interval.next(flow);
                debug!(
                    model = %self.model,
                    flow,
                    interval_secs = self.interval.as_duration().as_secs(),
                    "Refreshed snapshot"
                );
                self.publish(Some(snapshot.clone()), UpdateStatus::Available);
                Ok(snapshot)
            }
            Err(e) => {
                let status = if e.is_auth() {
                    error!(model = %self.model, "Authentication failed: {}", e);
                    UpdateStatus::AuthFailed(e.to_string())
                } else {
                    if e.is_retryable() {
                        warn!(model = %self.model, "Refresh failed: {}", e);
                    } else {
                        error!(model = %self.model, "Refresh failed: {}", e);
                    }
                    UpdateStatus::Unavailable(e.to_string())
                };
                let previous = self.shared.state.borrow().snapshot.clone();
                self.publish(previous, status);
                Err(e)
            }
        }
    }

    fn publish(&self, snapshot: Option<Arc<Snapshot>>, status: UpdateStatus) {
        self.shared.state.send_replace(PollState {
            snapshot,
            status,
            interval: self.interval,
            refreshed_at: Some(Utc::now()),
        });
    }

    /// Start polling in a background task.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = self.shared.clone();
        let model = self.model;
        let task = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle {
            model,
            shared,
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(model = %self.model, "Polling started");

        // A snapshot from the setup refresh counts as the first cycle.
        let mut next_poll = if self.current().snapshot.is_some() {
            Instant::now() + self.interval.as_duration()
        } else {
            Instant::now()
        };

        'polling: loop {
            while self.shared.state.receiver_count() == 0 {
                debug!(model = %self.model, "No subscribers, polling suspended");
                tokio::select! {
                    _ = self.shared.subscribed.notified() => {}
                    _ = shutdown.changed() => break 'polling,
                }
            }

            tokio::select! {
                _ = tokio::time::sleep_until(next_poll) => {}
                _ = self.shared.refresh_requested.notified() => {}
                _ = shutdown.changed() => break 'polling,
            }

            // Subscribers may have left while waiting.
            if self.shared.state.receiver_count() == 0 {
                continue;
            }

            let outcome = tokio::select! {
                result = self.refresh() => result,
                _ = shutdown.changed() => break 'polling,
            };
            if let Err(e) = outcome {
                if e.is_auth() {
                    break 'polling;
                }
            }
            next_poll = Instant::now() + self.interval.as_duration();
        }

        self.transport.close().await;
        info!(model = %self.model, "Polling stopped");
    }
}

fn subscribe(shared: &Shared) -> Subscription {
    let rx = shared.state.subscribe();
    shared.subscribed.notify_one();
    Subscription { rx }
}

/// Handle to a running scheduler.
pub struct SchedulerHandle {
    model: DeviceModel,
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn model(&self) -> DeviceModel {
        self.model
    }

    pub fn subscribe(&self) -> Subscription {
        subscribe(&self.shared)
    }

    pub fn current(&self) -> PollState {
        self.shared.state.borrow().clone()
    }

    /// Refresh now instead of waiting for the interval.
    pub fn request_refresh(&self) {
        self.shared.refresh_requested.notify_one();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop polling, cancel any in-flight fetch and release the transport.
    pub async fn unload(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| PerlaError::Other(anyhow::Error::new(e)))
    }
}
