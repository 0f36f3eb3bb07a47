//! Progress reporting for sync runs
//!
//! The tracker owns the UI-facing [`SyncProgressState`], persists it so a
//! relaunched app can show what was happening, and pushes every change to
//! subscribers as [`SyncEvent`]s.

use chrono::{Duration, Utc};
use log::{debug, warn};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::models::{SyncKind, SyncProgressState};
use crate::storage::{KeyValueStore, get_json, put_json};

const PROGRESS_STATE_KEY: &str = "sync.progress_state";

/// Default lifetime of persisted progress state
pub const DEFAULT_PROGRESS_TTL_HOURS: i64 = 1;

/// Smallest fraction change that is published on its own
const MIN_PROGRESS_STEP: f64 = 0.01;

/// Change notifications for progress subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Started { kind: SyncKind },
    Progress(SyncProgressState),
    Finished {
        kind: SyncKind,
        success: bool,
        message: String,
    },
    /// The host revoked extended execution time
    ExecutionExpired,
    Reset,
}

/// Platform hook that keeps the process alive while a sync runs
///
/// On mobile this maps to a background task request; desktop hosts can
/// use [`NoopExecutionHost`].
pub trait ExecutionHost: Send + Sync {
    /// Ask for extended execution time, returning a handle for `end`, or
    /// `None` when the host refuses
    fn begin(&self, reason: &str) -> Option<u64>;

    /// Give back time obtained from `begin`
    fn end(&self, handle: u64);
}

/// Host that never needs extended execution
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExecutionHost;

impl ExecutionHost for NoopExecutionHost {
    fn begin(&self, _reason: &str) -> Option<u64> {
        Some(0)
    }

    fn end(&self, _handle: u64) {}
}

/// Extended execution time held for the life of the guard
pub struct ExecutionGrant {
    host: Arc<dyn ExecutionHost>,
    handle: u64,
}

impl ExecutionGrant {
    pub fn acquire(host: Arc<dyn ExecutionHost>, reason: &str) -> Option<Self> {
        let handle = host.begin(reason)?;
        Some(Self { host, handle })
    }
}

impl Drop for ExecutionGrant {
    fn drop(&mut self) {
        self.host.end(self.handle);
    }
}

#[derive(Default)]
struct TrackerState {
    current: Option<SyncProgressState>,
    last_published: f64,
    grant: Option<ExecutionGrant>,
}

/// Coalesces, persists and broadcasts sync progress
pub struct ProgressTracker {
    state: Mutex<TrackerState>,
    subscribers: Mutex<Vec<Sender<SyncEvent>>>,
    store: Arc<dyn KeyValueStore>,
    host: Arc<dyn ExecutionHost>,
    ttl: Duration,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn KeyValueStore>, host: Arc<dyn ExecutionHost>) -> Self {
        Self::with_ttl(store, host, Duration::hours(DEFAULT_PROGRESS_TTL_HOURS))
    }

    pub fn with_ttl(
        store: Arc<dyn KeyValueStore>,
        host: Arc<dyn ExecutionHost>,
        ttl: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            subscribers: Mutex::new(Vec::new()),
            store,
            host,
            ttl,
        }
    }

    /// Receive every future progress event
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Current in-memory state, including the outcome of the last run
    pub fn snapshot(&self) -> Option<SyncProgressState> {
        self.state.lock().unwrap().current.clone()
    }

    pub fn is_syncing(&self) -> bool {
        self.snapshot().is_some_and(|s| s.is_syncing)
    }

    /// Begin tracking a run and request extended execution time
    pub fn start(&self, kind: SyncKind) {
        let progress = SyncProgressState::started(kind);
        {
            let mut state = self.state.lock().unwrap();
            state.grant = ExecutionGrant::acquire(self.host.clone(), "health sync");
            if state.grant.is_none() {
                warn!("Extended execution refused; {} sync may be suspended", kind);
            }
            state.current = Some(progress.clone());
            state.last_published = 0.0;
        }
        self.persist(&progress);
        self.publish(SyncEvent::Started { kind });
        self.publish(SyncEvent::Progress(progress));
    }

    /// Record progress; published when the fraction advanced by at least
    /// 1% or the message or metric changed
    pub fn update(&self, done: usize, total: usize, message: &str, current_metric: &str) {
        let progress = {
            let mut state = self.state.lock().unwrap();
            let last_published = state.last_published;
            let Some(current) = state.current.as_mut() else {
                return;
            };

            let fraction = if total == 0 {
                0.0
            } else {
                (done as f64 / total as f64).clamp(0.0, 1.0)
            };
            let changed_text = current.message != message || current.current_metric != current_metric;

            current.progress = fraction;
            current.synced_count = done;
            current.total_count = total;
            current.message = message.to_string();
            current.current_metric = current_metric.to_string();

            if !changed_text && fraction - last_published < MIN_PROGRESS_STEP && done < total {
                return;
            }
            let progress = current.clone();
            state.last_published = fraction;
            progress
        };

        self.persist(&progress);
        self.publish(SyncEvent::Progress(progress));
    }

    /// Finish the run, release execution time and clear persisted state
    ///
    /// The final state stays available through [`snapshot`](Self::snapshot)
    /// so a failure message can still be shown.
    pub fn complete(&self, success: bool, message: &str) {
        let finished = {
            let mut state = self.state.lock().unwrap();
            state.grant = None;
            state.current.as_mut().map(|current| {
                current.is_syncing = false;
                current.message = message.to_string();
                if success {
                    current.progress = 1.0;
                    current.last_error = None;
                } else {
                    current.last_error = Some(message.to_string());
                }
                current.clone()
            })
        };

        self.clear_persisted();
        if let Some(finished) = finished {
            debug!("{} sync finished: {}", finished.sync_kind, message);
            let kind = finished.sync_kind;
            self.publish(SyncEvent::Progress(finished));
            self.publish(SyncEvent::Finished {
                kind,
                success,
                message: message.to_string(),
            });
        }
    }

    /// Forget all progress, in memory and persisted
    pub fn reset(&self) {
        *self.state.lock().unwrap() = TrackerState::default();
        self.clear_persisted();
        self.publish(SyncEvent::Reset);
    }

    /// The host revoked extended execution; drop the grant without ending
    /// the run
    pub fn expire(&self) {
        let had_grant = self.state.lock().unwrap().grant.take().is_some();
        if had_grant {
            warn!("Extended execution time expired during sync");
            self.publish(SyncEvent::ExecutionExpired);
        }
    }

    /// Progress persisted by a previous process, if still fresh
    ///
    /// Stale state is deleted.
    pub fn load_persisted(&self) -> Option<SyncProgressState> {
        let progress: SyncProgressState = match get_json(self.store.as_ref(), PROGRESS_STATE_KEY)
        {
            Ok(Some(progress)) => progress,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to load sync progress: {:#}", e);
                return None;
            }
        };

        if progress.is_stale(Utc::now(), self.ttl) {
            self.clear_persisted();
            return None;
        }
        Some(progress)
    }

    fn persist(&self, progress: &SyncProgressState) {
        if let Err(e) = put_json(self.store.as_ref(), PROGRESS_STATE_KEY, progress) {
            warn!("Failed to persist sync progress: {:#}", e);
        }
    }

    fn clear_persisted(&self) {
        if let Err(e) = self.store.delete(PROGRESS_STATE_KEY) {
            warn!("Failed to clear sync progress: {:#}", e);
        }
    }

    fn publish(&self, event: SyncEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
