//! Sync orchestration
//!
//! One run: plan windows, extract every target in parallel, persist a
//! resumable snapshot, upload it in chunks, then record completion.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use uuid::Uuid;

use super::gap::{GapAnalyzer, SyncStrategy, SyncWindow, decide_strategy};
use super::progress::{ExecutionHost, NoopExecutionHost, ProgressTracker, SyncEvent};
use super::timing::SyncTrigger;
use super::uploader::{ChunkedUploader, UploadStats};
use super::CancellationToken;
use crate::backend::VitalsBackend;
use crate::config::EngineConfig;
use crate::error::SyncError;
use crate::models::{
    BackendTimestamps, ExtractionTarget, Reading, ResumableSyncState, SyncKind, SyncProgressState,
};
use crate::source::{HealthSource, SourceExtractor};
use crate::storage::{KeyValueStore, ResumableStateStore, SyncPersistence};

/// Fixed window of a last-24-hours sync
const LAST_24_HOURS: i64 = 24;

/// What to run and why
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRequest {
    pub kind: SyncKind,
    pub trigger: SyncTrigger,
}

impl SyncRequest {
    pub fn new(kind: SyncKind, trigger: SyncTrigger) -> Self {
        Self { kind, trigger }
    }

    pub fn manual(kind: SyncKind) -> Self {
        Self::new(kind, SyncTrigger::Manual)
    }
}

/// How a successful run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Completed,
    /// Extraction found nothing new
    NothingToSync,
    /// Extraction failed for some targets and no target returned data;
    /// completion is not recorded
    SourceUnavailable,
}

/// Statistics from a finished run
#[derive(Debug, Clone)]
pub struct SyncResult {
    pub kind: SyncKind,
    /// `None` for fixed windows and for the fallback window
    pub strategy: Option<SyncStrategy>,
    /// Backend timestamps were unavailable and the short window was used
    pub used_fallback_window: bool,
    /// Whether this run continued a persisted session
    pub resumed: bool,
    pub readings_fetched: usize,
    /// Readings per target, in fan-out order
    pub per_target: Vec<(ExtractionTarget, usize)>,
    /// Targets whose extraction failed and contributed nothing
    pub failed_targets: Vec<ExtractionTarget>,
    pub chunks_submitted: usize,
    pub session_id: Option<Uuid>,
    pub status: SyncStatus,
    pub duration_ms: u64,
}

impl SyncResult {
    fn new(kind: SyncKind) -> Self {
        Self {
            kind,
            strategy: None,
            used_fallback_window: false,
            resumed: false,
            readings_fetched: 0,
            per_target: Vec::new(),
            failed_targets: Vec::new(),
            chunks_submitted: 0,
            session_id: None,
            status: SyncStatus::NothingToSync,
            duration_ms: 0,
        }
    }

    /// One-line outcome for progress display and logs
    pub fn summary(&self) -> String {
        match self.status {
            SyncStatus::NothingToSync => "Already up to date".to_string(),
            SyncStatus::SourceUnavailable => format!(
                "Health data unavailable for {} targets",
                self.failed_targets.len()
            ),
            SyncStatus::Completed => format!(
                "Synced {} readings in {} chunks",
                self.readings_fetched, self.chunks_submitted
            ),
        }
    }
}

/// Extraction output, fanned back in
struct Extraction {
    readings: Vec<Reading>,
    per_target: Vec<(ExtractionTarget, usize)>,
    failed_targets: Vec<ExtractionTarget>,
}

/// Windows for one run
struct Plan {
    strategy: Option<SyncStrategy>,
    used_fallback_window: bool,
    windows: Vec<(ExtractionTarget, SyncWindow)>,
}

impl Plan {
    /// Overall span across every target window
    fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = self.windows.iter().map(|(_, w)| w.start).min()?;
        let end = self.windows.iter().map(|(_, w)| w.end).max()?;
        Some((start, end))
    }
}

/// Releases the single-run flag when dropped
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Moves health readings from a [`HealthSource`] to a [`VitalsBackend`]
///
/// At most one run is active per engine. Runs block the calling thread;
/// extraction fans out over a dedicated rayon pool.
pub struct SyncEngine {
    extractor: SourceExtractor,
    backend: Arc<dyn VitalsBackend>,
    store: Arc<dyn KeyValueStore>,
    persistence: SyncPersistence,
    resumable: ResumableStateStore,
    progress: ProgressTracker,
    analyzer: GapAnalyzer,
    config: EngineConfig,
    pool: rayon::ThreadPool,
    running: AtomicBool,
    cancel: Mutex<CancellationToken>,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn HealthSource>,
        backend: Arc<dyn VitalsBackend>,
        store: Arc<dyn KeyValueStore>,
        config: EngineConfig,
    ) -> Result<Self> {
        let threads = ExtractionTarget::all()
            .len()
            .min(config.max_extraction_threads)
            .max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("vitals-extract-{i}"))
            .build()
            .context("Failed to build extraction thread pool")?;

        Ok(Self {
            extractor: SourceExtractor::new(source),
            backend,
            persistence: SyncPersistence::new(store.clone()),
            resumable: ResumableStateStore::with_ttl(store.clone(), config.resumable_ttl()),
            progress: ProgressTracker::with_ttl(
                store.clone(),
                Arc::new(NoopExecutionHost),
                config.progress_ttl(),
            ),
            store,
            analyzer: config.gap_analyzer(),
            config,
            pool,
            running: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
        })
    }

    /// Use `host` to request extended execution time during runs
    pub fn with_execution_host(mut self, host: Arc<dyn ExecutionHost>) -> Self {
        self.progress = ProgressTracker::with_ttl(self.store.clone(), host, self.config.progress_ttl());
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn persistence(&self) -> &SyncPersistence {
        &self.persistence
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Receive progress events of every future run
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        self.progress.subscribe()
    }

    /// Progress of the current or last run, falling back to what a
    /// previous process persisted
    pub fn progress(&self) -> Option<SyncProgressState> {
        self.progress
            .snapshot()
            .or_else(|| self.progress.load_persisted())
    }

    /// Persisted upload session awaiting [`resume`](Self::resume)
    pub fn resumable_state(&self) -> Option<ResumableSyncState> {
        self.resumable.load()
    }

    /// The host revoked extended execution time. The run continues
    /// without the grant.
    pub fn execution_expired(&self) {
        self.progress.expire();
    }

    /// Ask the active run to stop at its next query or chunk boundary
    pub fn cancel(&self) {
        info!("Cancelling sync");
        self.cancel.lock().unwrap().cancel();
    }

    /// Forget all sync bookkeeping: completion times, resumable session
    /// and progress
    pub fn reset(&self) -> Result<(), SyncError> {
        let _guard = self.begin()?;
        self.persistence.clear().map_err(SyncError::Persistence)?;
        self.resumable.clear().map_err(SyncError::Persistence)?;
        self.progress.reset();
        info!("Sync state reset");
        Ok(())
    }

    /// Run one sync
    pub fn run(&self, request: SyncRequest) -> Result<SyncResult, SyncError> {
        let _guard = self.begin()?;
        let kind = request.kind;

        if !request.trigger.bypasses_cooldown() {
            match self.persistence.cooldown_remaining(kind, self.config.cooldown_secs) {
                Ok(Some(remaining_secs)) => {
                    info!("Skipping {} sync: {}s of cooldown left", kind, remaining_secs);
                    return Err(SyncError::CoolingDown {
                        kind,
                        remaining_secs,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!("{}", SyncError::Persistence(e)),
            }
        }

        info!("Starting {} sync ({} trigger)", kind, request.trigger);
        let cancel = self.fresh_token();
        let started = Instant::now();
        self.progress.start(kind);

        let outcome = self.run_pipeline(kind, &cancel);
        self.finish(kind, outcome, started)
    }

    /// Continue the persisted upload session under its original session id,
    /// skipping chunks the backend already accepted
    pub fn resume(&self) -> Result<SyncResult, SyncError> {
        let _guard = self.begin()?;
        let state = self.resumable.load().ok_or(SyncError::NothingToResume)?;
        let kind = state.sync_kind;

        info!(
            "Resuming {} sync: {}/{} chunks already uploaded",
            kind,
            state.completed_chunks,
            state.total_chunks()
        );
        let cancel = self.fresh_token();
        let started = Instant::now();
        self.progress.start(kind);

        let mut result = SyncResult::new(kind);
        result.resumed = true;
        result.readings_fetched = state.pending_readings.len();

        let outcome = self.upload(state, &cancel).and_then(|stats| {
            result.session_id = Some(stats.session_id);
            result.chunks_submitted = stats.chunks_submitted;
            result.status = SyncStatus::Completed;
            self.trigger_aggregation();
            self.complete_upload(kind);
            Ok(result)
        });
        self.finish(kind, outcome, started)
    }

    fn begin(&self) -> Result<RunGuard<'_>, SyncError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| SyncError::AlreadyRunning)?;
        Ok(RunGuard(&self.running))
    }

    fn fresh_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock().unwrap() = token.clone();
        token
    }

    fn finish(
        &self,
        kind: SyncKind,
        outcome: Result<SyncResult, SyncError>,
        started: Instant,
    ) -> Result<SyncResult, SyncError> {
        match outcome {
            Ok(mut result) => {
                result.duration_ms = started.elapsed().as_millis() as u64;
                info!(
                    "{} sync finished in {}ms: {}",
                    kind,
                    result.duration_ms,
                    result.summary()
                );
                let success = result.status != SyncStatus::SourceUnavailable;
                self.progress.complete(success, &result.summary());
                Ok(result)
            }
            Err(SyncError::Cancelled) => {
                info!("{} sync cancelled", kind);
                self.progress.complete(false, "Sync cancelled");
                Err(SyncError::Cancelled)
            }
            Err(e) => {
                error!("{} sync failed: {}", kind, e);
                self.progress.complete(false, &e.to_string());
                Err(e)
            }
        }
    }

    fn run_pipeline(
        &self,
        kind: SyncKind,
        cancel: &CancellationToken,
    ) -> Result<SyncResult, SyncError> {
        let now = Utc::now();
        let plan = self.plan(kind, now);

        let mut result = SyncResult::new(kind);
        result.strategy = plan.strategy;
        result.used_fallback_window = plan.used_fallback_window;

        let extraction = self.extract_all(&plan, cancel);
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        result.readings_fetched = extraction.readings.len();
        result.per_target = extraction.per_target;
        result.failed_targets = extraction.failed_targets;

        if extraction.readings.is_empty() {
            if result.failed_targets.is_empty() {
                self.complete_upload(kind);
            } else {
                result.status = SyncStatus::SourceUnavailable;
            }
            return Ok(result);
        }

        let state = ResumableSyncState::new(
            kind,
            extraction.readings,
            plan.span(),
            self.config.chunk_size,
        )
        .with_progress(Uuid::new_v4(), 0);
        self.save_resumable(&state);

        let stats = self.upload(state, cancel)?;
        result.session_id = Some(stats.session_id);
        result.chunks_submitted = stats.chunks_submitted;
        result.status = SyncStatus::Completed;

        self.trigger_aggregation();
        self.complete_upload(kind);
        Ok(result)
    }

    fn plan(&self, kind: SyncKind, now: DateTime<Utc>) -> Plan {
        match kind {
            SyncKind::Historical => Plan {
                strategy: Some(SyncStrategy::Historical),
                used_fallback_window: false,
                windows: self.analyzer.plan_windows(
                    SyncStrategy::Historical,
                    &BackendTimestamps::new(),
                    now,
                ),
            },
            SyncKind::Last24Hours => Plan {
                strategy: None,
                used_fallback_window: false,
                windows: self
                    .analyzer
                    .uniform(SyncWindow::lookback(now, Duration::hours(LAST_24_HOURS))),
            },
            SyncKind::Initial | SyncKind::Incremental | SyncKind::NetworkRetry => {
                match self.backend.latest_timestamps() {
                    Ok(timestamps) => {
                        let strategy = decide_strategy(&timestamps);
                        info!(
                            "Backend has {} of 4 core metrics; using {} strategy",
                            timestamps.populated_core_count(),
                            strategy
                        );
                        Plan {
                            strategy: Some(strategy),
                            used_fallback_window: false,
                            windows: self.analyzer.plan_windows(strategy, &timestamps, now),
                        }
                    }
                    Err(e) => {
                        warn!("{}; using fallback window", SyncError::BackendTimestamps(e));
                        Plan {
                            strategy: None,
                            used_fallback_window: true,
                            windows: self.analyzer.fallback_windows(now),
                        }
                    }
                }
            }
        }
    }

    /// Fan out one task per target on the pool and fan results back in on
    /// the calling thread
    fn extract_all(&self, plan: &Plan, cancel: &CancellationToken) -> Extraction {
        let total = plan.windows.len();
        let (tx, rx) = mpsc::channel();

        for &(target, window) in &plan.windows {
            let tx = tx.clone();
            let extractor = self.extractor.clone();
            let cancel = cancel.clone();
            self.pool.spawn(move || {
                let result = extractor.extract(target, window, &cancel);
                let _ = tx.send((target, result));
            });
        }
        drop(tx);

        let mut collected: HashMap<ExtractionTarget, Vec<Reading>> = HashMap::new();
        let mut failed_targets = Vec::new();

        for (done, (target, result)) in rx.iter().enumerate() {
            match result {
                Ok(readings) => {
                    collected.insert(target, readings);
                }
                Err(e) => {
                    if !matches!(e.downcast_ref::<SyncError>(), Some(SyncError::Cancelled)) {
                        warn!(
                            "{}",
                            SyncError::Extraction {
                                target: target.label().to_string(),
                                source: e,
                            }
                        );
                        failed_targets.push(target);
                    }
                }
            }
            self.progress
                .update(done + 1, total, "Fetching health data", target.label());
        }

        // Concatenate in fan-out order so chunk boundaries are deterministic
        let mut readings = Vec::new();
        let mut per_target = Vec::with_capacity(total);
        for (target, _) in &plan.windows {
            let target_readings = collected.remove(target).unwrap_or_default();
            per_target.push((*target, target_readings.len()));
            readings.extend(target_readings);
        }
        failed_targets.sort_by_key(|t| plan.windows.iter().position(|(p, _)| p == t));

        Extraction {
            readings,
            per_target,
            failed_targets,
        }
    }

    /// Upload the remaining chunks of `state`, saving it after every chunk
    fn upload(
        &self,
        mut state: ResumableSyncState,
        cancel: &CancellationToken,
    ) -> Result<UploadStats, SyncError> {
        let session_id = match state.session_id {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                state.session_id = Some(id);
                id
            }
        };
        if state.is_complete() {
            // Every chunk was accepted before the state could be cleared
            return Ok(UploadStats {
                session_id,
                total_chunks: state.total_chunks(),
                ..Default::default()
            });
        }

        let readings = state.pending_readings.clone();
        let total = readings.len();
        let chunk_size = state.chunk_size;

        // A resumed session keeps the chunk size it was cut with
        let uploader =
            ChunkedUploader::with_settings(self.backend.clone(), chunk_size, self.config.pacing());
        let uploaded = uploader.submit_from(
            session_id,
            &readings,
            state.completed_chunks + 1,
            cancel,
            |envelope| {
                state.completed_chunks = envelope.chunk_number;
                state.saved_at = Utc::now();
                self.save_resumable(&state);
                let done = (envelope.chunk_number * chunk_size).min(total);
                self.progress
                    .update(done, total, "Uploading readings", "");
            },
        );

        if uploaded.is_err() {
            state.saved_at = Utc::now();
            self.save_resumable(&state);
        }
        uploaded
    }

    fn save_resumable(&self, state: &ResumableSyncState) {
        if let Err(e) = self.resumable.save(state) {
            warn!("{}", SyncError::Persistence(e));
        }
    }

    /// Advisory; a failure never fails the run
    fn trigger_aggregation(&self) {
        if let Err(e) = self.backend.trigger_aggregation() {
            warn!("{}", SyncError::AggregationTrigger(e));
        }
    }

    fn complete_upload(&self, kind: SyncKind) {
        if let Err(e) = self.resumable.clear() {
            warn!("{}", SyncError::Persistence(e));
        }
        if let Err(e) = self.persistence.record_sync(kind, Utc::now()) {
            warn!("{}", SyncError::Persistence(e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::models::{MetricType, ReadingSource};
    use crate::source::{InMemoryHealthSource, RawSample};
    use crate::storage::InMemoryKeyValueStore;

    fn sample(start: DateTime<Utc>, value: f64) -> RawSample {
        RawSample {
            id: None,
            start,
            end: start,
            value,
            unit: String::new(),
            source: ReadingSource::Device,
            device: None,
            note: None,
            confidence: None,
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            pacing_ms: 0,
            ..EngineConfig::default()
        }
    }

    fn engine(
        source: Arc<InMemoryHealthSource>,
        backend: Arc<InMemoryBackend>,
    ) -> SyncEngine {
        SyncEngine::new(source, backend, Arc::new(InMemoryKeyValueStore::new()), config()).unwrap()
    }

    #[test]
    fn test_run_guard_rejects_second_run() {
        let engine = engine(
            Arc::new(InMemoryHealthSource::new()),
            Arc::new(InMemoryBackend::new()),
        );
        let guard = engine.begin().unwrap();
        assert!(engine.is_running());
        assert!(matches!(
            engine.run(SyncRequest::manual(SyncKind::Incremental)),
            Err(SyncError::AlreadyRunning)
        ));
        drop(guard);
        assert!(!engine.is_running());
        assert!(engine.run(SyncRequest::manual(SyncKind::Incremental)).is_ok());
    }

    #[test]
    fn test_cooldown_applies_to_automatic_triggers_only() {
        let engine = engine(
            Arc::new(InMemoryHealthSource::new()),
            Arc::new(InMemoryBackend::new()),
        );
        engine
            .run(SyncRequest::new(SyncKind::Incremental, SyncTrigger::Periodic))
            .unwrap();

        let err = engine
            .run(SyncRequest::new(SyncKind::Incremental, SyncTrigger::Foreground))
            .unwrap_err();
        assert!(matches!(err, SyncError::CoolingDown { kind: SyncKind::Incremental, .. }));

        // Other kinds have their own cooldown
        assert!(
            engine
                .run(SyncRequest::new(SyncKind::Last24Hours, SyncTrigger::Periodic))
                .is_ok()
        );
        assert!(engine.run(SyncRequest::manual(SyncKind::Incremental)).is_ok());
    }

    #[test]
    fn test_nothing_to_sync() {
        let backend = Arc::new(InMemoryBackend::new());
        let engine = engine(Arc::new(InMemoryHealthSource::new()), backend.clone());

        let result = engine.run(SyncRequest::manual(SyncKind::Initial)).unwrap();
        assert_eq!(result.status, SyncStatus::NothingToSync);
        assert_eq!(result.strategy, Some(SyncStrategy::Historical));
        assert_eq!(result.per_target.len(), 12);
        assert!(backend.chunks().is_empty());
        assert_eq!(backend.aggregation_calls(), 0);
        assert!(engine.persistence().last_sync(SyncKind::Initial).unwrap().is_some());
    }

    #[test]
    fn test_last_24_hours_window() {
        let source = Arc::new(InMemoryHealthSource::new());
        let now = Utc::now();
        source.add_samples(
            MetricType::HeartRate,
            vec![sample(now - Duration::hours(30), 58.0), sample(now - Duration::hours(2), 64.0)],
        );
        let backend = Arc::new(InMemoryBackend::new());
        let engine = engine(source, backend.clone());

        let result = engine.run(SyncRequest::manual(SyncKind::Last24Hours)).unwrap();
        assert_eq!(result.strategy, None);
        assert_eq!(result.readings_fetched, 1);
        assert_eq!(backend.chunks()[0].readings[0].value, 64.0);
    }

    #[test]
    fn test_extraction_failure_is_isolated() {
        let source = Arc::new(InMemoryHealthSource::new());
        let now = Utc::now();
        source.add_samples(MetricType::BodyMass, vec![sample(now - Duration::days(2), 72.5)]);
        source.fail_metric(MetricType::HeartRate);
        source.fail_workout_queries();
        let backend = Arc::new(InMemoryBackend::new());
        let engine = engine(source, backend.clone());

        let result = engine.run(SyncRequest::manual(SyncKind::Historical)).unwrap();
        assert_eq!(result.status, SyncStatus::Completed);
        assert_eq!(result.readings_fetched, 1);
        assert_eq!(
            result.failed_targets,
            vec![
                ExtractionTarget::Metric(MetricType::HeartRate),
                ExtractionTarget::Workouts
            ]
        );
        assert_eq!(backend.reading_count(), 1);
    }

    #[test]
    fn test_cancel_before_run_is_cleared_by_fresh_token() {
        let engine = engine(
            Arc::new(InMemoryHealthSource::new()),
            Arc::new(InMemoryBackend::new()),
        );
        engine.cancel();
        assert!(engine.run(SyncRequest::manual(SyncKind::Incremental)).is_ok());
    }

    #[test]
    fn test_resume_without_state() {
        let engine = engine(
            Arc::new(InMemoryHealthSource::new()),
            Arc::new(InMemoryBackend::new()),
        );
        assert!(matches!(engine.resume(), Err(SyncError::NothingToResume)));
        assert!(!engine.is_running());
    }

    #[test]
    fn test_reset_clears_bookkeeping() {
        let engine = engine(
            Arc::new(InMemoryHealthSource::new()),
            Arc::new(InMemoryBackend::new()),
        );
        engine.run(SyncRequest::manual(SyncKind::Incremental)).unwrap();
        assert!(engine.persistence().last_global_sync().unwrap().is_some());
        assert!(engine.progress().is_some());

        engine.reset().unwrap();
        assert!(engine.persistence().last_global_sync().unwrap().is_none());
        assert!(engine.progress().is_none());
    }

    #[test]
    fn test_source_outage_is_not_up_to_date() {
        let source = Arc::new(InMemoryHealthSource::new());
        for metric in MetricType::ALL {
            source.fail_metric(metric);
        }
        source.fail_workout_queries();
        let backend = Arc::new(InMemoryBackend::new());
        let engine = engine(source, backend.clone());

        let result = engine.run(SyncRequest::manual(SyncKind::Incremental)).unwrap();
        assert_eq!(result.status, SyncStatus::SourceUnavailable);
        assert_eq!(result.failed_targets.len(), 12);
        assert_eq!(result.summary(), "Health data unavailable for 12 targets");
        assert!(backend.chunks().is_empty());
        assert!(engine.persistence().last_global_sync().unwrap().is_none());

        let progress = engine.progress().unwrap();
        assert!(!progress.is_syncing);
        assert!(progress.last_error.is_some());
    }

    #[test]
    fn test_resume_fully_accepted_session_submits_nothing() {
        let backend = Arc::new(InMemoryBackend::new());
        let engine = engine(Arc::new(InMemoryHealthSource::new()), backend.clone());
        let session = Uuid::new_v4();
        let readings = vec![
            Reading::builder(MetricType::HeartRate, 61.0, Utc::now()).build(),
            Reading::builder(MetricType::HeartRate, 62.0, Utc::now()).build(),
        ];
        let state = ResumableSyncState::new(SyncKind::Incremental, readings, None, 500)
            .with_progress(session, 1);
        engine.resumable.save(&state).unwrap();

        let result = engine.resume().unwrap();
        assert_eq!(result.session_id, Some(session));
        assert_eq!(result.chunks_submitted, 0);
        assert!(backend.chunks().is_empty());
        assert!(engine.resumable_state().is_none());
        assert!(engine.persistence().last_sync(SyncKind::Incremental).unwrap().is_some());
    }

    #[test]
    fn test_execution_expired_outside_run_is_silent() {
        let engine = engine(
            Arc::new(InMemoryHealthSource::new()),
            Arc::new(InMemoryBackend::new()),
        );
        let events = engine.subscribe();
        engine.execution_expired();
        assert!(events.try_recv().is_err());
    }
}
