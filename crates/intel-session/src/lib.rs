//! Extraction simulation and session orchestration for Profile Intel.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use intel_core::{validate, ExtractionRecord, ProgressState, ResultsSummary, ValidatedIdentifier, ValidationError};
use intel_synth::{default_generator, RecordGenerator};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "intel-session";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub item_delay_min_ms: u64,
    pub item_delay_max_ms: u64,
    pub completion_grace_ms: u64,
    pub dismiss_delay_ms: u64,
    pub rng_seed: Option<u64>,
    pub event_capacity: usize,
    /// Most recent notifications kept in the session; older ones are dropped.
    pub notification_limit: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            item_delay_min_ms: 2000,
            item_delay_max_ms: 3000,
            completion_grace_ms: 1500,
            dismiss_delay_ms: 3000,
            rng_seed: None,
            event_capacity: 64,
            notification_limit: 20,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
    #[error("item delay range is empty: min {min_ms}ms > max {max_ms}ms")]
    InvertedDelayRange { min_ms: u64, max_ms: u64 },
}

impl SimulationConfig {
    /// Defaults, overlaid by the YAML file named in `INTEL_CONFIG`, overlaid by `INTEL_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = match std::env::var("INTEL_CONFIG") {
            Ok(path) => Self::from_yaml_file(path)?,
            Err(_) => Self::default(),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.checked()
    }

    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        fn parse<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value,
                })
        }

        if let Some(v) = lookup("INTEL_ITEM_DELAY_MIN_MS") {
            self.item_delay_min_ms = parse("INTEL_ITEM_DELAY_MIN_MS", v)?;
        }
        if let Some(v) = lookup("INTEL_ITEM_DELAY_MAX_MS") {
            self.item_delay_max_ms = parse("INTEL_ITEM_DELAY_MAX_MS", v)?;
        }
        if let Some(v) = lookup("INTEL_COMPLETION_GRACE_MS") {
            self.completion_grace_ms = parse("INTEL_COMPLETION_GRACE_MS", v)?;
        }
        if let Some(v) = lookup("INTEL_DISMISS_DELAY_MS") {
            self.dismiss_delay_ms = parse("INTEL_DISMISS_DELAY_MS", v)?;
        }
        if let Some(v) = lookup("INTEL_RNG_SEED") {
            self.rng_seed = Some(parse("INTEL_RNG_SEED", v)?);
        }
        if let Some(v) = lookup("INTEL_EVENT_CAPACITY") {
            self.event_capacity = parse("INTEL_EVENT_CAPACITY", v)?;
        }
        if let Some(v) = lookup("INTEL_NOTIFICATION_LIMIT") {
            self.notification_limit = parse("INTEL_NOTIFICATION_LIMIT", v)?;
        }
        self.checked()
    }

    fn checked(self) -> Result<Self, ConfigError> {
        if self.item_delay_min_ms > self.item_delay_max_ms {
            return Err(ConfigError::InvertedDelayRange {
                min_ms: self.item_delay_min_ms,
                max_ms: self.item_delay_max_ms,
            });
        }
        Ok(self)
    }

    /// No artificial waiting at all. Used by tests and dry runs.
    pub fn instant() -> Self {
        Self {
            item_delay_min_ms: 0,
            item_delay_max_ms: 0,
            completion_grace_ms: 0,
            dismiss_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn completion_grace(&self) -> Duration {
        Duration::from_millis(self.completion_grace_ms)
    }

    pub fn dismiss_delay(&self) -> Duration {
        Duration::from_millis(self.dismiss_delay_ms)
    }
}

/// Receives every progress update of a batch, in emission order.
#[async_trait]
pub trait ProgressObserver: Send + Sync {
    async fn on_progress(&self, progress: &ProgressState);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

#[async_trait]
impl ProgressObserver for NoopObserver {
    async fn on_progress(&self, _progress: &ProgressState) {}
}

/// Channel form: the simulator writes, a consumer drains.
#[async_trait]
impl ProgressObserver for mpsc::UnboundedSender<ProgressState> {
    async fn on_progress(&self, progress: &ProgressState) {
        let _ = self.send(progress.clone());
    }
}

/// Sequential fake extraction loop.
#[derive(Clone)]
pub struct ExtractionSimulator {
    generator: Arc<dyn RecordGenerator>,
    delay_min: Duration,
    delay_max: Duration,
}

impl ExtractionSimulator {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            generator: Arc::from(default_generator()),
            delay_min: Duration::from_millis(config.item_delay_min_ms),
            delay_max: Duration::from_millis(config.item_delay_max_ms),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn RecordGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Uniform in `[min, max)`; a degenerate range yields `min`.
    pub fn item_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.delay_max <= self.delay_min {
            return self.delay_min;
        }
        rng.gen_range(self.delay_min..self.delay_max)
    }

    /// Processes `identifiers` one at a time and returns their records in input order.
    ///
    /// The observer sees `("", 0, n)` first, then for each item a target
    /// update followed by a count increment. The per-item delay sits between
    /// the two, and the record is generated before the increment.
    pub async fn run<R: RngCore + Send>(
        &self,
        identifiers: &[ValidatedIdentifier],
        rng: &mut R,
        observer: &dyn ProgressObserver,
    ) -> Vec<ExtractionRecord> {
        let total = identifiers.len();
        let span = info_span!("simulate_batch", total);
        async move {
            let mut progress = ProgressState::started(total);
            observer.on_progress(&progress).await;

            let mut records = Vec::with_capacity(total);
            for (index, identifier) in identifiers.iter().enumerate() {
                progress.current_target = self.generator.label_for(identifier);
                observer.on_progress(&progress).await;

                let delay = self.item_delay(&mut *rng);
                debug!(index, target = %progress.current_target, delay_ms = delay.as_millis() as u64, "simulating extraction");
                tokio::time::sleep(delay).await;

                records.push(self.generator.generate(identifier, &mut *rng));
                progress.completed_count += 1;
                observer.on_progress(&progress).await;
            }
            records
        }
        .instrument(span)
        .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    NotStarted,
    Running,
    Completed,
    /// Only reached when the simulation task dies unexpectedly.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
    pub emitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Progress(ProgressState),
    Notification(Notification),
    BatchCompleted { batch_id: Uuid, record_count: usize },
    BatchFailed { batch_id: Uuid, message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records: Vec<ExtractionRecord>,
}

#[derive(Debug, Clone)]
pub enum BatchOutcome {
    Completed(BatchSummary),
    Failed { batch_id: Uuid, message: String },
}

impl BatchOutcome {
    pub fn records(&self) -> &[ExtractionRecord] {
        match self {
            Self::Completed(summary) => &summary.records,
            Self::Failed { .. } => &[],
        }
    }
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("an extraction batch is already running")]
    AlreadyRunning,
}

/// Read-only copy of the session for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: BatchPhase,
    pub is_running: bool,
    pub is_modal_visible: bool,
    pub dismiss_ready: bool,
    pub active_batch: Option<Uuid>,
    pub progress: ProgressState,
    pub results: Vec<ExtractionRecord>,
    pub summary: ResultsSummary,
    pub last_error: Option<String>,
    pub notifications: Vec<Notification>,
}

/// Overlay-only view: progress and flags, without results or notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub phase: BatchPhase,
    pub progress: ProgressState,
    pub is_running: bool,
    pub is_modal_visible: bool,
    pub dismiss_ready: bool,
}

#[derive(Debug)]
struct SessionState {
    phase: BatchPhase,
    is_running: bool,
    is_modal_visible: bool,
    modal_opened_at: Option<Instant>,
    active_batch: Option<Uuid>,
    progress: ProgressState,
    results: Vec<ExtractionRecord>,
    last_error: Option<String>,
    notifications: VecDeque<Notification>,
    notification_limit: usize,
    batches_started: u64,
}

impl SessionState {
    fn new(notification_limit: usize) -> Self {
        Self {
            phase: BatchPhase::NotStarted,
            is_running: false,
            is_modal_visible: false,
            modal_opened_at: None,
            active_batch: None,
            progress: ProgressState::default(),
            results: Vec::new(),
            last_error: None,
            notifications: VecDeque::new(),
            notification_limit: notification_limit.max(1),
            batches_started: 0,
        }
    }

    fn notify(&mut self, level: NotificationLevel, title: &str, description: String) -> Notification {
        let notification = Notification {
            level,
            title: title.to_string(),
            description,
            emitted_at: Utc::now(),
        };
        if self.notifications.len() == self.notification_limit {
            self.notifications.pop_front();
        }
        self.notifications.push_back(notification.clone());
        notification
    }

    fn close_modal(&mut self) {
        self.is_modal_visible = false;
        self.modal_opened_at = None;
    }
}

struct PreparedBatch {
    batch_id: Uuid,
    sequence: u64,
    started_at: DateTime<Utc>,
    identifiers: Vec<ValidatedIdentifier>,
}

/// Handle to a batch running in the background.
#[derive(Debug)]
pub struct BatchTicket {
    pub batch_id: Uuid,
    pub total_count: usize,
    handle: JoinHandle<BatchOutcome>,
}

impl BatchTicket {
    pub async fn wait(self) -> BatchOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(err) => BatchOutcome::Failed {
                batch_id: self.batch_id,
                message: err.to_string(),
            },
        }
    }
}

struct ControllerInner {
    config: SimulationConfig,
    simulator: ExtractionSimulator,
    state: RwLock<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

/// Sole mutator of the session. Clones share the same session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<ControllerInner>,
}

const FAILURE_TITLE: &str = "Extraction Failed";
const SIMULATION_FAILURE: &str = "An error occurred during the intelligence gathering process.";

impl SessionController {
    pub fn new(config: SimulationConfig) -> Self {
        let simulator = ExtractionSimulator::new(&config);
        Self::with_simulator(config, simulator)
    }

    pub fn with_simulator(config: SimulationConfig, simulator: ExtractionSimulator) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let state = RwLock::new(SessionState::new(config.notification_limit));
        Self {
            inner: Arc::new(ControllerInner {
                config,
                simulator,
                state,
                events,
            }),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Validates and launches a batch on the runtime, returning immediately.
    pub async fn start_batch(&self, raw_text: &str) -> Result<BatchTicket, StartError> {
        let batch = self.prepare(raw_text).await?;
        let batch_id = batch.batch_id;
        let total_count = batch.identifiers.len();
        let handle = tokio::spawn(self.clone().drive(batch));
        Ok(BatchTicket {
            batch_id,
            total_count,
            handle,
        })
    }

    /// Validates and drives a batch to completion on the calling task.
    pub async fn run_batch(&self, raw_text: &str) -> Result<BatchOutcome, StartError> {
        let batch = self.prepare(raw_text).await?;
        Ok(self.clone().drive(batch).await)
    }

    /// Hides the overlay unless a batch is running. Returns whether it is hidden.
    pub async fn request_close_modal(&self) -> bool {
        let mut state = self.inner.state.write().await;
        if state.is_running {
            debug!("ignoring overlay dismissal while a batch is running");
            return false;
        }
        state.close_modal();
        true
    }

    pub async fn dismiss_ready(&self) -> bool {
        let state = self.inner.state.read().await;
        self.dismiss_ready_for(&state)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.state.read().await;
        SessionSnapshot {
            phase: state.phase,
            is_running: state.is_running,
            is_modal_visible: state.is_modal_visible,
            dismiss_ready: self.dismiss_ready_for(&state),
            active_batch: state.active_batch,
            progress: state.progress.clone(),
            summary: ResultsSummary::from_records(&state.results),
            results: state.results.clone(),
            last_error: state.last_error.clone(),
            notifications: state.notifications.iter().cloned().collect(),
        }
    }

    /// Cheap read for overlay polling.
    pub async fn progress(&self) -> ProgressSnapshot {
        let state = self.inner.state.read().await;
        ProgressSnapshot {
            phase: state.phase,
            progress: state.progress.clone(),
            is_running: state.is_running,
            is_modal_visible: state.is_modal_visible,
            dismiss_ready: self.dismiss_ready_for(&state),
        }
    }

    /// Returns the pending input error and clears it, so it is shown once.
    pub async fn take_last_error(&self) -> Option<String> {
        self.inner.state.write().await.last_error.take()
    }

    fn dismiss_ready_for(&self, state: &SessionState) -> bool {
        state.is_modal_visible
            && state
                .modal_opened_at
                .is_some_and(|opened| opened.elapsed() >= self.inner.config.dismiss_delay())
    }

    fn publish(&self, event: SessionEvent) {
        let _ = self.inner.events.send(event);
    }

    async fn prepare(&self, raw_text: &str) -> Result<PreparedBatch, StartError> {
        let mut state = self.inner.state.write().await;
        if state.is_running {
            return Err(StartError::AlreadyRunning);
        }

        let identifiers = match validate(raw_text) {
            Ok(identifiers) => identifiers,
            Err(err) => {
                warn!(error = %err, "rejected extraction batch");
                state.last_error = Some(err.to_string());
                let notification = state.notify(NotificationLevel::Error, FAILURE_TITLE, err.to_string());
                drop(state);
                self.publish(SessionEvent::Notification(notification));
                return Err(err.into());
            }
        };

        let batch_id = Uuid::new_v4();
        state.batches_started += 1;
        let sequence = state.batches_started;
        state.phase = BatchPhase::Running;
        state.is_running = true;
        state.is_modal_visible = true;
        state.modal_opened_at = Some(Instant::now());
        state.active_batch = Some(batch_id);
        state.results.clear();
        state.last_error = None;
        state.progress = ProgressState::started(identifiers.len());
        let notification = state.notify(
            NotificationLevel::Info,
            "Extraction Started",
            format!("Beginning intelligence gathering on {} targets...", identifiers.len()),
        );
        drop(state);

        info!(%batch_id, targets = identifiers.len(), "extraction batch started");
        self.publish(SessionEvent::Notification(notification));
        Ok(PreparedBatch {
            batch_id,
            sequence,
            started_at: Utc::now(),
            identifiers,
        })
    }

    fn rng_for(&self, sequence: u64) -> StdRng {
        match self.inner.config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(sequence)),
            None => StdRng::from_entropy(),
        }
    }

    async fn drive(self, batch: PreparedBatch) -> BatchOutcome {
        let PreparedBatch {
            batch_id,
            sequence,
            started_at,
            identifiers,
        } = batch;

        let simulator = self.inner.simulator.clone();
        let sink = SessionSink {
            controller: self.clone(),
            batch_id,
        };
        let mut rng = self.rng_for(sequence);
        // A panic inside the loop surfaces as a JoinError instead of tearing down the session.
        let simulation = tokio::spawn(async move { simulator.run(&identifiers, &mut rng, &sink).await });

        match simulation.await {
            Ok(records) => {
                tokio::time::sleep(self.inner.config.completion_grace()).await;
                self.complete(batch_id, started_at, records).await
            }
            Err(err) => self.fail(batch_id, err.to_string()).await,
        }
    }

    async fn complete(
        &self,
        batch_id: Uuid,
        started_at: DateTime<Utc>,
        records: Vec<ExtractionRecord>,
    ) -> BatchOutcome {
        let mut state = self.inner.state.write().await;
        state.close_modal();
        state.results = records.clone();
        state.is_running = false;
        state.active_batch = None;
        state.phase = BatchPhase::Completed;
        let notification = state.notify(
            NotificationLevel::Success,
            "Extraction Complete",
            format!("Successfully extracted data from {} profiles.", records.len()),
        );
        drop(state);

        info!(%batch_id, records = records.len(), "extraction batch completed");
        self.publish(SessionEvent::Notification(notification));
        self.publish(SessionEvent::BatchCompleted {
            batch_id,
            record_count: records.len(),
        });
        BatchOutcome::Completed(BatchSummary {
            batch_id,
            started_at,
            finished_at: Utc::now(),
            records,
        })
    }

    async fn fail(&self, batch_id: Uuid, cause: String) -> BatchOutcome {
        error!(%batch_id, %cause, "extraction batch failed");
        let mut state = self.inner.state.write().await;
        state.close_modal();
        state.is_running = false;
        state.active_batch = None;
        state.phase = BatchPhase::Failed;
        state.last_error = Some(SIMULATION_FAILURE.to_string());
        let notification = state.notify(
            NotificationLevel::Error,
            FAILURE_TITLE,
            SIMULATION_FAILURE.to_string(),
        );
        drop(state);

        self.publish(SessionEvent::Notification(notification));
        self.publish(SessionEvent::BatchFailed {
            batch_id,
            message: SIMULATION_FAILURE.to_string(),
        });
        BatchOutcome::Failed {
            batch_id,
            message: SIMULATION_FAILURE.to_string(),
        }
    }
}

/// Writes progress into the session on behalf of one batch.
struct SessionSink {
    controller: SessionController,
    batch_id: Uuid,
}

#[async_trait]
impl ProgressObserver for SessionSink {
    async fn on_progress(&self, progress: &ProgressState) {
        {
            let mut state = self.controller.inner.state.write().await;
            if state.active_batch != Some(self.batch_id) {
                return;
            }
            state.progress = progress.clone();
        }
        self.controller.publish(SessionEvent::Progress(progress.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intel_core::{sample_batch_text, SKILL_POOL, TITLE_POOL};
    use std::collections::HashMap;

    fn ids(raw: &str) -> Vec<ValidatedIdentifier> {
        validate(raw).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn progress_follows_two_phase_pattern() {
        let simulator = ExtractionSimulator::new(&SimulationConfig::default());
        let identifiers = ids(&sample_batch_text());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut rng = StdRng::seed_from_u64(1);

        let records = simulator.run(&identifiers, &mut rng, &tx).await;
        drop(tx);

        let mut seen = Vec::new();
        while let Some(p) = rx.recv().await {
            seen.push(p);
        }
        assert_eq!(seen.len(), 1 + 2 * identifiers.len());
        assert!(seen.iter().all(|p| p.total_count == 10));
        assert_eq!(seen[0], ProgressState::started(10));

        let counts: Vec<usize> = seen.iter().map(|p| p.completed_count).collect();
        let mut expected = vec![0];
        for i in 0..10 {
            expected.push(i);
            expected.push(i + 1);
        }
        assert_eq!(counts, expected);

        for (i, pair) in seen[1..].chunks(2).enumerate() {
            let label = identifiers[i].display_name();
            assert_eq!(pair[0].current_target, label);
            assert_eq!(pair[1].current_target, label);
        }

        assert_eq!(records.len(), 10);
        for (record, identifier) in records.iter().zip(&identifiers) {
            assert_eq!(record.source_url, identifier.as_str());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn each_item_sleeps_between_two_and_three_seconds() {
        let simulator = ExtractionSimulator::new(&SimulationConfig::default());
        let identifiers = ids("https://linkedin.com/in/a\nhttps://linkedin.com/in/b\nhttps://linkedin.com/in/c");
        let mut rng = StdRng::seed_from_u64(9);

        let started = Instant::now();
        simulator.run(&identifiers, &mut rng, &NoopObserver).await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(6000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(9000), "{elapsed:?}");
    }

    #[test]
    fn item_delay_stays_in_half_open_range() {
        let simulator = ExtractionSimulator::new(&SimulationConfig::default());
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let d = simulator.item_delay(&mut rng);
            assert!(d >= Duration::from_millis(2000) && d < Duration::from_millis(3000));
        }
        let flat = ExtractionSimulator::new(&SimulationConfig::instant());
        assert_eq!(flat.item_delay(&mut rng), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn seeded_controller_is_reproducible() {
        let config = SimulationConfig {
            rng_seed: Some(77),
            ..SimulationConfig::default()
        };
        let a = SessionController::new(config.clone());
        let b = SessionController::new(config);
        let raw = sample_batch_text();
        let ra = a.run_batch(&raw).await.unwrap();
        let rb = b.run_batch(&raw).await.unwrap();
        assert_eq!(ra.records(), rb.records());
        for record in ra.records() {
            assert!(TITLE_POOL.contains(&record.title.as_str()));
            assert!(record.skills.iter().all(|s| SKILL_POOL.contains(&s.as_str())));
        }
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let vars: HashMap<&str, &str> = [
            ("INTEL_ITEM_DELAY_MIN_MS", "10"),
            ("INTEL_ITEM_DELAY_MAX_MS", "20"),
            ("INTEL_RNG_SEED", "5"),
            ("INTEL_NOTIFICATION_LIMIT", "8"),
        ]
        .into_iter()
        .collect();
        let config = SimulationConfig::default()
            .with_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.item_delay_min_ms, 10);
        assert_eq!(config.item_delay_max_ms, 20);
        assert_eq!(config.rng_seed, Some(5));
        assert_eq!(config.notification_limit, 8);
        assert_eq!(config.completion_grace_ms, 1500);
    }

    #[test]
    fn bad_overrides_are_rejected() {
        let err = SimulationConfig::default()
            .with_overrides(|k| (k == "INTEL_DISMISS_DELAY_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = SimulationConfig::default()
            .with_overrides(|k| (k == "INTEL_ITEM_DELAY_MIN_MS").then(|| "5000".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvertedDelayRange { .. }));
    }

    #[test]
    fn yaml_file_fills_missing_keys_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intel.yaml");
        std::fs::write(&path, "item_delay_min_ms: 100\nitem_delay_max_ms: 200\n").unwrap();
        let config = SimulationConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.item_delay_min_ms, 100);
        assert_eq!(config.item_delay_max_ms, 200);
        assert_eq!(config.dismiss_delay_ms, 3000);

        assert!(matches!(
            SimulationConfig::from_yaml_file(dir.path().join("missing.yaml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn session_events_serialize_tagged() {
        let json = serde_json::to_value(SessionEvent::Progress(ProgressState::started(2))).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["totalCount"], 2);
    }
}
