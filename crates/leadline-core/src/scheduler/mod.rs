//! Background job scheduler.
//!
//! Jobs are keyed by name; a second submission under the same name either
//! keeps the running job or replaces it, per policy. The scheduler runs the
//! periodic sync loop and the per-call recording chains, gated on
//! connectivity and battery state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::db::{CallRepository, Database};
use crate::error::{Error, Result};
use crate::pipeline::{PipelineConfig, RecordingPipeline};
use crate::remote::RemoteApi;
use crate::sync::SyncEngine;

/// What to do when a job name is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniquePolicy {
    /// Leave the running job alone and drop the new submission.
    Keep,
    /// Abort the running job and start the new one.
    Replace,
}

/// Network reachability gate for deferrable work.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Battery gate: heavy background work waits for acceptable power state.
pub trait BatteryState: Send + Sync {
    fn is_power_ok(&self) -> bool;
}

/// Sink for user-facing notifications about background work.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Default gate: assume a reachable network.
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// Default gate: assume acceptable power.
pub struct AlwaysPowered;

impl BatteryState for AlwaysPowered {
    fn is_power_ok(&self) -> bool {
        true
    }
}

/// Default sink: notifications go to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        tracing::warn!(title, body, "background job notification");
    }
}

/// Scheduler tuning knobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between periodic sync passes.
    pub sync_interval: Duration,
    /// Attempts per recording chain before giving up and notifying.
    pub max_recording_attempts: u32,
    /// Delay between recording attempts and offline waits.
    pub retry_backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(15 * 60),
            max_recording_attempts: 3,
            retry_backoff: Duration::from_secs(30),
        }
    }
}

struct Gates {
    connectivity: Arc<dyn Connectivity>,
    battery: Arc<dyn BatteryState>,
    notifier: Arc<dyn Notifier>,
}

/// Keyed background job scheduler over a shared database and remote API.
pub struct JobScheduler<R: RemoteApi + Send + Sync + 'static> {
    db: Arc<Database>,
    remote: Arc<R>,
    config: SchedulerConfig,
    pipeline_config: PipelineConfig,
    gates: Arc<Gates>,
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl<R: RemoteApi + Send + Sync + 'static> JobScheduler<R> {
    pub fn new(
        db: Arc<Database>,
        remote: Arc<R>,
        config: SchedulerConfig,
        pipeline_config: PipelineConfig,
    ) -> Self {
        Self {
            db,
            remote,
            config,
            pipeline_config,
            gates: Arc::new(Gates {
                connectivity: Arc::new(AlwaysOnline),
                battery: Arc::new(AlwaysPowered),
                notifier: Arc::new(LogNotifier),
            }),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Swap in platform gates and notification sink.
    #[must_use]
    pub fn with_gates(
        mut self,
        connectivity: Arc<dyn Connectivity>,
        battery: Arc<dyn BatteryState>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        self.gates = Arc::new(Gates {
            connectivity,
            battery,
            notifier,
        });
        self
    }

    /// Submit a job under a unique name. Returns whether it was started.
    pub fn spawn_unique<F>(&self, name: &str, policy: UniquePolicy, fut: F) -> bool
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.retain(|_, handle| !handle.is_finished());

        if let Some(existing) = jobs.get(name) {
            match policy {
                UniquePolicy::Keep => {
                    tracing::debug!(name, "job already running, keeping it");
                    return false;
                }
                UniquePolicy::Replace => {
                    tracing::debug!(name, "replacing running job");
                    existing.abort();
                }
            }
        }

        jobs.insert(name.to_string(), tokio::spawn(fut));
        true
    }

    /// Whether a job with this name is currently running.
    pub fn is_running(&self, name: &str) -> bool {
        self.jobs
            .lock()
            .unwrap()
            .get(name)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start the periodic sync loop. A second call is a no-op while the
    /// loop lives.
    pub fn start_periodic_sync(&self) -> bool {
        let db = Arc::clone(&self.db);
        let remote = Arc::clone(&self.remote);
        let gates = Arc::clone(&self.gates);
        let interval = self.config.sync_interval;

        self.spawn_unique("sync.periodic", UniquePolicy::Keep, async move {
            loop {
                run_gated_sync(&db, remote.as_ref(), &gates).await;
                tokio::time::sleep(interval).await;
            }
        })
    }

    /// Kick off an immediate sync pass in the background. Returns false
    /// when a manual pass is already running.
    pub fn sync_now(&self) -> bool {
        let db = Arc::clone(&self.db);
        let remote = Arc::clone(&self.remote);
        let gates = Arc::clone(&self.gates);

        self.spawn_unique("sync.manual", UniquePolicy::Keep, async move {
            run_gated_sync(&db, remote.as_ref(), &gates).await;
        })
    }

    /// Queue the recording chain for a call log. Re-submission for the same
    /// call replaces a chain already in flight.
    pub fn enqueue_recording(&self, call_log_id: &str) -> bool {
        let db = Arc::clone(&self.db);
        let remote = Arc::clone(&self.remote);
        let gates = Arc::clone(&self.gates);
        let pipeline_config = self.pipeline_config.clone();
        let max_attempts = self.config.max_recording_attempts.max(1);
        let backoff = self.config.retry_backoff;
        let call_log_id = call_log_id.to_string();

        self.spawn_unique(
            &format!("recording.{call_log_id}"),
            UniquePolicy::Replace,
            async move {
                run_recording_chain(
                    &db,
                    remote.as_ref(),
                    &gates,
                    pipeline_config,
                    &call_log_id,
                    max_attempts,
                    backoff,
                )
                .await;
            },
        )
    }

    /// Re-queue every recording that is neither uploaded nor failed, for
    /// startup recovery.
    pub async fn enqueue_unfinished_recordings(&self) -> Result<usize> {
        let calls = CallRepository::new(self.db.connection(), self.db.changes());
        let mut queued = 0;
        for status in [
            crate::models::RecordingStatus::Pending,
            crate::models::RecordingStatus::Finding,
            crate::models::RecordingStatus::Compressing,
            crate::models::RecordingStatus::Uploading,
        ] {
            for recording in calls.list_recordings_by_status(status).await? {
                if self.enqueue_recording(&recording.call_log_id) {
                    queued += 1;
                }
            }
        }
        Ok(queued)
    }

    /// Abort the recording chain for a call, if one is in flight.
    pub fn cancel_recording(&self, call_log_id: &str) -> bool {
        self.cancel(&format!("recording.{call_log_id}"))
    }

    fn cancel(&self, name: &str) -> bool {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(handle) = jobs.remove(name) {
            handle.abort();
            return true;
        }
        false
    }

    /// Abort everything; used on logout and shutdown.
    pub fn cancel_all(&self) {
        let mut jobs = self.jobs.lock().unwrap();
        for (name, handle) in jobs.drain() {
            tracing::debug!(name, "aborting job");
            handle.abort();
        }
    }
}

impl<R: RemoteApi + Send + Sync + 'static> Drop for JobScheduler<R> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

async fn run_gated_sync<R: RemoteApi>(db: &Database, remote: &R, gates: &Gates) {
    if !gates.connectivity.is_online() {
        tracing::debug!("sync skipped: offline");
        return;
    }
    if !gates.battery.is_power_ok() {
        tracing::debug!("sync skipped: battery gate");
        return;
    }
    match SyncEngine::new(db, remote).run_pass().await {
        Ok(report) if report.is_noop() => {}
        Ok(report) => {
            if !report.failures.is_empty() {
                gates.notifier.notify(
                    "Sync finished with errors",
                    &format!("{} items failed to sync", report.failures.len()),
                );
            }
        }
        Err(error) => {
            tracing::error!(%error, "sync pass aborted");
        }
    }
}

/// Whether another attempt with the same inputs could plausibly succeed.
///
/// Only retryable API failures qualify; a missing recording file, an
/// illegal transition or a database error will not heal on re-run.
fn is_transient(error: &Error) -> bool {
    matches!(error, Error::Api(api) if api.is_retryable())
}

async fn run_recording_chain<R: RemoteApi>(
    db: &Database,
    remote: &R,
    gates: &Gates,
    pipeline_config: PipelineConfig,
    call_log_id: &str,
    max_attempts: u32,
    backoff: Duration,
) {
    let pipeline = RecordingPipeline::new(db, remote, pipeline_config);
    let calls = CallRepository::new(db.connection(), db.changes());
    let mut last_error = String::new();
    let mut attempt = 0;

    while attempt < max_attempts {
        if !gates.connectivity.is_online() || !gates.battery.is_power_ok() {
            // gated waits don't consume attempts
            tokio::time::sleep(backoff).await;
            continue;
        }
        attempt += 1;

        match pipeline.run(call_log_id).await {
            Ok(recording) => {
                tracing::info!(call_log_id, recording_id = %recording.id, "recording chain done");
                return;
            }
            Err(error) => {
                last_error = error.to_string();
                tracing::warn!(call_log_id, attempt, %error, "recording chain attempt failed");
                if !is_transient(&error) {
                    break;
                }
                if attempt < max_attempts {
                    // the pipeline parked the row in `failed`; arm the next
                    // attempt explicitly
                    if let Ok(Some(recording)) = calls.get_recording_for_call(call_log_id).await {
                        calls.reset_recording_for_retry(&recording.id).await.ok();
                    }
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    gates.notifier.notify(
        "Recording upload failed",
        &format!("call {call_log_id}: {last_error}"),
    );
}
