//! Repeated status checks for non-terminal jobs.
//!
//! Each watched job gets one poll loop ticking at a fixed per-kind interval.
//! Polls for one job never overlap; polls for different jobs are unordered.
//! Cancelling a watch stops future ticks but lets an in-flight poll finish
//! and land in the store.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use mf_core::{Error, Job, JobKind, JobPatch, ProviderHandle, ProviderStatus, Result};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::generator::db::JobStore;
use crate::generator::registry::ProviderRegistry;
use crate::generator::router;

const MAX_COMMIT_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub image_interval: Duration,
    pub video_interval: Duration,
    /// Consecutive transport failures tolerated before a job is failed.
    pub max_poll_errors: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            image_interval: Duration::from_secs(2),
            video_interval: Duration::from_secs(3),
            max_poll_errors: 5,
        }
    }
}

impl PollSettings {
    pub fn interval_for(&self, kind: JobKind) -> Duration {
        match kind {
            JobKind::ImageGeneration => self.image_interval,
            JobKind::VideoGeneration => self.video_interval,
        }
    }
}

/// Result of one poll attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// Still pending or processing; keep polling.
    Active(Job),
    Finished(Job),
    /// The job is no longer in the store.
    Gone,
}

struct Watch {
    generation: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct Watchers {
    next_generation: u64,
    active: HashMap<String, Watch>,
}

struct SchedulerInner {
    store: Arc<dyn JobStore>,
    registry: Arc<ProviderRegistry>,
    settings: PollSettings,
    watchers: Mutex<Watchers>,
    in_flight: Mutex<HashSet<String>>,
    shutdown: CancellationToken,
}

/// Marks a job as being polled; released on drop.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.id);
        }
    }
}

#[derive(Clone)]
pub struct PollScheduler {
    inner: Arc<SchedulerInner>,
}

impl PollScheduler {
    pub fn new(store: Arc<dyn JobStore>, registry: Arc<ProviderRegistry>, settings: PollSettings) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                store,
                registry,
                settings,
                watchers: Mutex::default(),
                in_flight: Mutex::default(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Start polling `job` unless it is terminal or already watched.
    /// Returns whether a new poll loop was started.
    pub fn watch(&self, job: &Job) -> bool {
        if job.is_terminal() || self.inner.shutdown.is_cancelled() {
            return false;
        }

        let (generation, token) = {
            let Ok(mut watchers) = self.inner.watchers.lock() else {
                return false;
            };
            if watchers.active.contains_key(&job.id) {
                return false;
            }
            let generation = watchers.next_generation;
            watchers.next_generation += 1;
            let token = self.inner.shutdown.child_token();
            watchers.active.insert(job.id.clone(), Watch { generation, token: token.clone() });
            (generation, token)
        };

        let scheduler = self.clone();
        let id = job.id.clone();
        let interval = self.inner.settings.interval_for(job.kind);
        let span = tracing::info_span!("poll", job_id = %id, provider = %job.provider);
        tokio::spawn(
            async move {
                scheduler.run(&id, interval, token).await;
                scheduler.release(&id, generation);
            }
            .instrument(span),
        );
        true
    }

    /// Stop future ticks for `id`. An in-flight poll still completes.
    pub fn unwatch(&self, id: &str) -> bool {
        let removed = self.inner.watchers.lock().ok().and_then(|mut w| w.active.remove(id));
        match removed {
            Some(watch) => {
                watch.token.cancel();
                info!("Stopped polling job {id}");
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn is_watching(&self, id: &str) -> bool {
        self.inner
            .watchers
            .lock()
            .map(|w| w.active.contains_key(id))
            .unwrap_or(false)
    }

    /// Cancel every poll loop and refuse new ones.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        if let Ok(mut watchers) = self.inner.watchers.lock() {
            watchers.active.clear();
        }
    }

    fn release(&self, id: &str, generation: u64) {
        if let Ok(mut watchers) = self.inner.watchers.lock() {
            if watchers.active.get(id).is_some_and(|w| w.generation == generation) {
                watchers.active.remove(id);
            }
        }
    }

    async fn run(&self, id: &str, interval: Duration, token: CancellationToken) {
        let mut errors = 0;
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }

            match self.tick(id, &mut errors).await {
                Tick::Active(_) => {}
                Tick::Finished(job) => {
                    info!("Job {id} finished as {}", job.status.as_str());
                    return;
                }
                Tick::Gone => {
                    warn!("Job {id} disappeared from the store, polling stopped");
                    return;
                }
            }
        }
    }

    /// Poll once, outside any loop. Skips the provider call when another
    /// poll for the same job is already running.
    pub async fn poll_once(&self, id: &str) -> Result<Job> {
        let mut errors = 0;
        match self.tick(id, &mut errors).await {
            Tick::Active(job) | Tick::Finished(job) => Ok(job),
            Tick::Gone => Err(Error::NotFound(id.to_string())),
        }
    }

    /// Bounded variant: poll up to `max_attempts` times, sleeping the
    /// per-kind interval between attempts.
    pub async fn poll_until_terminal(&self, id: &str, max_attempts: u32) -> Result<Job> {
        let job = self.inner.store.get_job(id).await?;
        if job.is_terminal() {
            return Ok(job);
        }
        let interval = self.inner.settings.interval_for(job.kind);

        let mut errors = 0;
        for attempt in 1..=max_attempts {
            match self.tick(id, &mut errors).await {
                Tick::Finished(job) => return Ok(job),
                Tick::Gone => return Err(Error::NotFound(id.to_string())),
                Tick::Active(_) if attempt < max_attempts => tokio::time::sleep(interval).await,
                Tick::Active(_) => {}
            }
        }
        Err(Error::Timeout { id: id.to_string(), attempts: max_attempts })
    }

    async fn tick(&self, id: &str, errors: &mut u32) -> Tick {
        let job = match self.inner.store.get_job(id).await {
            Ok(job) => job,
            Err(_) => return Tick::Gone,
        };
        if job.is_terminal() {
            return Tick::Finished(job);
        }

        let Some(_guard) = self.begin(id) else {
            return Tick::Active(job);
        };

        let provider = router::route_status(&job.id, Some(job.provider));
        let polled = match self.inner.registry.adapter(provider).await {
            Ok(adapter) => adapter.poll(&ProviderHandle::new(provider, job.id.clone())).await,
            Err(e) => Err(e),
        };

        match polled {
            Ok(status) => {
                *errors = 0;
                self.apply_status(&job, status).await
            }
            Err(e @ Error::Transport { .. }) => {
                *errors += 1;
                if *errors >= self.inner.settings.max_poll_errors {
                    warn!("Giving up on job {id} after {errors} failed polls: {e}");
                    self.fail(&job, &e).await
                } else {
                    warn!("Poll {errors} for job {id} failed, retrying: {e}");
                    Tick::Active(job)
                }
            }
            Err(e) => {
                warn!("Poll for job {id} failed: {e}");
                self.fail(&job, &e).await
            }
        }
    }

    fn begin(&self, id: &str) -> Option<InFlight<'_>> {
        let mut set = self.inner.in_flight.lock().ok()?;
        if !set.insert(id.to_string()) {
            return None;
        }
        Some(InFlight { set: &self.inner.in_flight, id: id.to_string() })
    }

    /// Merge `patch` against the version this poll started from. When another
    /// writer got there first the job is re-read and the patch retried, unless
    /// the job has meanwhile become terminal.
    async fn commit(&self, job: &Job, patch: JobPatch) -> Result<Job> {
        let mut version = job.version;
        let mut attempt = 1;
        loop {
            match self.inner.store.update_if_version(&job.id, version, patch.clone()).await {
                Err(Error::Conflict { found, .. }) if attempt < MAX_COMMIT_ATTEMPTS => {
                    debug!("Job {} moved to v{found} while polling, retrying", job.id);
                    let current = self.inner.store.get_job(&job.id).await?;
                    if current.is_terminal() {
                        return Ok(current);
                    }
                    version = current.version;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn apply_status(&self, job: &Job, status: ProviderStatus) -> Tick {
        match self.commit(job, status.into_patch()).await {
            Ok(updated) => classify(updated),
            Err(Error::NotFound(_)) => Tick::Gone,
            Err(e @ Error::InvalidTransition { .. }) => {
                warn!("Ignoring out-of-order status for job {}: {e}", job.id);
                Tick::Active(job.clone())
            }
            Err(e) => self.fail(job, &e).await,
        }
    }

    async fn fail(&self, job: &Job, err: &Error) -> Tick {
        match self.commit(job, JobPatch::failed(err.user_message())).await {
            Ok(updated) => classify(updated),
            Err(Error::NotFound(_)) => Tick::Gone,
            Err(e) => {
                warn!("Could not mark job {} failed: {e}", job.id);
                match self.inner.store.get_job(&job.id).await {
                    Ok(current) => classify(current),
                    Err(_) => Tick::Gone,
                }
            }
        }
    }
}

fn classify(job: Job) -> Tick {
    if job.is_terminal() { Tick::Finished(job) } else { Tick::Active(job) }
}
