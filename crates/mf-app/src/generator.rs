use std::sync::Arc;

use futures::future::join_all;
use log::{info, warn};
use mf_core::description;
use mf_core::{Error, ImageSource, Job, JobInputs, JobKind, Provider, ProviderHandle, ProviderStatus, Result};
use mf_providers::{ImageAnalysis, Row, openai};
use serde_json::Value;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::generator::db::{JobDatabase, JobStore};
use crate::generator::finalize::FinalizeGateway;
use crate::generator::registry::ProviderRegistry;
use crate::generator::scheduler::{PollScheduler, PollSettings};

pub mod db;
pub mod finalize;
pub mod registry;
pub mod router;
pub mod scheduler;
#[cfg(test)]
pub(crate) mod testing;

/// Owns every job this process knows about and the providers behind them.
pub struct Generator {
    registry: Arc<ProviderRegistry>,
    db: Arc<dyn JobStore>,
    scheduler: PollScheduler,
    finalize: FinalizeGateway,
}

impl Generator {
    pub fn new(registry: ProviderRegistry, polling: PollSettings) -> Self {
        let registry = Arc::new(registry);
        let db: Arc<dyn JobStore> = Arc::new(JobDatabase::new());
        let scheduler = PollScheduler::new(db.clone(), registry.clone(), polling);
        let finalize = FinalizeGateway::new(registry.record_store().clone(), registry.settings().rows_cache_ttl);

        Self { registry, db, scheduler, finalize }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let registry = ProviderRegistry::new(config.providers.clone())?;
        Ok(Self::new(registry, config.polling.clone()))
    }

    /// Submit a new job of `kind` to every provider that serves it.
    ///
    /// Each submission settles on its own: a rejected one is recorded as a
    /// failed job and never prevents the others from being created and
    /// polled. Nothing is submitted when the inputs are invalid.
    pub async fn create_job(&self, kind: JobKind, inputs: JobInputs, row_id: Option<String>) -> Result<Vec<Job>> {
        validate_inputs(kind, &inputs)?;

        let providers = router::route_submit(kind);
        let outcomes = join_all(providers.iter().map(|&provider| self.submit_to(provider, &inputs))).await;

        let mut jobs = Vec::with_capacity(outcomes.len());
        for (&provider, outcome) in providers.iter().zip(outcomes) {
            let job = match outcome {
                Ok(id) => Job::new(id, provider, inputs.clone()),
                Err(e) => {
                    warn!("{} submission failed: {e}", provider.name());
                    Job::failed_submission(Uuid::new_v4().to_string(), provider, inputs.clone(), e.user_message())
                }
            }
            .with_row(row_id.clone());

            let job = match self.db.insert_job(job.clone()).await {
                Ok(()) => job,
                Err(e) => self.record_unstored(job, e).await,
            };
            self.scheduler.watch(&job);
            jobs.push(job);
        }

        Ok(jobs)
    }

    /// A submission went through but its job could not be stored, most likely
    /// because another provider handed out the same id. Keep a failed job
    /// under a fresh id so the outcome is still visible.
    async fn record_unstored(&self, job: Job, err: Error) -> Job {
        let message = format!("could not record {} job {}: {}", job.provider.name(), job.id, err.user_message());
        warn!("{message}");
        let failed = Job::failed_submission(Uuid::new_v4().to_string(), job.provider, job.input_params, message)
            .with_row(job.row_id);
        if let Err(e) = self.db.insert_job(failed.clone()).await {
            warn!("Could not record failed job {}: {e}", failed.id);
        }
        failed
    }

    /// Run an image job again with an edited prompt, for the same row and
    /// size. The original job is left as it is.
    pub async fn rebuild_image_job(&self, id: &str, prompt: &str) -> Result<Job> {
        if prompt.trim().is_empty() {
            return Err(Error::required("prompt"));
        }
        let job = self.db.get_job(id).await?;
        if job.kind != JobKind::ImageGeneration {
            return Err(Error::validation(format!("job {id} is not an image job")));
        }

        let inputs = JobInputs::image(prompt, job.input_params.size.clone());
        let rebuilt = self.create_job(JobKind::ImageGeneration, inputs, job.row_id).await?;
        info!("Rebuilt image job {id}");
        rebuilt.into_iter().next().ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Submit to a single provider, surfacing a rejection to the caller
    /// instead of recording it.
    pub async fn submit_single(&self, provider: Provider, inputs: JobInputs) -> Result<Job> {
        validate_inputs(provider.kind(), &inputs)?;

        let id = self.submit_to(provider, &inputs).await?;
        let job = Job::new(id, provider, inputs);
        self.db.insert_job(job.clone()).await?;
        self.scheduler.watch(&job);
        Ok(job)
    }

    async fn submit_to(&self, provider: Provider, inputs: &JobInputs) -> Result<String> {
        let adapter = self.registry.adapter(provider).await?;
        let handle = adapter.submit(inputs).await?;
        info!("Submitted {} job {}", provider.name(), handle.id);
        Ok(handle.id)
    }

    pub async fn get_job(&self, id: &str) -> Result<Job> {
        self.db.get_job(id).await
    }

    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.db.get_all_jobs().await
    }

    /// Current status of a video task.
    ///
    /// Known jobs are refreshed through the scheduler so the store stays the
    /// source of truth. Unknown ids are routed by their shape alone and
    /// polled directly.
    pub async fn video_status(&self, task_id: &str) -> Result<ProviderStatus> {
        if task_id.trim().is_empty() {
            return Err(Error::required("taskId"));
        }

        match self.db.get_job(task_id).await {
            Ok(job) if job.is_terminal() => Ok(status_of(job)),
            Ok(_) => self.scheduler.poll_once(task_id).await.map(status_of),
            Err(Error::NotFound(_)) => {
                let provider = router::route_status(task_id, None);
                let adapter = self.registry.adapter(provider).await?;
                adapter.poll(&ProviderHandle::new(provider, task_id)).await
            }
            Err(e) => Err(e),
        }
    }

    /// Stop polling a job. Its last known state stays in the store.
    pub async fn stop_watching(&self, id: &str) -> Result<bool> {
        self.db.get_job(id).await?;
        Ok(self.scheduler.unwatch(id))
    }

    pub async fn clear_completed(&self) -> Result<usize> {
        let cleared = self.db.clear_completed().await?;
        info!("Cleared {cleared} finished job(s)");
        Ok(cleared)
    }

    pub async fn poll_until_terminal(&self, id: &str, max_attempts: u32) -> Result<Job> {
        self.scheduler.poll_until_terminal(id, max_attempts).await
    }

    /// Generate one image synchronously and return its URL.
    pub async fn generate_image(&self, prompt: &str, size: Option<&str>) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(Error::required("prompt"));
        }
        let size = openai::validate_size(size)?;
        self.registry.openai().await?.generate_image(prompt, Some(size)).await
    }

    pub async fn analyze_image(&self, image_url: &str) -> Result<ImageAnalysis> {
        if image_url.trim().is_empty() {
            return Err(Error::required("imageUrl"));
        }
        self.registry.analyzer().await?.analyze_image(image_url).await
    }

    pub async fn convert_to_prompt(&self, yaml: &str) -> Result<String> {
        description::validate(yaml)?;
        self.registry.analyzer().await?.convert_to_prompt(yaml).await
    }

    pub async fn rows(&self) -> Result<Vec<Row>> {
        self.finalize.rows().await
    }

    pub async fn finalize(&self, row_id: &str, video_url: &str) -> Result<Value> {
        self.finalize.finalize(row_id, video_url).await
    }

    /// Finalize a completed job onto the row it was created for.
    pub async fn finalize_job(&self, id: &str) -> Result<Value> {
        let job = self.db.get_job(id).await?;
        let (Some(row_id), Some(url)) = (job.row_id.as_deref(), job.result_url.as_deref()) else {
            return Err(Error::validation(format!("job {id} has no completed result for a row")));
        };
        self.finalize.finalize(row_id, url).await
    }

    pub fn shutdown(&self) {
        info!("Stopping all pollers");
        self.scheduler.shutdown();
    }
}

fn validate_inputs(kind: JobKind, inputs: &JobInputs) -> Result<()> {
    match kind {
        JobKind::ImageGeneration => {
            openai::validate_size(inputs.size.as_deref())?;
        }
        JobKind::VideoGeneration => {
            ImageSource::parse(inputs.image_url.as_deref().unwrap_or_default())?;
        }
    }
    if inputs.prompt.trim().is_empty() {
        return Err(Error::required("prompt"));
    }
    Ok(())
}

fn status_of(job: Job) -> ProviderStatus {
    ProviderStatus {
        status: job.status,
        progress: job.progress,
        result_url: job.result_url,
        error: job.error_message,
    }
}
