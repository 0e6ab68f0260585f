use std::collections::HashMap;

use async_trait::async_trait;
use log::debug;
use mf_core::{Error, Job, JobPatch, Result};
use tokio::sync::RwLock;

/// Source of truth for job state.
///
/// Updates are merges, never replacements. Implementations backed by a
/// shared database must scope `update_if_version` to the job id so that two
/// orchestrator instances polling the same job cannot clobber each other.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: Job) -> Result<()>;

    /// Merge `patch` into the stored job and return the result.
    async fn update_job(&self, id: &str, patch: JobPatch) -> Result<Job>;

    /// Like [`JobStore::update_job`] but fails with `Conflict` unless the
    /// stored version still equals `expected`.
    async fn update_if_version(&self, id: &str, expected: u64, patch: JobPatch) -> Result<Job>;

    async fn get_job(&self, id: &str) -> Result<Job>;

    /// All jobs, most recently created first.
    async fn get_all_jobs(&self) -> Result<Vec<Job>>;

    /// Remove terminal jobs, returning how many were dropped.
    async fn clear_completed(&self) -> Result<usize>;
}

#[derive(Debug)]
struct Entry {
    seq: u64,
    job: Job,
}

/// In-process store holding the current session's jobs.
#[derive(Debug, Default)]
pub struct JobDatabase {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    jobs: HashMap<String, Entry>,
}

impl JobDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    async fn merge(&self, id: &str, expected: Option<u64>, patch: JobPatch) -> Result<Job> {
        let mut inner = self.inner.write().await;
        let entry = inner.jobs.get_mut(id).ok_or_else(|| Error::NotFound(id.to_string()))?;

        if let Some(expected) = expected {
            if entry.job.version != expected {
                return Err(Error::Conflict { id: id.to_string(), expected, found: entry.job.version });
            }
        }

        // Apply to a copy so a rejected patch leaves the stored job untouched.
        let mut job = entry.job.clone();
        if job.apply(patch)? {
            debug!("Job {id} now {} (v{})", job.status.as_str(), job.version);
            entry.job = job.clone();
        }
        Ok(job)
    }
}

#[async_trait]
impl JobStore for JobDatabase {
    async fn insert_job(&self, job: Job) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.jobs.get(&job.id) {
            return Err(Error::Conflict { id: job.id.clone(), expected: 0, found: existing.job.version });
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.jobs.insert(job.id.clone(), Entry { seq, job });
        Ok(())
    }

    async fn update_job(&self, id: &str, patch: JobPatch) -> Result<Job> {
        self.merge(id, None, patch).await
    }

    async fn update_if_version(&self, id: &str, expected: u64, patch: JobPatch) -> Result<Job> {
        self.merge(id, Some(expected), patch).await
    }

    async fn get_job(&self, id: &str) -> Result<Job> {
        self.inner
            .read()
            .await
            .jobs
            .get(id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn get_all_jobs(&self) -> Result<Vec<Job>> {
        let inner = self.inner.read().await;
        let mut entries: Vec<&Entry> = inner.jobs.values().collect();
        entries.sort_by(|a, b| {
            b.job
                .created_at
                .cmp(&a.job.created_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        Ok(entries.into_iter().map(|entry| entry.job.clone()).collect())
    }

    async fn clear_completed(&self) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let before = inner.jobs.len();
        inner.jobs.retain(|_, entry| !entry.job.is_terminal());
        Ok(before - inner.jobs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_core::{JobInputs, JobStatus, Provider};

    fn job(id: &str) -> Job {
        Job::new(id, Provider::VideoModelB, JobInputs::video("https://x/y.png", "pan", None))
    }

    fn processing(progress: Option<u8>) -> JobPatch {
        JobPatch { status: Some(JobStatus::Processing), progress, ..Default::default() }
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let db = JobDatabase::new();
        assert_eq!(db.get_job("nope").await.unwrap_err(), Error::NotFound("nope".into()));
        assert!(matches!(db.update_job("nope", JobPatch::default()).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let db = JobDatabase::new();
        let mut older = job("a");
        older.created_at -= chrono::Duration::seconds(10);
        db.insert_job(older).await.unwrap();
        db.insert_job(job("b")).await.unwrap();
        db.insert_job(job("c")).await.unwrap();

        let ids: Vec<String> = db.get_all_jobs().await.unwrap().into_iter().map(|j| j.id).collect();
        assert_eq!(ids[2], "a");
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn test_same_timestamp_falls_back_to_insertion_order() {
        let db = JobDatabase::new();
        let first = job("first");
        let mut second = job("second");
        second.created_at = first.created_at;
        db.insert_job(first).await.unwrap();
        db.insert_job(second).await.unwrap();

        let ids: Vec<String> = db.get_all_jobs().await.unwrap().into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let db = JobDatabase::new();
        db.insert_job(job("a")).await.unwrap();
        db.update_job("a", processing(Some(50))).await.unwrap();
        let updated = db.update_job("a", processing(None)).await.unwrap();
        assert_eq!(updated.progress, Some(50));
        assert_eq!(db.get_job("a").await.unwrap().progress, Some(50));
    }

    #[tokio::test]
    async fn test_rejected_patch_leaves_job_untouched() {
        let db = JobDatabase::new();
        db.insert_job(job("a")).await.unwrap();
        db.update_job("a", JobPatch::failed("boom")).await.unwrap();
        assert!(db.update_job("a", processing(Some(10))).await.is_err());
        let stored = db.get_job("a").await.unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_optimistic_update_detects_conflict() {
        let db = JobDatabase::new();
        db.insert_job(job("a")).await.unwrap();
        let seen = db.get_job("a").await.unwrap().version;

        db.update_if_version("a", seen, processing(Some(10))).await.unwrap();
        let err = db.update_if_version("a", seen, processing(Some(20))).await.unwrap_err();
        assert_eq!(err, Error::Conflict { id: "a".into(), expected: seen, found: seen + 1 });
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_conflict() {
        let db = JobDatabase::new();
        db.insert_job(job("a")).await.unwrap();
        assert!(matches!(db.insert_job(job("a")).await, Err(Error::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_clear_completed_keeps_active_jobs() {
        let db = JobDatabase::new();
        db.insert_job(job("active")).await.unwrap();
        db.insert_job(job("done")).await.unwrap();
        db.update_job("done", JobPatch::failed("x")).await.unwrap();

        assert_eq!(db.clear_completed().await.unwrap(), 1);
        assert!(db.get_job("active").await.is_ok());
        assert!(db.get_job("done").await.is_err());
        assert_eq!(db.get_all_jobs().await.unwrap().len(), 1);
    }
}
