//! Scriptable adapter used by the orchestrator tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mf_core::{Error, JobInputs, Provider, ProviderHandle, ProviderStatus, Result};
use mf_providers::ProviderAdapter;

pub struct FakeAdapter {
    provider: Provider,
    submits: Mutex<VecDeque<Result<String>>>,
    polls: Mutex<HashMap<String, VecDeque<Result<ProviderStatus>>>>,
    poll_counts: Mutex<HashMap<String, usize>>,
    submitted: Mutex<Vec<JobInputs>>,
    poll_delay: Duration,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl FakeAdapter {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            submits: Mutex::default(),
            polls: Mutex::default(),
            poll_counts: Mutex::default(),
            submitted: Mutex::default(),
            poll_delay: Duration::ZERO,
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }

    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    /// Queue the outcome of the next `submit` call.
    pub fn script_submit(&self, result: Result<&str>) {
        self.submits.lock().unwrap().push_back(result.map(str::to_string));
    }

    /// Statuses returned by successive polls of `id`; the last one repeats.
    pub fn script_polls(&self, id: &str, statuses: Vec<Result<ProviderStatus>>) {
        self.polls.lock().unwrap().insert(id.to_string(), statuses.into());
    }

    pub fn poll_count(&self, id: &str) -> usize {
        self.poll_counts.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn max_concurrent_polls(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<JobInputs> {
        self.submitted.lock().unwrap().clone()
    }

    fn next_status(&self, id: &str) -> Result<ProviderStatus> {
        let mut polls = self.polls.lock().unwrap();
        let Some(queue) = polls.get_mut(id) else {
            return Err(Error::rejected(self.provider, format!("unknown task {id}")));
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn submit(&self, inputs: &JobInputs) -> Result<ProviderHandle> {
        self.submitted.lock().unwrap().push(inputs.clone());
        let next = self.submits.lock().unwrap().pop_front();
        let id = next.unwrap_or_else(|| Ok(format!("{}-task", self.provider.id())))?;
        Ok(ProviderHandle::new(self.provider, id))
    }

    async fn poll(&self, handle: &ProviderHandle) -> Result<ProviderStatus> {
        *self.poll_counts.lock().unwrap().entry(handle.id.clone()).or_default() += 1;
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);

        if !self.poll_delay.is_zero() {
            tokio::time::sleep(self.poll_delay).await;
        }
        let status = self.next_status(&handle.id);

        self.running.fetch_sub(1, Ordering::SeqCst);
        status
    }
}
