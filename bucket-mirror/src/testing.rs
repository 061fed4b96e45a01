//! In-memory collaborators for tests.

use crate::scheduler::{normalize_cron, CronScheduler, JobFn, RegisterError};
use crate::storage::{KeyPage, ObjectStore, StorageError, StorageOutcome};
use crate::utils::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

/// Object store keeping buckets in memory, with paginated listings
pub struct MemoryStore {
    buckets: Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>,
    broken: Mutex<HashSet<String>>,
    page_size: usize,
    list_delay: Option<Duration>,
    list_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            broken: Mutex::new(HashSet::new()),
            page_size: 1000,
            list_delay: None,
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Make every listing take at least `delay`
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub fn create_bucket(&self, bucket: &str) {
        self.buckets.lock().unwrap().entry(bucket.to_string()).or_default();
    }

    pub fn delete_bucket(&self, bucket: &str) {
        self.buckets.lock().unwrap().remove(bucket);
    }

    /// Make probes and listings of `bucket` fail with a transport error
    pub fn break_bucket(&self, bucket: &str) {
        self.broken.lock().unwrap().insert(bucket.to_string());
    }

    pub fn insert(&self, bucket: &str, key: &str, data: &[u8]) {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.to_vec());
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.buckets.lock().unwrap().get(bucket)?.get(key).cloned()
    }

    /// Sorted keys of a bucket
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn is_broken(&self, bucket: &str) -> bool {
        self.broken.lock().unwrap().contains(bucket)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn probe_bucket(&self, bucket: &str) -> StorageOutcome<()> {
        if self.is_broken(bucket) {
            return StorageOutcome::TransportError("connection refused".to_string());
        }
        if self.buckets.lock().unwrap().contains_key(bucket) {
            StorageOutcome::Found(())
        } else {
            StorageOutcome::NotFound
        }
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> StorageOutcome<KeyPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }

        if self.is_broken(bucket) {
            return StorageOutcome::TransportError("connection reset".to_string());
        }

        let buckets = self.buckets.lock().unwrap();
        let Some(objects) = buckets.get(bucket) else {
            return StorageOutcome::NotFound;
        };

        let start = match continuation {
            Some(after) => Bound::Excluded(after),
            None => Bound::Unbounded,
        };
        let mut matching = objects
            .range((start, Bound::Unbounded))
            .map(|(key, _)| key)
            .filter(|key| key.starts_with(prefix));

        let keys: Vec<String> = matching.by_ref().take(self.page_size).cloned().collect();
        let continuation = match matching.next() {
            Some(_) => keys.last().cloned(),
            None => None,
        };

        StorageOutcome::Found(KeyPage { keys, continuation })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut body: File,
    ) -> std::result::Result<(), StorageError> {
        let mut data = Vec::new();
        body.read_to_end(&mut data)
            .await
            .map_err(|e| StorageError::Body(e.to_string()))?;

        let mut buckets = self.buckets.lock().unwrap();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::Transport(format!("NoSuchBucket: {bucket}")))?;
        objects.insert(key.to_string(), data);
        Ok(())
    }
}

/// Scheduler whose jobs only run when a test fires them
pub struct ManualScheduler {
    jobs: Mutex<Vec<JobFn>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn job_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Run every registered job once, in registration order
    pub async fn fire_all(&self) {
        let jobs = self.jobs.lock().unwrap().clone();
        for job in jobs {
            job().await;
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CronScheduler for ManualScheduler {
    async fn register(&self, schedule: &str, job: JobFn) -> std::result::Result<Uuid, RegisterError> {
        let fields = normalize_cron(schedule).split_whitespace().count();
        if !(6..=7).contains(&fields) {
            return Err(RegisterError::InvalidExpression(schedule.to_string()));
        }
        self.jobs.lock().unwrap().push(job);
        Ok(Uuid::new_v4())
    }

    async fn start(&self) -> Result<()> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}
