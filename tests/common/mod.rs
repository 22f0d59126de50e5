//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use accessor_router::accessor::{AccessorSettings, Query, Record};
use accessor_router::load::{DeviceLoadSampler, DeviceUsage, SamplerError};
use accessor_router::{AccessError, AccessResult, Accessor, AccessorRegistry, DataAccess};
use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Calls recorded as `"<accessor>.<operation>"`, shared across accessors.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Accessor whose behavior is set up front and whose calls are logged.
///
/// Reads answer with `{"from": id}`, mutations echo the record tagged with
/// `"applied_by": id`, `save_changes` returns the configured count.
#[derive(Debug)]
pub struct ScriptedAccessor {
    settings: AccessorSettings,
    connection: Mutex<String>,
    log: CallLog,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_dispose: AtomicBool,
    fail_create: AtomicBool,
    swap_limit: Option<usize>,
    swaps: AtomicUsize,
    delay: Option<Duration>,
    saved: usize,
    created: Mutex<Vec<String>>,
    migrations: AtomicUsize,
}

impl ScriptedAccessor {
    pub fn new(settings: AccessorSettings, log: &CallLog) -> Self {
        let connection = format!("memory://db/{}", settings.id);
        Self {
            settings,
            connection: Mutex::new(connection),
            log: log.clone(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_dispose: AtomicBool::new(false),
            fail_create: AtomicBool::new(false),
            swap_limit: None,
            swaps: AtomicUsize::new(0),
            delay: None,
            saved: 1,
            created: Mutex::new(Vec::new()),
            migrations: AtomicUsize::new(0),
        }
    }

    pub fn with_connection(self, connection: &str) -> Self {
        *self.connection.lock().unwrap() = connection.to_string();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_saved(mut self, saved: usize) -> Self {
        self.saved = saved;
        self
    }

    pub fn failing_reads(self) -> Self {
        self.fail_reads.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_writes(self) -> Self {
        self.fail_writes.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_dispose(self) -> Self {
        self.fail_dispose.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_create(self) -> Self {
        self.fail_create.store(true, Ordering::SeqCst);
        self
    }

    /// Reject connection changes once `limit` of them have succeeded.
    pub fn with_swap_limit(mut self, limit: usize) -> Self {
        self.swap_limit = Some(limit);
        self
    }

    /// Connection targets `try_create_database` was called for.
    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    pub fn migrations(&self) -> usize {
        self.migrations.load(Ordering::SeqCst)
    }

    async fn enter(&self, operation: &str, fail: &AtomicBool, cancel: &CancellationToken) -> AccessResult<()> {
        self.log.push(format!("{}.{}", self.settings.id, operation));
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(AccessError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if fail.load(Ordering::SeqCst) {
            return Err(AccessError::backend(&self.settings.id, format!("{operation} failed")));
        }
        Ok(())
    }

    async fn read(&self, operation: &str, cancel: &CancellationToken) -> AccessResult<()> {
        self.enter(operation, &self.fail_reads, cancel).await
    }

    async fn write(&self, operation: &str, cancel: &CancellationToken) -> AccessResult<()> {
        self.enter(operation, &self.fail_writes, cancel).await
    }

    fn tag(&self, mut record: Record) -> Record {
        if let Some(fields) = record.as_object_mut() {
            fields.insert("applied_by".into(), json!(self.settings.id));
        }
        record
    }
}

#[async_trait]
impl DataAccess for ScriptedAccessor {
    fn id(&self) -> &str {
        &self.settings.id
    }

    async fn exists(&self, _query: &Query, cancel: &CancellationToken) -> AccessResult<bool> {
        self.read("exists", cancel).await?;
        Ok(true)
    }

    async fn count(&self, _query: &Query, cancel: &CancellationToken) -> AccessResult<u64> {
        self.read("count", cancel).await?;
        Ok(1)
    }

    async fn find(&self, _query: &Query, cancel: &CancellationToken) -> AccessResult<Option<Record>> {
        self.read("find", cancel).await?;
        Ok(Some(json!({ "from": self.settings.id })))
    }

    async fn find_list(&self, _query: &Query, cancel: &CancellationToken) -> AccessResult<Vec<Record>> {
        self.read("find_list", cancel).await?;
        Ok(vec![json!({ "from": self.settings.id })])
    }

    async fn add(&self, _collection: &str, record: Record, cancel: &CancellationToken) -> AccessResult<Record> {
        self.write("add", cancel).await?;
        Ok(self.tag(record))
    }

    async fn add_range(
        &self,
        _collection: &str,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> AccessResult<Vec<Record>> {
        self.write("add_range", cancel).await?;
        Ok(records.into_iter().map(|r| self.tag(r)).collect())
    }

    async fn attach(&self, _collection: &str, record: Record, cancel: &CancellationToken) -> AccessResult<Record> {
        self.write("attach", cancel).await?;
        Ok(self.tag(record))
    }

    async fn attach_range(
        &self,
        _collection: &str,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> AccessResult<Vec<Record>> {
        self.write("attach_range", cancel).await?;
        Ok(records.into_iter().map(|r| self.tag(r)).collect())
    }

    async fn remove(&self, _collection: &str, record: Record, cancel: &CancellationToken) -> AccessResult<Record> {
        self.write("remove", cancel).await?;
        Ok(self.tag(record))
    }

    async fn remove_range(
        &self,
        _collection: &str,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> AccessResult<Vec<Record>> {
        self.write("remove_range", cancel).await?;
        Ok(records.into_iter().map(|r| self.tag(r)).collect())
    }

    async fn update(&self, _collection: &str, record: Record, cancel: &CancellationToken) -> AccessResult<Record> {
        self.write("update", cancel).await?;
        Ok(self.tag(record))
    }

    async fn update_range(
        &self,
        _collection: &str,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> AccessResult<Vec<Record>> {
        self.write("update_range", cancel).await?;
        Ok(records.into_iter().map(|r| self.tag(r)).collect())
    }

    async fn save_changes(&self, cancel: &CancellationToken) -> AccessResult<usize> {
        self.write("save_changes", cancel).await?;
        Ok(self.saved)
    }

    async fn dispose(&self) -> AccessResult<()> {
        self.log.push(format!("{}.dispose", self.settings.id));
        if self.fail_dispose.load(Ordering::SeqCst) {
            return Err(AccessError::backend(&self.settings.id, "dispose failed"));
        }
        Ok(())
    }
}

#[async_trait]
impl Accessor for ScriptedAccessor {
    fn settings(&self) -> &AccessorSettings {
        &self.settings
    }

    fn connection(&self) -> String {
        self.connection.lock().unwrap().clone()
    }

    fn change_connection(&self, connection: &str) -> AccessResult<()> {
        let swaps = self.swaps.fetch_add(1, Ordering::SeqCst);
        if self.swap_limit.is_some_and(|limit| swaps >= limit) {
            return Err(AccessError::backend(&self.settings.id, "connection locked"));
        }
        *self.connection.lock().unwrap() = connection.to_string();
        Ok(())
    }

    async fn try_create_database(&self, _cancel: &CancellationToken) -> AccessResult<bool> {
        let target = self.connection();
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(AccessError::backend(&self.settings.id, "create failed"));
        }
        let mut created = self.created.lock().unwrap();
        let fresh = !created.contains(&target);
        created.push(target);
        Ok(fresh)
    }

    async fn migrate(&self, _cancel: &CancellationToken) -> AccessResult<()> {
        self.migrations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Build a registry from scripted accessors.
pub fn registry(accessors: &[Arc<ScriptedAccessor>]) -> AccessorRegistry {
    let mut registry = AccessorRegistry::new();
    for accessor in accessors {
        registry.register(accessor.clone());
    }
    registry
}

/// Sampler answering from a fixed table, counting every sample taken.
#[derive(Debug, Default)]
pub struct FixedSampler {
    usages: HashMap<String, DeviceUsage>,
    samples: AtomicUsize,
}

impl FixedSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_usage(mut self, usage: DeviceUsage) -> Self {
        self.usages.insert(usage.host.clone(), usage);
        self
    }

    pub fn samples(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceLoadSampler for FixedSampler {
    async fn sample(&self, host: &str) -> Result<DeviceUsage, SamplerError> {
        self.samples.fetch_add(1, Ordering::SeqCst);
        self.usages
            .get(host)
            .cloned()
            .ok_or_else(|| SamplerError::UnknownHost(host.to_string()))
    }
}
