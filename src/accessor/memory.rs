//! In-process accessor backed by hash maps.
//!
//! # Responsibilities
//! - Keep one independent store per connection target
//! - Stage mutations and apply them atomically on `save_changes`
//! - Refuse to touch targets that were never created
//! - Track a schema version that `migrate` brings up to date

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::accessor::{Accessor, AccessorSettings, DataAccess, Query, Record};
use crate::error::{AccessError, AccessResult};

/// Schema version `migrate` brings every store to.
pub const MEMORY_SCHEMA_VERSION: u32 = 1;

/// Field used to identify records for update and remove.
const ID_FIELD: &str = "id";

#[derive(Debug, Clone, Default)]
struct MemoryStore {
    collections: HashMap<String, Vec<Record>>,
    schema_version: u32,
}

#[derive(Debug, Clone)]
enum Change {
    Insert { collection: String, record: Record },
    Upsert { collection: String, record: Record },
    Update { collection: String, record: Record },
    Delete { collection: String, record: Record },
}

/// A complete accessor that keeps its data in memory.
#[derive(Debug)]
pub struct MemoryAccessor {
    settings: AccessorSettings,
    connection: RwLock<String>,
    stores: DashMap<String, MemoryStore>,
    pending: Mutex<Vec<Change>>,
    disposed: AtomicBool,
}

impl MemoryAccessor {
    /// Create an accessor whose initial store at `connection` already exists.
    pub fn new(settings: AccessorSettings, connection: impl Into<String>) -> Self {
        let connection = connection.into();
        let stores = DashMap::new();
        stores.insert(connection.clone(), MemoryStore::default());
        Self {
            settings,
            connection: RwLock::new(connection),
            stores,
            pending: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        }
    }

    /// Returns true if a store exists at `target`.
    pub fn has_store(&self, target: &str) -> bool {
        self.stores.contains_key(target)
    }

    /// Schema version of the store at the current connection.
    pub fn schema_version(&self) -> Option<u32> {
        self.stores
            .get(&self.connection())
            .map(|store| store.schema_version)
    }

    /// Number of staged, uncommitted mutations.
    pub fn pending_changes(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Relaxed)
    }

    fn check(&self, cancel: &CancellationToken) -> AccessResult<()> {
        if cancel.is_cancelled() {
            return Err(AccessError::Cancelled);
        }
        if self.is_disposed() {
            return Err(AccessError::backend(&self.settings.id, "accessor disposed"));
        }
        Ok(())
    }

    fn read<T>(
        &self,
        query: &Query,
        cancel: &CancellationToken,
        f: impl FnOnce(Vec<&Record>) -> T,
    ) -> AccessResult<T> {
        self.check(cancel)?;
        let target = self.connection();
        let store = self.stores.get(&target).ok_or_else(|| AccessError::MissingStore {
            accessor: self.settings.id.clone(),
            target: target.clone(),
        })?;
        let matches: Vec<&Record> = store
            .collections
            .get(&query.collection)
            .map(|records| {
                let iter = records.iter().filter(|r| query.matches(r));
                match query.limit {
                    Some(limit) => iter.take(limit).collect(),
                    None => iter.collect(),
                }
            })
            .unwrap_or_default();
        Ok(f(matches))
    }

    fn stage(&self, cancel: &CancellationToken, changes: Vec<Change>) -> AccessResult<()> {
        self.check(cancel)?;
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(changes);
        Ok(())
    }

    fn apply(&self, store: &mut MemoryStore, change: Change) -> AccessResult<usize> {
        match change {
            Change::Insert { collection, record } => {
                let records = store.collections.entry(collection.clone()).or_default();
                if let Some(id) = record.get(ID_FIELD) {
                    if records.iter().any(|r| r.get(ID_FIELD) == Some(id)) {
                        return Err(AccessError::backend(
                            &self.settings.id,
                            format!("duplicate id {} in '{}'", id, collection),
                        ));
                    }
                }
                records.push(record);
                Ok(1)
            }
            Change::Upsert { collection, record } => {
                let records = store.collections.entry(collection).or_default();
                match position(records, &record) {
                    Some(index) => records[index] = record,
                    None => records.push(record),
                }
                Ok(1)
            }
            Change::Update { collection, record } => {
                let records = store.collections.entry(collection).or_default();
                match position(records, &record) {
                    Some(index) => {
                        records[index] = record;
                        Ok(1)
                    }
                    None => Ok(0),
                }
            }
            Change::Delete { collection, record } => {
                let records = store.collections.entry(collection).or_default();
                match position(records, &record) {
                    Some(index) => {
                        records.remove(index);
                        Ok(1)
                    }
                    None => Ok(0),
                }
            }
        }
    }
}

/// Locate a record by id, or by full equality when it has no id.
fn position(records: &[Record], record: &Record) -> Option<usize> {
    match record.get(ID_FIELD) {
        Some(id) => records.iter().position(|r| r.get(ID_FIELD) == Some(id)),
        None => records.iter().position(|r| r == record),
    }
}

fn changes(
    collection: &str,
    records: &[Record],
    make: fn(String, Record) -> Change,
) -> Vec<Change> {
    records
        .iter()
        .map(|record| make(collection.to_string(), record.clone()))
        .collect()
}

fn insert(collection: String, record: Record) -> Change {
    Change::Insert { collection, record }
}

fn upsert(collection: String, record: Record) -> Change {
    Change::Upsert { collection, record }
}

fn update(collection: String, record: Record) -> Change {
    Change::Update { collection, record }
}

fn delete(collection: String, record: Record) -> Change {
    Change::Delete { collection, record }
}

#[async_trait]
impl DataAccess for MemoryAccessor {
    fn id(&self) -> &str {
        &self.settings.id
    }

    async fn exists(&self, query: &Query, cancel: &CancellationToken) -> AccessResult<bool> {
        self.read(query, cancel, |matches| !matches.is_empty())
    }

    async fn count(&self, query: &Query, cancel: &CancellationToken) -> AccessResult<u64> {
        self.read(query, cancel, |matches| matches.len() as u64)
    }

    async fn find(&self, query: &Query, cancel: &CancellationToken) -> AccessResult<Option<Record>> {
        self.read(query, cancel, |matches| matches.first().map(|r| (*r).clone()))
    }

    async fn find_list(&self, query: &Query, cancel: &CancellationToken) -> AccessResult<Vec<Record>> {
        self.read(query, cancel, |matches| matches.into_iter().cloned().collect())
    }

    async fn add(&self, collection: &str, record: Record, cancel: &CancellationToken) -> AccessResult<Record> {
        self.stage(cancel, vec![insert(collection.to_string(), record.clone())])?;
        Ok(record)
    }

    async fn add_range(
        &self,
        collection: &str,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> AccessResult<Vec<Record>> {
        self.stage(cancel, changes(collection, &records, insert))?;
        Ok(records)
    }

    async fn attach(&self, collection: &str, record: Record, cancel: &CancellationToken) -> AccessResult<Record> {
        self.stage(cancel, vec![upsert(collection.to_string(), record.clone())])?;
        Ok(record)
    }

    async fn attach_range(
        &self,
        collection: &str,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> AccessResult<Vec<Record>> {
        self.stage(cancel, changes(collection, &records, upsert))?;
        Ok(records)
    }

    async fn remove(&self, collection: &str, record: Record, cancel: &CancellationToken) -> AccessResult<Record> {
        self.stage(cancel, vec![delete(collection.to_string(), record.clone())])?;
        Ok(record)
    }

    async fn remove_range(
        &self,
        collection: &str,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> AccessResult<Vec<Record>> {
        self.stage(cancel, changes(collection, &records, delete))?;
        Ok(records)
    }

    async fn update(&self, collection: &str, record: Record, cancel: &CancellationToken) -> AccessResult<Record> {
        self.stage(cancel, vec![update(collection.to_string(), record.clone())])?;
        Ok(record)
    }

    async fn update_range(
        &self,
        collection: &str,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> AccessResult<Vec<Record>> {
        self.stage(cancel, changes(collection, &records, update))?;
        Ok(records)
    }

    async fn save_changes(&self, cancel: &CancellationToken) -> AccessResult<usize> {
        self.check(cancel)?;
        let target = self.connection();
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let mut store = self.stores.get_mut(&target).ok_or_else(|| AccessError::MissingStore {
            accessor: self.settings.id.clone(),
            target: target.clone(),
        })?;

        // Apply to a copy so a failing change leaves the store untouched
        let mut staged = store.clone();
        let mut affected = 0;
        for change in pending.iter().cloned() {
            affected += self.apply(&mut staged, change)?;
        }
        *store = staged;
        pending.clear();

        tracing::debug!(accessor = %self.settings.id, target = %target, affected, "Changes saved");
        Ok(affected)
    }

    async fn dispose(&self) -> AccessResult<()> {
        self.disposed.store(true, Ordering::Relaxed);
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).clear();
        Ok(())
    }
}

#[async_trait]
impl Accessor for MemoryAccessor {
    fn settings(&self) -> &AccessorSettings {
        &self.settings
    }

    fn connection(&self) -> String {
        self.connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn change_connection(&self, connection: &str) -> AccessResult<()> {
        if self.is_disposed() {
            return Err(AccessError::backend(&self.settings.id, "accessor disposed"));
        }
        *self.connection.write().unwrap_or_else(PoisonError::into_inner) = connection.to_string();
        Ok(())
    }

    async fn try_create_database(&self, cancel: &CancellationToken) -> AccessResult<bool> {
        self.check(cancel)?;
        let target = self.connection();
        let created = !self.stores.contains_key(&target);
        self.stores.entry(target).or_default();
        Ok(created)
    }

    async fn migrate(&self, cancel: &CancellationToken) -> AccessResult<()> {
        self.check(cancel)?;
        let target = self.connection();
        let mut store = self.stores.get_mut(&target).ok_or_else(|| AccessError::MissingStore {
            accessor: self.settings.id.clone(),
            target: target.clone(),
        })?;
        store.schema_version = store.schema_version.max(MEMORY_SCHEMA_VERSION);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn accessor() -> MemoryAccessor {
        MemoryAccessor::new(AccessorSettings::new("mem"), "memory://main")
    }

    #[tokio::test]
    async fn test_mutations_are_staged_until_saved() {
        let acc = accessor();
        let cancel = CancellationToken::new();
        let query = Query::new("users").eq("id", 1);

        acc.add("users", json!({"id": 1, "name": "ada"}), &cancel).await.unwrap();
        assert_eq!(acc.pending_changes(), 1);
        assert!(!acc.exists(&query, &cancel).await.unwrap());

        assert_eq!(acc.save_changes(&cancel).await.unwrap(), 1);
        assert_eq!(acc.pending_changes(), 0);
        let found = acc.find(&query, &cancel).await.unwrap().unwrap();
        assert_eq!(found["name"], "ada");
    }

    #[tokio::test]
    async fn test_update_and_remove() {
        let acc = accessor();
        let cancel = CancellationToken::new();
        acc.add_range("users", vec![json!({"id": 1, "v": 1}), json!({"id": 2, "v": 1})], &cancel)
            .await
            .unwrap();
        acc.save_changes(&cancel).await.unwrap();

        acc.update("users", json!({"id": 1, "v": 2}), &cancel).await.unwrap();
        acc.remove("users", json!({"id": 2}), &cancel).await.unwrap();
        assert_eq!(acc.save_changes(&cancel).await.unwrap(), 2);

        let all = acc.find_list(&Query::new("users"), &cancel).await.unwrap();
        assert_eq!(all, vec![json!({"id": 1, "v": 2})]);
        assert_eq!(acc.count(&Query::new("users"), &cancel).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_save_is_atomic() {
        let acc = accessor();
        let cancel = CancellationToken::new();
        acc.add("users", json!({"id": 1}), &cancel).await.unwrap();
        acc.save_changes(&cancel).await.unwrap();

        acc.add("users", json!({"id": 2}), &cancel).await.unwrap();
        acc.add("users", json!({"id": 1}), &cancel).await.unwrap();
        assert!(acc.save_changes(&cancel).await.is_err());
        assert_eq!(acc.count(&Query::new("users"), &cancel).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_store_after_connection_change() {
        let acc = accessor();
        let cancel = CancellationToken::new();
        acc.change_connection("memory://other").unwrap();

        let err = acc.exists(&Query::new("users"), &cancel).await.unwrap_err();
        assert!(matches!(err, AccessError::MissingStore { .. }));

        assert!(acc.try_create_database(&cancel).await.unwrap());
        assert!(!acc.try_create_database(&cancel).await.unwrap());
        assert!(!acc.exists(&Query::new("users"), &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let acc = accessor();
        let cancel = CancellationToken::new();
        assert_eq!(acc.schema_version(), Some(0));
        acc.migrate(&cancel).await.unwrap();
        acc.migrate(&cancel).await.unwrap();
        assert_eq!(acc.schema_version(), Some(MEMORY_SCHEMA_VERSION));
    }

    #[tokio::test]
    async fn test_cancelled_and_disposed() {
        let acc = accessor();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = acc.count(&Query::new("users"), &cancel).await.unwrap_err();
        assert!(matches!(err, AccessError::Cancelled));

        let cancel = CancellationToken::new();
        acc.dispose().await.unwrap();
        assert!(acc.is_disposed());
        assert!(acc.count(&Query::new("users"), &cancel).await.is_err());
    }
}
