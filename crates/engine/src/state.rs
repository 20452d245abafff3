//! Persistent workflow-scoped state (spec §4.0 data model / §6.1).
//!
//! Loaded once at run start, mutated via `get`/`set`, flushed synchronously
//! on every write so that the *next* node that depends on it observes the
//! latest value (spec invariant 6: "persistentState writes are durable
//! before the next node starts that depends on them"). Writes for a single
//! workflow are serialized through a per-workflow-id lock: two concurrent
//! runs of the *same* workflow must not race their flushes, but runs of
//! different workflows never contend with each other.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use db::DbPool;

/// Process-global table of per-workflow write locks, shared across runs.
#[derive(Clone, Default)]
pub struct StateLocks {
    locks: Arc<DashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl StateLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, workflow_id: Uuid) -> Arc<AsyncMutex<()>> {
        self.locks
            .entry(workflow_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

/// A run's view onto its workflow's persistent state bag.
pub struct PersistentState {
    workflow_id: Uuid,
    pool: DbPool,
    locks: StateLocks,
    values: AsyncMutex<HashMap<String, Value>>,
}

impl PersistentState {
    #[must_use]
    pub fn load(
        workflow_id: Uuid,
        initial: HashMap<String, Value>,
        pool: DbPool,
        locks: StateLocks,
    ) -> Self {
        Self {
            workflow_id,
            pool,
            locks,
            values: AsyncMutex::new(initial),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().await.get(key).cloned()
    }

    /// Set `key` and flush the whole bag to the `workflows` row before
    /// returning.
    pub async fn set(&self, key: &str, value: Value) -> Result<(), db::DbError> {
        let snapshot = {
            let mut guard = self.values.lock().await;
            guard.insert(key.to_string(), value);
            guard.clone()
        };

        let workflow_lock = self.locks.lock_for(self.workflow_id);
        let _permit = workflow_lock.lock().await;
        db::repository::workflows::update_persistent_state(&self.pool, self.workflow_id, &snapshot)
            .await
    }

    pub async fn snapshot(&self) -> HashMap<String, Value> {
        self.values.lock().await.clone()
    }
}
