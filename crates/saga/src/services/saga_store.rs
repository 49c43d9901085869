//! Saga persistence.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{SagaId, Version};
use tokio::sync::RwLock;

use crate::aggregate::OrderFulfillmentSaga;
use crate::error::{Result, SagaError};

/// Durable store for saga documents.
#[async_trait]
pub trait SagaRepository: Send + Sync {
    /// Saves the saga if the stored version still equals `saga.version()`.
    ///
    /// Returns the new version. A saga at `Version::initial()` must not exist
    /// yet.
    async fn save(&self, saga: &OrderFulfillmentSaga) -> Result<Version>;

    /// Loads a saga by id, or `NotFound`.
    async fn find_by_id(&self, saga_id: SagaId) -> Result<OrderFulfillmentSaga>;
}

struct StoredSaga {
    version: Version,
    document: serde_json::Value,
}

/// In-memory saga store keeping each saga as a JSON document.
#[derive(Clone, Default)]
pub struct InMemorySagaRepository {
    sagas: Arc<RwLock<HashMap<SagaId, StoredSaga>>>,
    fail_on_save: Arc<AtomicBool>,
}

impl InMemorySagaRepository {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures save calls to fail.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.fail_on_save.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of stored sagas.
    pub async fn saga_count(&self) -> usize {
        self.sagas.read().await.len()
    }
}

#[async_trait]
impl SagaRepository for InMemorySagaRepository {
    async fn save(&self, saga: &OrderFulfillmentSaga) -> Result<Version> {
        if self.fail_on_save.load(Ordering::SeqCst) {
            return Err(SagaError::Repository("saga store unavailable".to_string()));
        }

        let document = serde_json::to_value(saga)?;
        let mut sagas = self.sagas.write().await;

        let current = sagas
            .get(&saga.id())
            .map(|s| s.version)
            .unwrap_or_else(Version::initial);
        if current != saga.version() {
            return Err(SagaError::ConcurrencyConflict {
                saga_id: saga.id(),
                expected: saga.version(),
                actual: current,
            });
        }

        let version = current.next();
        sagas.insert(saga.id(), StoredSaga { version, document });
        Ok(version)
    }

    async fn find_by_id(&self, saga_id: SagaId) -> Result<OrderFulfillmentSaga> {
        let sagas = self.sagas.read().await;
        let stored = sagas.get(&saga_id).ok_or(SagaError::NotFound(saga_id))?;

        let mut saga: OrderFulfillmentSaga = serde_json::from_value(stored.document.clone())?;
        saga.set_version(stored.version);
        Ok(saga)
    }
}
