//! Key-addressed transaction store contract and in-memory implementation.
//!
//! The contract is what matters: create-once, get-by-id, atomic transition,
//! and a `customer_reference -> transaction_id` secondary index maintained
//! on create. Any durable backend honouring it can replace the in-memory
//! store without touching the ledger.

use crate::error::{CoreError, CoreResult};
use crate::ledger::transaction::{Transaction, TransactionStatus, TransitionPatch};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert a new record. Fails with `DuplicateId` if the id exists;
    /// never silently overwrites.
    async fn insert(&self, transaction: Transaction) -> CoreResult<Transaction>;

    async fn get(&self, id: &str) -> CoreResult<Option<Transaction>>;

    async fn list_by_merchant(&self, merchant_id: &str) -> CoreResult<Vec<Transaction>>;

    /// Apply a status transition as a single atomic operation. The
    /// terminal-state check and the update happen under one critical
    /// section so concurrent deliveries cannot both finalize.
    async fn transition(
        &self,
        id: &str,
        new_status: TransactionStatus,
        patch: TransitionPatch,
    ) -> CoreResult<Transaction>;

    /// O(1) lookup through the customer-reference index.
    async fn find_by_customer_reference(&self, reference: &str)
        -> CoreResult<Option<Transaction>>;
}

#[derive(Default)]
struct StoreInner {
    transactions: HashMap<String, Transaction>,
    // customer_reference -> transaction id
    reference_index: HashMap<String, String>,
}

/// In-memory store. Insertion order is preserved in ids for test
/// determinism only at the level of the secondary structures; listing
/// sorts by creation time.
#[derive(Default)]
pub struct InMemoryTransactionStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn insert(&self, transaction: Transaction) -> CoreResult<Transaction> {
        let mut inner = self.inner.write().await;
        if inner.transactions.contains_key(&transaction.id) {
            return Err(CoreError::DuplicateId {
                id: transaction.id.clone(),
            });
        }
        if inner
            .reference_index
            .contains_key(&transaction.customer_reference)
        {
            return Err(CoreError::DuplicateReference {
                reference: transaction.customer_reference.clone(),
            });
        }

        inner.reference_index.insert(
            transaction.customer_reference.clone(),
            transaction.id.clone(),
        );
        inner
            .transactions
            .insert(transaction.id.clone(), transaction.clone());
        Ok(transaction)
    }

    async fn get(&self, id: &str) -> CoreResult<Option<Transaction>> {
        Ok(self.inner.read().await.transactions.get(id).cloned())
    }

    async fn list_by_merchant(&self, merchant_id: &str) -> CoreResult<Vec<Transaction>> {
        let inner = self.inner.read().await;
        let mut matching: Vec<Transaction> = inner
            .transactions
            .values()
            .filter(|t| t.merchant_id == merchant_id)
            .cloned()
            .collect();
        matching.sort_by_key(|t| t.timestamps.created);
        Ok(matching)
    }

    async fn transition(
        &self,
        id: &str,
        new_status: TransactionStatus,
        patch: TransitionPatch,
    ) -> CoreResult<Transaction> {
        let mut inner = self.inner.write().await;
        let transaction = inner
            .transactions
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("transaction", id))?;
        transaction.apply_transition(new_status, patch, Utc::now())?;
        Ok(transaction.clone())
    }

    async fn find_by_customer_reference(
        &self,
        reference: &str,
    ) -> CoreResult<Option<Transaction>> {
        let inner = self.inner.read().await;
        let Some(id) = inner.reference_index.get(reference) else {
            return Ok(None);
        };
        Ok(inner.transactions.get(id).cloned())
    }
}
