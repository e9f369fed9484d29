//! Transaction ledger: the authoritative store of transaction records and
//! the only component permitted to change a transaction's status.

pub mod generator;
pub mod store;
pub mod transaction;

pub use store::{InMemoryTransactionStore, TransactionStore};
pub use transaction::{
    NewTransaction, Timestamps, Transaction, TransactionStatus, TransitionPatch,
};

use crate::error::{CoreError, CoreResult};
use crate::fees::FeeEngine;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

pub struct TransactionLedger {
    store: Arc<dyn TransactionStore>,
    fees: Arc<FeeEngine>,
}

impl TransactionLedger {
    pub fn new(store: Arc<dyn TransactionStore>, fees: Arc<FeeEngine>) -> Self {
        Self { store, fees }
    }

    pub fn fee_engine(&self) -> &FeeEngine {
        &self.fees
    }

    /// Create a transaction in INITIATED status with its fee breakdown.
    pub async fn create(&self, input: NewTransaction) -> CoreResult<Transaction> {
        if input.transaction_id.trim().is_empty() {
            return Err(CoreError::validation_field(
                "transaction id is required",
                "transaction_id",
            ));
        }
        if input.merchant_id.trim().is_empty() {
            return Err(CoreError::validation_field(
                "merchant id is required",
                "merchant_id",
            ));
        }

        let fees = self.fees.compute_fees(input.amount)?;
        let now = Utc::now();
        let transaction = Transaction {
            id: input.transaction_id,
            merchant_id: input.merchant_id,
            amount: input.amount,
            currency: input.currency.unwrap_or_else(|| "KES".to_string()),
            fees,
            payment_method: input.payment_method,
            phone: input.phone,
            customer_name: input.customer_name,
            customer_reference: input.customer_reference,
            provider_reference: None,
            provider_handle: None,
            failure_reason: None,
            status: TransactionStatus::Initiated,
            metadata: input.metadata,
            timestamps: Timestamps {
                created: now,
                updated: now,
                completed: None,
            },
        };

        let created = self.store.insert(transaction).await?;
        info!(
            transaction_id = %created.id,
            merchant_id = %created.merchant_id,
            amount = %created.amount,
            total_fee = %created.fees.total_fee,
            "transaction_created"
        );
        Ok(created)
    }

    pub async fn get(&self, id: &str) -> CoreResult<Transaction> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("transaction", id))
    }

    pub async fn list_by_merchant(&self, merchant_id: &str) -> CoreResult<Vec<Transaction>> {
        self.store.list_by_merchant(merchant_id).await
    }

    /// Drive the status state machine. Conflicts from terminal states
    /// surface as `AlreadyFinalized`.
    pub async fn transition(
        &self,
        id: &str,
        new_status: TransactionStatus,
        patch: TransitionPatch,
    ) -> CoreResult<Transaction> {
        let updated = self.store.transition(id, new_status, patch).await?;
        info!(
            transaction_id = %updated.id,
            status = %updated.status,
            "transaction_status_updated"
        );
        Ok(updated)
    }

    /// Explicit cancellation; never invoked by automatic reconciliation.
    pub async fn cancel(&self, id: &str, reason: impl Into<String>) -> CoreResult<Transaction> {
        self.transition(
            id,
            TransactionStatus::Cancelled,
            TransitionPatch::failed(reason),
        )
        .await
    }

    pub async fn find_by_customer_reference(
        &self,
        reference: &str,
    ) -> CoreResult<Option<Transaction>> {
        self.store.find_by_customer_reference(reference).await
    }
}
