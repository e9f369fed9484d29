//! Reconciliation of asynchronous provider confirmations against the
//! ledger.
//!
//! Providers redeliver callbacks, deliver them out of order, and sometimes
//! deliver them for transactions we never initiated. None of that may
//! crash the intake path or double-count merchant volume: the ledger's
//! terminal-state guard is the idempotency boundary, and a per-transaction
//! lock makes the COMPLETED transition plus the volume increment a single
//! unit.

use crate::error::CoreError;
use crate::ledger::{TransactionLedger, Transaction, TransactionStatus, TransitionPatch};
use crate::merchants::MerchantAggregator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};

/// Provider-neutral confirmation event. A result code of zero means the
/// provider reports success; anything else is a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Confirmation {
    pub result_code: i64,
    pub result_description: Option<String>,
    pub provider_reference: Option<String>,
    pub completion_time: Option<DateTime<Utc>>,
    /// Provider correlation handle for cross-checking against the one
    /// stored at initiation (e.g. an STK CheckoutRequestID).
    pub provider_handle: Option<String>,
    pub payload: JsonValue,
}

impl Confirmation {
    pub const SUCCESS_CODE: i64 = 0;

    pub fn success(provider_reference: Option<String>) -> Self {
        Self {
            result_code: Self::SUCCESS_CODE,
            result_description: Some("Success".to_string()),
            provider_reference,
            completion_time: None,
            provider_handle: None,
            payload: JsonValue::Null,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result_code == Self::SUCCESS_CODE
    }

    pub fn failure_reason(&self) -> String {
        self.result_description
            .clone()
            .unwrap_or_else(|| "Unknown reason".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Completed,
    Failed,
    TransactionNotFound,
    AlreadyFinalized,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub success: bool,
    pub outcome: ReconcileOutcome,
    pub transaction: Option<Transaction>,
    pub reason: Option<String>,
}

impl ReconciliationResult {
    fn completed(transaction: Transaction) -> Self {
        Self {
            success: true,
            outcome: ReconcileOutcome::Completed,
            transaction: Some(transaction),
            reason: None,
        }
    }

    fn failed(transaction: Option<Transaction>, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            outcome: ReconcileOutcome::Failed,
            transaction,
            reason: Some(reason.into()),
        }
    }

    fn not_found(transaction_id: &str) -> Self {
        Self {
            success: false,
            outcome: ReconcileOutcome::TransactionNotFound,
            transaction: None,
            reason: Some(format!("transaction not found: {transaction_id}")),
        }
    }

    fn already_finalized(transaction: Transaction) -> Self {
        let reason = format!("already finalized as {}", transaction.status);
        Self {
            success: transaction.status == TransactionStatus::Completed,
            outcome: ReconcileOutcome::AlreadyFinalized,
            transaction: Some(transaction),
            reason: Some(reason),
        }
    }
}

/// Per-transaction-id async locks. Guards are owned so they can be held
/// across awaits; entries are pruned once no caller holds them.
#[derive(Default)]
struct TransactionLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TransactionLocks {
    async fn acquire(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inner = self.inner.lock().await;
            inner
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    async fn prune(&self, id: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(lock) = inner.get(id) {
            if Arc::strong_count(lock) == 1 {
                inner.remove(id);
            }
        }
    }
}

/// Stateless orchestrator: all persistent state lives in the ledger and
/// the merchant aggregator.
pub struct ReconciliationEngine {
    ledger: Arc<TransactionLedger>,
    merchants: Arc<MerchantAggregator>,
    locks: TransactionLocks,
}

impl ReconciliationEngine {
    pub fn new(ledger: Arc<TransactionLedger>, merchants: Arc<MerchantAggregator>) -> Self {
        Self {
            ledger,
            merchants,
            locks: TransactionLocks::default(),
        }
    }

    /// Reconcile one confirmation against the ledger entry it targets.
    ///
    /// Never returns an error: a confirmation for an unknown or already
    /// finalized transaction is a routine external event reported in the
    /// result, not an exception.
    pub async fn reconcile(
        &self,
        transaction_id: &str,
        confirmation: Confirmation,
    ) -> ReconciliationResult {
        let guard = self.locks.acquire(transaction_id).await;
        let result = self.reconcile_locked(transaction_id, confirmation).await;
        drop(guard);
        self.locks.prune(transaction_id).await;
        result
    }

    async fn reconcile_locked(
        &self,
        transaction_id: &str,
        confirmation: Confirmation,
    ) -> ReconciliationResult {
        let transaction = match self.ledger.get(transaction_id).await {
            Ok(transaction) => transaction,
            Err(CoreError::NotFound { .. }) => {
                error!(
                    transaction_id = %transaction_id,
                    "reconciliation_failed: transaction_not_found"
                );
                return ReconciliationResult::not_found(transaction_id);
            }
            Err(err) => {
                error!(
                    transaction_id = %transaction_id,
                    error = %err,
                    "reconciliation_failed: ledger lookup error"
                );
                return ReconciliationResult::failed(None, err.to_string());
            }
        };

        // Redelivered confirmation: idempotent no-op referencing the
        // existing outcome.
        if transaction.status.is_terminal() {
            info!(
                transaction_id = %transaction_id,
                status = %transaction.status,
                "reconciliation_redelivery_ignored"
            );
            return ReconciliationResult::already_finalized(transaction);
        }

        // A confirmation for a different provider handle must not finalize
        // this transaction as completed.
        if let (Some(expected), Some(received)) =
            (&transaction.provider_handle, &confirmation.provider_handle)
        {
            if expected != received {
                warn!(
                    transaction_id = %transaction_id,
                    expected_handle = %expected,
                    received_handle = %received,
                    "reconciliation_handle_mismatch"
                );
                return self
                    .apply_failure(
                        transaction_id,
                        &confirmation,
                        format!(
                            "provider handle mismatch: expected {expected}, received {received}"
                        ),
                    )
                    .await;
            }
        }

        if confirmation.is_success() {
            self.apply_success(&transaction, confirmation).await
        } else {
            let reason = confirmation.failure_reason();
            self.apply_failure(transaction_id, &confirmation, reason)
                .await
        }
    }

    async fn apply_success(
        &self,
        transaction: &Transaction,
        confirmation: Confirmation,
    ) -> ReconciliationResult {
        let patch = TransitionPatch {
            provider_reference: confirmation.provider_reference.clone(),
            completion_time: confirmation.completion_time,
            callback_payload: Some(confirmation.payload.clone()),
            ..Default::default()
        };

        let updated = match self
            .ledger
            .transition(&transaction.id, TransactionStatus::Completed, patch)
            .await
        {
            Ok(updated) => updated,
            Err(CoreError::AlreadyFinalized { .. }) => {
                // Lost the race to another delivery of the same
                // confirmation; the winner counted the volume.
                let current = self
                    .ledger
                    .get(&transaction.id)
                    .await
                    .unwrap_or_else(|_| transaction.clone());
                return ReconciliationResult::already_finalized(current);
            }
            Err(err) => {
                error!(
                    transaction_id = %transaction.id,
                    error = %err,
                    "reconciliation_failed: completion transition rejected"
                );
                return ReconciliationResult::failed(Some(transaction.clone()), err.to_string());
            }
        };

        if let Err(err) = self
            .merchants
            .record_completed_volume(&transaction.merchant_id, transaction.amount)
            .await
        {
            // The transaction is completed but volume was not counted;
            // flag loudly for manual reconciliation instead of failing
            // the intake path.
            error!(
                transaction_id = %transaction.id,
                merchant_id = %transaction.merchant_id,
                error = %err,
                "merchant_volume_not_recorded"
            );
        }

        info!(
            transaction_id = %transaction.id,
            merchant_id = %transaction.merchant_id,
            amount = %transaction.amount,
            total_fee = %transaction.fees.total_fee,
            "transaction_completed"
        );
        ReconciliationResult::completed(updated)
    }

    async fn apply_failure(
        &self,
        transaction_id: &str,
        confirmation: &Confirmation,
        reason: String,
    ) -> ReconciliationResult {
        let mut patch = TransitionPatch::failed(reason.clone());
        patch.callback_payload = Some(confirmation.payload.clone());

        match self
            .ledger
            .transition(transaction_id, TransactionStatus::Failed, patch)
            .await
        {
            Ok(updated) => {
                error!(
                    transaction_id = %transaction_id,
                    result_code = confirmation.result_code,
                    reason = %reason,
                    "transaction_failed"
                );
                ReconciliationResult::failed(Some(updated), reason)
            }
            Err(CoreError::AlreadyFinalized { .. }) => {
                let current = self.ledger.get(transaction_id).await.ok();
                match current {
                    Some(transaction) => ReconciliationResult::already_finalized(transaction),
                    None => ReconciliationResult::not_found(transaction_id),
                }
            }
            Err(err) => {
                error!(
                    transaction_id = %transaction_id,
                    error = %err,
                    "reconciliation_failed: failure transition rejected"
                );
                ReconciliationResult::failed(None, err.to_string())
            }
        }
    }

    /// Reconcile a confirmation addressed by customer reference rather
    /// than transaction id (C2B confirmations, bank-transfer
    /// verification report only the reference the customer quoted).
    pub async fn reconcile_by_reference(
        &self,
        reference: &str,
        confirmation: Confirmation,
    ) -> ReconciliationResult {
        match self.ledger.find_by_customer_reference(reference).await {
            Ok(Some(transaction)) => self.reconcile(&transaction.id, confirmation).await,
            Ok(None) => {
                error!(
                    customer_reference = %reference,
                    "reconciliation_failed: no transaction for reference"
                );
                ReconciliationResult::not_found(reference)
            }
            Err(err) => {
                error!(
                    customer_reference = %reference,
                    error = %err,
                    "reconciliation_failed: reference lookup error"
                );
                ReconciliationResult::failed(None, err.to_string())
            }
        }
    }
}
