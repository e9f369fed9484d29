//! Transaction record and status state machine.

use crate::error::{CoreError, CoreResult};
use crate::fees::FeeBreakdown;
use crate::payments::types::PaymentMethod;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Initiated,
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Initiated => "initiated",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed
                | TransactionStatus::Failed
                | TransactionStatus::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            TransactionStatus::Initiated => false,
            TransactionStatus::Pending => *self == TransactionStatus::Initiated,
            TransactionStatus::Completed | TransactionStatus::Failed => matches!(
                self,
                TransactionStatus::Initiated | TransactionStatus::Pending
            ),
            TransactionStatus::Cancelled => true,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub completed: Option<DateTime<Utc>>,
}

/// A ledger entry. Created once, mutated only by status transitions,
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub merchant_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub fees: FeeBreakdown,
    pub payment_method: PaymentMethod,
    pub phone: Option<String>,
    pub customer_name: Option<String>,
    pub customer_reference: String,
    pub provider_reference: Option<String>,
    /// Provider-side correlation handle (e.g. an STK CheckoutRequestID),
    /// recorded when the provider accepts the request.
    pub provider_handle: Option<String>,
    pub failure_reason: Option<String>,
    pub status: TransactionStatus,
    pub metadata: JsonValue,
    pub timestamps: Timestamps,
}

/// Fields merged into the record by a status transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionPatch {
    pub provider_reference: Option<String>,
    pub provider_handle: Option<String>,
    pub completion_time: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub callback_payload: Option<JsonValue>,
}

impl TransitionPatch {
    pub fn completed(
        provider_reference: Option<String>,
        completion_time: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            provider_reference,
            completion_time,
            ..Default::default()
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            failure_reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn accepted(provider_handle: Option<String>) -> Self {
        Self {
            provider_handle,
            ..Default::default()
        }
    }
}

impl Transaction {
    /// Apply a status transition in place, enforcing the state machine.
    ///
    /// Terminal records reject with `AlreadyFinalized` so redelivered
    /// confirmations can never double-count merchant volume.
    pub fn apply_transition(
        &mut self,
        new_status: TransactionStatus,
        patch: TransitionPatch,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        if self.status.is_terminal() {
            return Err(CoreError::AlreadyFinalized {
                id: self.id.clone(),
                status: self.status,
            });
        }
        if !self.status.can_transition_to(new_status) {
            return Err(CoreError::validation(format!(
                "invalid status transition {} -> {} for transaction {}",
                self.status, new_status, self.id
            )));
        }

        self.status = new_status;
        self.timestamps.updated = now;
        if new_status == TransactionStatus::Completed {
            self.timestamps.completed = Some(patch.completion_time.unwrap_or(now));
        }

        if let Some(reference) = patch.provider_reference {
            self.provider_reference = Some(reference);
        }
        if let Some(handle) = patch.provider_handle {
            self.provider_handle = Some(handle);
        }
        if let Some(reason) = patch.failure_reason {
            self.failure_reason = Some(reason);
        }
        if let Some(payload) = patch.callback_payload {
            if let JsonValue::Object(map) = &mut self.metadata {
                map.insert("callback".to_string(), payload);
            } else {
                self.metadata = serde_json::json!({ "callback": payload });
            }
        }

        Ok(())
    }
}

/// Input to `TransactionLedger::create`.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub transaction_id: String,
    pub merchant_id: String,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub phone: Option<String>,
    pub customer_name: Option<String>,
    pub customer_reference: String,
    pub payment_method: PaymentMethod,
    pub metadata: JsonValue,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fees::FeeEngine;
    use rust_decimal_macros::dec;

    fn sample() -> Transaction {
        let now = Utc::now();
        Transaction {
            id: "TXN1".to_string(),
            merchant_id: "M1".to_string(),
            amount: dec!(1000),
            currency: "KES".to_string(),
            fees: FeeEngine::standard().unwrap().compute_fees(dec!(1000)).unwrap(),
            payment_method: PaymentMethod::MpesaStk,
            phone: Some("254700000001".to_string()),
            customer_name: None,
            customer_reference: "REF1".to_string(),
            provider_reference: None,
            provider_handle: None,
            failure_reason: None,
            status: TransactionStatus::Initiated,
            metadata: serde_json::json!({}),
            timestamps: Timestamps {
                created: now,
                updated: now,
                completed: None,
            },
        }
    }

    #[test]
    fn initiated_reaches_completed_directly() {
        let mut txn = sample();
        txn.apply_transition(
            TransactionStatus::Completed,
            TransitionPatch::completed(Some("RCP1".to_string()), None),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(txn.status, TransactionStatus::Completed);
        assert!(txn.timestamps.completed.is_some());
        assert_eq!(txn.provider_reference.as_deref(), Some("RCP1"));
    }

    #[test]
    fn terminal_status_rejects_further_transitions() {
        let mut txn = sample();
        txn.apply_transition(
            TransactionStatus::Failed,
            TransitionPatch::failed("declined"),
            Utc::now(),
        )
        .unwrap();

        let err = txn
            .apply_transition(
                TransactionStatus::Completed,
                TransitionPatch::default(),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::AlreadyFinalized { .. }));
    }

    #[test]
    fn pending_cannot_revert_to_initiated() {
        let mut txn = sample();
        txn.apply_transition(
            TransactionStatus::Pending,
            TransitionPatch::accepted(Some("ws_CO_1".to_string())),
            Utc::now(),
        )
        .unwrap();
        assert!(txn
            .apply_transition(
                TransactionStatus::Initiated,
                TransitionPatch::default(),
                Utc::now()
            )
            .is_err());
    }

    #[test]
    fn cancellation_is_allowed_from_any_non_terminal_status() {
        let mut txn = sample();
        txn.apply_transition(
            TransactionStatus::Cancelled,
            TransitionPatch::failed("merchant cancelled"),
            Utc::now(),
        )
        .unwrap();
        assert!(txn.status.is_terminal());
    }
}
