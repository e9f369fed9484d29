//! Intake for raw provider callback payloads.
//!
//! Turns the payloads providers actually send (STK result envelopes, C2B
//! confirmations, manual bank verifications) into `Confirmation`s and
//! hands them to the reconciliation engine. Also owns the acknowledgement
//! policy: providers redeliver anything we do not acknowledge, so a
//! malformed payload is acknowledged and logged rather than bounced back
//! into a retry loop.

use crate::payments::PaymentProvider;
use crate::reconciliation::engine::{Confirmation, ReconcileOutcome, ReconciliationEngine, ReconciliationResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{error, info};

/// What we tell the provider about a delivery, alongside the internal
/// reconciliation result for observability.
#[derive(Debug, Clone, Serialize)]
pub struct CallbackAck {
    pub acknowledged: bool,
    pub result: Option<ReconciliationResult>,
}

/// Mobile-money C2B confirmation. Customers quote the reference we issued
/// at initiation in `BillRefNumber`; that is the only correlation key the
/// payload carries.
#[derive(Debug, Clone, Deserialize)]
pub struct C2bConfirmation {
    #[serde(rename = "TransID")]
    pub trans_id: String,
    #[serde(rename = "TransAmount")]
    pub trans_amount: String,
    #[serde(rename = "BillRefNumber")]
    pub bill_ref_number: String,
    #[serde(rename = "TransTime")]
    pub trans_time: Option<String>,
    #[serde(rename = "MSISDN")]
    pub msisdn: Option<String>,
    #[serde(rename = "FirstName")]
    pub first_name: Option<String>,
}

impl C2bConfirmation {
    /// C2B confirmations are only sent for money already received, so the
    /// mapped confirmation is always a success.
    fn into_confirmation(self, payload: JsonValue) -> Confirmation {
        Confirmation {
            result_code: Confirmation::SUCCESS_CODE,
            result_description: Some("C2B payment received".to_string()),
            provider_reference: Some(self.trans_id),
            completion_time: self.trans_time.as_deref().and_then(parse_provider_time),
            provider_handle: None,
            payload,
        }
    }
}

/// Provider timestamps arrive as `YYYYMMDDHHMMSS` local strings.
fn parse_provider_time(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

pub struct CallbackProcessor {
    engine: Arc<ReconciliationEngine>,
    ack_internal_failures: bool,
}

impl CallbackProcessor {
    pub fn new(engine: Arc<ReconciliationEngine>, ack_internal_failures: bool) -> Self {
        Self {
            engine,
            ack_internal_failures,
        }
    }

    /// Deliver a raw provider callback addressed to a known transaction.
    ///
    /// Parse failures are acknowledged unconditionally: the payload will
    /// not get better on redelivery.
    pub async fn deliver(
        &self,
        provider: &dyn PaymentProvider,
        transaction_id: &str,
        payload: &JsonValue,
    ) -> CallbackAck {
        let confirmation = match provider.parse_callback(payload) {
            Ok(confirmation) => confirmation,
            Err(err) => {
                error!(
                    provider = %provider.name(),
                    transaction_id = %transaction_id,
                    error = %err,
                    "callback_discarded: unparseable payload"
                );
                return CallbackAck {
                    acknowledged: true,
                    result: None,
                };
            }
        };

        info!(
            provider = %provider.name(),
            transaction_id = %transaction_id,
            result_code = confirmation.result_code,
            "callback_received"
        );
        let result = self.engine.reconcile(transaction_id, confirmation).await;
        self.ack(result)
    }

    /// Deliver a C2B confirmation, correlated by the customer reference
    /// the payer quoted.
    pub async fn deliver_c2b(&self, payload: &JsonValue) -> CallbackAck {
        let parsed: C2bConfirmation = match serde_json::from_value(payload.clone()) {
            Ok(parsed) => parsed,
            Err(err) => {
                error!(error = %err, "callback_discarded: malformed c2b confirmation");
                return CallbackAck {
                    acknowledged: true,
                    result: None,
                };
            }
        };

        info!(
            bill_ref_number = %parsed.bill_ref_number,
            trans_id = %parsed.trans_id,
            amount = %parsed.trans_amount,
            "c2b_confirmation_received"
        );
        let reference = parsed.bill_ref_number.clone();
        let confirmation = parsed.into_confirmation(payload.clone());
        let result = self
            .engine
            .reconcile_by_reference(&reference, confirmation)
            .await;
        self.ack(result)
    }

    /// Manual bank-transfer verification: an operator confirms funds
    /// arrived for the given payment reference.
    pub async fn verify_bank_transfer(
        &self,
        reference: &str,
        bank_reference: Option<String>,
    ) -> ReconciliationResult {
        let mut confirmation = Confirmation::success(bank_reference);
        confirmation.result_description = Some("Bank transfer verified".to_string());
        confirmation.completion_time = Some(Utc::now());
        self.engine
            .reconcile_by_reference(reference, confirmation)
            .await
    }

    fn ack(&self, result: ReconciliationResult) -> CallbackAck {
        let acknowledged = match result.outcome {
            ReconcileOutcome::Completed | ReconcileOutcome::AlreadyFinalized => true,
            // A delivery that failed on our side is only worth a provider
            // retry when redelivery could change the outcome, which is an
            // operational choice.
            ReconcileOutcome::Failed | ReconcileOutcome::TransactionNotFound => {
                self.ack_internal_failures
            }
        };
        CallbackAck {
            acknowledged,
            result: Some(result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn c2b_payload_deserializes_and_maps_to_success() {
        let payload = json!({
            "TransID": "SCR81H2KDM",
            "TransAmount": "1500.00",
            "BillRefNumber": "M123456789",
            "TransTime": "20260830142501",
            "MSISDN": "254712345678",
            "FirstName": "Amina"
        });
        let parsed: C2bConfirmation = serde_json::from_value(payload.clone()).unwrap();
        assert_eq!(parsed.bill_ref_number, "M123456789");

        let confirmation = parsed.into_confirmation(payload);
        assert!(confirmation.is_success());
        assert_eq!(confirmation.provider_reference.as_deref(), Some("SCR81H2KDM"));
        assert!(confirmation.completion_time.is_some());
    }

    #[test]
    fn provider_time_parses_compact_format() {
        let parsed = parse_provider_time("20260830142501").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-08-30T14:25:01+00:00");
        assert!(parse_provider_time("not-a-time").is_none());
    }
}
