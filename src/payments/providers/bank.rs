//! Bank transfer adapter.
//!
//! Initiation always succeeds with deposit instructions the customer acts
//! on offline; the confirmation arrives later through manual verification
//! keyed by the payment reference printed on the instructions.

use crate::ledger::generator;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{PaymentRequest, PaymentResponse, ProviderName};
use crate::reconciliation::Confirmation;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use tracing::info;

#[derive(Debug, Clone)]
pub struct BankConfig {
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    pub branch_code: String,
    pub swift_code: String,
    pub reference_prefix: String,
}

impl BankConfig {
    pub fn from_env() -> Self {
        Self {
            bank_name: env_or("BANK_NAME", "Kenya Commercial Bank"),
            account_name: env_or("BANK_ACCOUNT_NAME", "PesaFlow Collections"),
            account_number: env_or("BANK_ACCOUNT_NUMBER", "1234567890"),
            branch_code: env_or("BANK_BRANCH_CODE", "001"),
            swift_code: env_or("BANK_SWIFT_CODE", "KCBLKENX"),
            reference_prefix: env_or("BANK_REFERENCE_PREFIX", "PAY"),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub struct BankTransferProvider {
    config: BankConfig,
}

impl BankTransferProvider {
    pub fn new(config: BankConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(BankConfig::from_env())
    }

    fn instructions(&self, request: &PaymentRequest) -> JsonValue {
        json!({
            "bank_name": self.config.bank_name,
            "account_name": self.config.account_name,
            "account_number": self.config.account_number,
            "branch_code": self.config.branch_code,
            "swift_code": self.config.swift_code,
            "amount": request.amount.to_string(),
            "currency": request.currency,
            "payment_reference": request.customer_reference,
            "note": "Quote the payment reference exactly; it is how the deposit is matched to this transaction",
        })
    }
}

#[async_trait]
impl PaymentProvider for BankTransferProvider {
    async fn initiate_payment(&self, request: PaymentRequest) -> PaymentResult<PaymentResponse> {
        if request.customer_reference.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "customer reference is required for bank transfers".to_string(),
                field: Some("customer_reference".to_string()),
            });
        }

        info!(
            transaction_id = %request.transaction_id,
            payment_reference = %request.customer_reference,
            amount = %request.amount,
            "bank_transfer_instructions_issued"
        );

        Ok(PaymentResponse {
            accepted: true,
            provider_handle: None,
            instructions: Some(self.instructions(&request)),
            message: Some(
                "Transfer the exact amount and quote the payment reference".to_string(),
            ),
        })
    }

    /// Manual verification payload recorded by an operator:
    /// `{ "verified": bool, "bank_reference": "...", "reason": "..." }`.
    fn parse_callback(&self, payload: &JsonValue) -> PaymentResult<Confirmation> {
        let verified = payload
            .get("verified")
            .and_then(|v| v.as_bool())
            .ok_or_else(|| PaymentError::CallbackParseError {
                message: "missing boolean field: verified".to_string(),
            })?;

        let bank_reference = payload
            .get("bank_reference")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(Confirmation {
            result_code: if verified { Confirmation::SUCCESS_CODE } else { 1 },
            result_description: Some(if verified {
                "Bank transfer verified".to_string()
            } else {
                payload
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Bank transfer could not be verified")
                    .to_string()
            }),
            provider_reference: bank_reference,
            completion_time: verified.then(Utc::now),
            provider_handle: None,
            payload: payload.clone(),
        })
    }

    fn name(&self) -> ProviderName {
        ProviderName::Bank
    }

    fn supported_currencies(&self) -> &'static [&'static str] {
        &["KES", "USD"]
    }

    fn customer_reference(&self, merchant_id: &str, _transaction_id: &str) -> String {
        generator::bank_reference(&self.config.reference_prefix, merchant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn test_provider() -> BankTransferProvider {
        BankTransferProvider::new(BankConfig {
            bank_name: "Kenya Commercial Bank".to_string(),
            account_name: "PesaFlow Collections".to_string(),
            account_number: "1234567890".to_string(),
            branch_code: "001".to_string(),
            swift_code: "KCBLKENX".to_string(),
            reference_prefix: "PAY".to_string(),
        })
    }

    fn test_request() -> PaymentRequest {
        PaymentRequest {
            amount: dec!(250000),
            currency: "KES".to_string(),
            phone: None,
            customer_name: Some("Wanjiku Ltd".to_string()),
            transaction_id: "TXN1".to_string(),
            merchant_id: "M555123".to_string(),
            customer_reference: "PAYM55123456ABCD".to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn initiation_returns_instructions_with_reference() {
        let provider = test_provider();
        let response = provider.initiate_payment(test_request()).await.unwrap();
        assert!(response.accepted);
        assert!(response.provider_handle.is_none());
        let instructions = response.instructions.unwrap();
        assert_eq!(instructions["payment_reference"], "PAYM55123456ABCD");
        assert_eq!(instructions["account_number"], "1234567890");
    }

    #[test]
    fn bank_reference_override_uses_configured_prefix() {
        let provider = test_provider();
        let reference = provider.customer_reference("m555123", "TXN1");
        assert!(reference.starts_with("PAYM55"));
    }

    #[test]
    fn verified_payload_maps_to_success() {
        let provider = test_provider();
        let confirmation = provider
            .parse_callback(&json!({
                "verified": true,
                "bank_reference": "FT26083012345"
            }))
            .unwrap();
        assert!(confirmation.is_success());
        assert_eq!(
            confirmation.provider_reference.as_deref(),
            Some("FT26083012345")
        );
        assert!(confirmation.completion_time.is_some());
    }

    #[test]
    fn unverified_payload_maps_to_failure_with_reason() {
        let provider = test_provider();
        let confirmation = provider
            .parse_callback(&json!({
                "verified": false,
                "reason": "amount mismatch"
            }))
            .unwrap();
        assert!(!confirmation.is_success());
        assert_eq!(confirmation.failure_reason(), "amount mismatch");
    }

    #[test]
    fn payload_without_verified_flag_is_a_parse_error() {
        let provider = test_provider();
        let err = provider.parse_callback(&json!({})).unwrap_err();
        assert!(matches!(err, PaymentError::CallbackParseError { .. }));
    }
}
