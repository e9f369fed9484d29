use crate::payments::error::PaymentResult;
use crate::payments::types::{PaymentRequest, PaymentResponse, ProviderName};
use crate::reconciliation::Confirmation;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// Capability contract for a payment provider adapter.
///
/// The core only needs two things from a provider: initiate a charge and
/// map a raw callback payload into the provider-neutral `Confirmation`
/// that the one shared reconciliation algorithm consumes.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn initiate_payment(&self, request: PaymentRequest) -> PaymentResult<PaymentResponse>;

    /// Map a raw callback payload into a confirmation. Must not panic on
    /// malformed input.
    fn parse_callback(&self, payload: &JsonValue) -> PaymentResult<Confirmation>;

    fn name(&self) -> ProviderName;

    fn supported_currencies(&self) -> &'static [&'static str];

    /// Customer-facing reference for a new transaction; providers with
    /// their own reference scheme (bank slips) override this.
    fn customer_reference(&self, merchant_id: &str, transaction_id: &str) -> String {
        crate::ledger::generator::customer_reference(merchant_id, transaction_id)
    }
}
