//! Checkout orchestration: validate the merchant, create the ledger
//! entry, hand the charge to the provider, and record acceptance.
//!
//! The ledger write happens before the provider call so a crash or
//! timeout mid-initiation leaves an INITIATED record to reconcile
//! against, never an untracked charge.

use crate::error::{CoreError, CoreResult};
use crate::ledger::{generator, NewTransaction, Transaction, TransactionLedger, TransactionStatus, TransitionPatch};
use crate::merchants::{MerchantAggregator, MerchantStatus};
use crate::payments::{PaymentError, PaymentMethod, PaymentRequest, PaymentResponse, ProviderFactory};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Upper bound on a synchronous provider initiation call.
    pub provider_timeout: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub merchant_id: String,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub payment_method: PaymentMethod,
    pub phone: Option<String>,
    pub customer_name: Option<String>,
    pub description: Option<String>,
    pub metadata: JsonValue,
}

/// What the caller gets back from a successful initiation: the pending
/// ledger entry plus whatever the provider returned for the customer.
#[derive(Debug, Clone)]
pub struct CheckoutResponse {
    pub transaction: Transaction,
    pub instructions: Option<JsonValue>,
    pub message: Option<String>,
}

pub struct CheckoutService {
    ledger: Arc<TransactionLedger>,
    merchants: Arc<MerchantAggregator>,
    providers: Arc<ProviderFactory>,
    config: CheckoutConfig,
}

impl CheckoutService {
    pub fn new(
        ledger: Arc<TransactionLedger>,
        merchants: Arc<MerchantAggregator>,
        providers: Arc<ProviderFactory>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            ledger,
            merchants,
            providers,
            config,
        }
    }

    pub async fn initiate(&self, request: CheckoutRequest) -> CoreResult<CheckoutResponse> {
        let merchant = self.merchants.get(&request.merchant_id).await?;
        if merchant.status == MerchantStatus::Suspended {
            return Err(CoreError::validation_field(
                format!("merchant {} is suspended", merchant.id),
                "merchant_id",
            ));
        }

        let provider = self.providers.for_method(request.payment_method)?;
        let currency = request
            .currency
            .clone()
            .unwrap_or_else(|| "KES".to_string());
        if !provider.supported_currencies().contains(&currency.as_str()) {
            return Err(CoreError::validation_field(
                format!(
                    "currency {currency} is not supported by provider {}",
                    provider.name()
                ),
                "currency",
            ));
        }

        let transaction_id = generator::transaction_id();
        let customer_reference = provider.customer_reference(&merchant.id, &transaction_id);

        let transaction = self
            .ledger
            .create(NewTransaction {
                transaction_id: transaction_id.clone(),
                merchant_id: merchant.id.clone(),
                amount: request.amount,
                currency: request.currency.clone(),
                phone: request.phone.clone(),
                customer_name: request.customer_name.clone(),
                customer_reference: customer_reference.clone(),
                payment_method: request.payment_method,
                metadata: request.metadata.clone(),
            })
            .await?;

        let payment_request = PaymentRequest {
            amount: transaction.amount,
            currency: transaction.currency.clone(),
            phone: request.phone,
            customer_name: request.customer_name,
            transaction_id: transaction_id.clone(),
            merchant_id: merchant.id.clone(),
            customer_reference,
            description: request.description,
        };

        let response = match tokio::time::timeout(
            self.config.provider_timeout,
            provider.initiate_payment(payment_request),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                return self.handle_initiation_error(&transaction_id, err).await;
            }
            Err(_) => {
                // The provider may still have received the request; the
                // record stays INITIATED for the callback or manual
                // reconciliation to settle.
                warn!(
                    transaction_id = %transaction_id,
                    timeout_secs = self.config.provider_timeout.as_secs(),
                    "provider_initiation_timeout"
                );
                return Err(CoreError::Provider(PaymentError::TimeoutError {
                    seconds: self.config.provider_timeout.as_secs(),
                }));
            }
        };

        self.record_acceptance(&transaction_id, response).await
    }

    /// Synchronous rejection is final for this attempt: the provider will
    /// never call back, so the record moves to FAILED now.
    async fn handle_initiation_error(
        &self,
        transaction_id: &str,
        err: PaymentError,
    ) -> CoreResult<CheckoutResponse> {
        if err.is_retryable() {
            // Transient failure: the charge may have gone through, keep
            // the record INITIATED.
            warn!(
                transaction_id = %transaction_id,
                error = %err,
                "provider_initiation_transient_failure"
            );
            return Err(CoreError::Provider(err));
        }

        error!(
            transaction_id = %transaction_id,
            error = %err,
            "provider_initiation_rejected"
        );
        if let Err(transition_err) = self
            .ledger
            .transition(
                transaction_id,
                TransactionStatus::Failed,
                TransitionPatch::failed(err.to_string()),
            )
            .await
        {
            error!(
                transaction_id = %transaction_id,
                error = %transition_err,
                "failed_to_record_initiation_rejection"
            );
        }
        Err(CoreError::Provider(err))
    }

    async fn record_acceptance(
        &self,
        transaction_id: &str,
        response: PaymentResponse,
    ) -> CoreResult<CheckoutResponse> {
        if !response.accepted {
            let reason = response
                .message
                .unwrap_or_else(|| "provider declined the request".to_string());
            let declined = PaymentError::PaymentDeclinedError {
                message: reason.clone(),
                provider_code: None,
            };
            return self.handle_initiation_error(transaction_id, declined).await;
        }

        let updated = self
            .ledger
            .transition(
                transaction_id,
                TransactionStatus::Pending,
                TransitionPatch::accepted(response.provider_handle.clone()),
            )
            .await?;

        info!(
            transaction_id = %transaction_id,
            provider_handle = response.provider_handle.as_deref().unwrap_or("-"),
            "checkout_accepted"
        );
        Ok(CheckoutResponse {
            transaction: updated,
            instructions: response.instructions,
            message: response.message,
        })
    }

    pub async fn get_transaction(&self, id: &str) -> CoreResult<Transaction> {
        self.ledger.get(id).await
    }

    pub async fn list_transactions(&self, merchant_id: &str) -> CoreResult<Vec<Transaction>> {
        // Surface unknown merchants as NotFound rather than an empty list.
        self.merchants.get(merchant_id).await?;
        self.ledger.list_by_merchant(merchant_id).await
    }

    pub async fn cancel_transaction(
        &self,
        id: &str,
        reason: impl Into<String>,
    ) -> CoreResult<Transaction> {
        self.ledger.cancel(id, reason).await
    }
}
