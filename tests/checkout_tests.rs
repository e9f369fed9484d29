//! Checkout orchestration: ledger-first initiation, provider acceptance,
//! rejection, and timeout behaviour.

use async_trait::async_trait;
use pesaflow::error::CoreError;
use pesaflow::fees::FeeEngine;
use pesaflow::ledger::{InMemoryTransactionStore, TransactionLedger, TransactionStatus};
use pesaflow::merchants::{
    InMemoryMerchantStore, Merchant, MerchantAggregator, MerchantStatus, MerchantStore,
    NewMerchant,
};
use pesaflow::payments::providers::{BankConfig, BankTransferProvider, MpesaConfig, MpesaProvider};
use pesaflow::payments::{
    PaymentError, PaymentMethod, PaymentProvider, PaymentRequest, PaymentResponse, PaymentResult,
    ProviderFactory, ProviderName,
};
use pesaflow::reconciliation::Confirmation;
use pesaflow::services::{CheckoutConfig, CheckoutRequest, CheckoutService};
use rust_decimal_macros::dec;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    ledger: Arc<TransactionLedger>,
    merchants: Arc<MerchantAggregator>,
    merchant_store: Arc<InMemoryMerchantStore>,
}

fn harness() -> Harness {
    let fees = Arc::new(FeeEngine::standard().unwrap());
    let merchant_store = Arc::new(InMemoryMerchantStore::new());
    Harness {
        ledger: Arc::new(TransactionLedger::new(
            Arc::new(InMemoryTransactionStore::new()),
            fees.clone(),
        )),
        merchants: Arc::new(MerchantAggregator::new(merchant_store.clone(), fees)),
        merchant_store,
    }
}

fn checkout_with(h: &Harness, providers: Vec<Arc<dyn PaymentProvider>>) -> CheckoutService {
    CheckoutService::new(
        h.ledger.clone(),
        h.merchants.clone(),
        Arc::new(ProviderFactory::with_providers(providers)),
        CheckoutConfig {
            provider_timeout: Duration::from_millis(200),
        },
    )
}

async fn register_merchant(h: &Harness) -> Merchant {
    h.merchants
        .register(NewMerchant {
            business_name: "Duka la Vitabu".to_string(),
            email: "duka@example.com".to_string(),
            phone: "254700000001".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
}

fn mpesa_provider() -> Arc<dyn PaymentProvider> {
    Arc::new(MpesaProvider::new(MpesaConfig {
        shortcode: "174379".to_string(),
        passkey: "testpasskey".to_string(),
        consumer_key: "key".to_string(),
        consumer_secret: "secret".to_string(),
        callback_url: "https://example.com/cb".to_string(),
    }))
}

fn bank_provider() -> Arc<dyn PaymentProvider> {
    Arc::new(BankTransferProvider::new(BankConfig {
        bank_name: "Kenya Commercial Bank".to_string(),
        account_name: "PesaFlow Collections".to_string(),
        account_number: "1234567890".to_string(),
        branch_code: "001".to_string(),
        swift_code: "KCBLKENX".to_string(),
        reference_prefix: "PAY".to_string(),
    }))
}

fn stk_request(merchant_id: &str) -> CheckoutRequest {
    CheckoutRequest {
        merchant_id: merchant_id.to_string(),
        amount: dec!(2000),
        currency: None,
        payment_method: PaymentMethod::MpesaStk,
        phone: Some("0712345678".to_string()),
        customer_name: Some("Amina".to_string()),
        description: Some("Order 42".to_string()),
        metadata: json!({}),
    }
}

#[tokio::test]
async fn stk_checkout_leaves_pending_with_handle_and_fees() {
    let h = harness();
    let merchant = register_merchant(&h).await;
    let checkout = checkout_with(&h, vec![mpesa_provider()]);

    let response = checkout.initiate(stk_request(&merchant.id)).await.unwrap();
    let txn = response.transaction;
    assert_eq!(txn.status, TransactionStatus::Pending);
    assert!(txn.provider_handle.unwrap().starts_with("ws_CO_"));
    assert_eq!(txn.fees.total_fee, dec!(53));
    assert_eq!(txn.fees.net_amount, dec!(1947));
    assert_eq!(txn.currency, "KES");
    // Phone reaches the ledger as supplied; normalization happens at the
    // provider boundary.
    assert!(txn.customer_reference.starts_with(&merchant.id[..4]));
}

#[tokio::test]
async fn bank_checkout_returns_instructions_with_bank_reference() {
    let h = harness();
    let merchant = register_merchant(&h).await;
    let checkout = checkout_with(&h, vec![bank_provider()]);

    let response = checkout
        .initiate(CheckoutRequest {
            merchant_id: merchant.id.clone(),
            amount: dec!(250000),
            currency: None,
            payment_method: PaymentMethod::BankTransfer,
            phone: None,
            customer_name: Some("Wanjiku Ltd".to_string()),
            description: None,
            metadata: json!({}),
        })
        .await
        .unwrap();

    let txn = response.transaction;
    assert_eq!(txn.status, TransactionStatus::Pending);
    assert!(txn.customer_reference.starts_with("PAY"));
    let instructions = response.instructions.unwrap();
    assert_eq!(instructions["payment_reference"], txn.customer_reference);
}

#[tokio::test]
async fn unknown_merchant_is_rejected_before_any_ledger_write() {
    let h = harness();
    let checkout = checkout_with(&h, vec![mpesa_provider()]);

    let err = checkout.initiate(stk_request("M_MISSING")).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn suspended_merchant_cannot_check_out() {
    let h = harness();
    let merchant = register_merchant(&h).await;
    let mut suspended = merchant.clone();
    suspended.id = format!("{}S", merchant.id);
    suspended.status = MerchantStatus::Suspended;
    h.merchant_store.insert(suspended.clone()).await.unwrap();

    let checkout = checkout_with(&h, vec![mpesa_provider()]);
    let err = checkout.initiate(stk_request(&suspended.id)).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
}

struct DecliningProvider;

#[async_trait]
impl PaymentProvider for DecliningProvider {
    async fn initiate_payment(&self, _request: PaymentRequest) -> PaymentResult<PaymentResponse> {
        Err(PaymentError::PaymentDeclinedError {
            message: "insufficient funds".to_string(),
            provider_code: Some("1".to_string()),
        })
    }

    fn parse_callback(&self, payload: &JsonValue) -> PaymentResult<Confirmation> {
        Ok(Confirmation {
            result_code: 1,
            result_description: None,
            provider_reference: None,
            completion_time: None,
            provider_handle: None,
            payload: payload.clone(),
        })
    }

    fn name(&self) -> ProviderName {
        ProviderName::Mpesa
    }

    fn supported_currencies(&self) -> &'static [&'static str] {
        &["KES"]
    }
}

#[tokio::test]
async fn synchronous_rejection_marks_the_transaction_failed() {
    let h = harness();
    let merchant = register_merchant(&h).await;
    let checkout = checkout_with(&h, vec![Arc::new(DecliningProvider)]);

    let err = checkout.initiate(stk_request(&merchant.id)).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Provider(PaymentError::PaymentDeclinedError { .. })
    ));

    let transactions = h.ledger.list_by_merchant(&merchant.id).await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].status, TransactionStatus::Failed);
    assert!(transactions[0]
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("insufficient funds"));
}

struct SlowProvider;

#[async_trait]
impl PaymentProvider for SlowProvider {
    async fn initiate_payment(&self, _request: PaymentRequest) -> PaymentResult<PaymentResponse> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(PaymentResponse {
            accepted: true,
            provider_handle: None,
            instructions: None,
            message: None,
        })
    }

    fn parse_callback(&self, payload: &JsonValue) -> PaymentResult<Confirmation> {
        Ok(Confirmation {
            result_code: 0,
            result_description: None,
            provider_reference: None,
            completion_time: None,
            provider_handle: None,
            payload: payload.clone(),
        })
    }

    fn name(&self) -> ProviderName {
        ProviderName::Mpesa
    }

    fn supported_currencies(&self) -> &'static [&'static str] {
        &["KES"]
    }
}

#[tokio::test(start_paused = true)]
async fn provider_timeout_leaves_the_transaction_initiated() {
    let h = harness();
    let merchant = register_merchant(&h).await;
    let checkout = checkout_with(&h, vec![Arc::new(SlowProvider)]);

    let err = checkout.initiate(stk_request(&merchant.id)).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Provider(PaymentError::TimeoutError { .. })
    ));

    // The charge may still be in flight at the provider; the record stays
    // open for reconciliation.
    let transactions = h.ledger.list_by_merchant(&merchant.id).await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].status, TransactionStatus::Initiated);
}

#[tokio::test]
async fn invalid_amount_is_rejected_at_creation() {
    let h = harness();
    let merchant = register_merchant(&h).await;
    let checkout = checkout_with(&h, vec![mpesa_provider()]);

    let mut request = stk_request(&merchant.id);
    request.amount = dec!(0);
    let err = checkout.initiate(request).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    let mut request = stk_request(&merchant.id);
    request.amount = dec!(100.50);
    let err = checkout.initiate(request).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
}

#[tokio::test]
async fn unsupported_currency_is_rejected_before_any_ledger_write() {
    let h = harness();
    let merchant = register_merchant(&h).await;

    // M-Pesa only supports KES.
    let checkout = checkout_with(&h, vec![mpesa_provider()]);
    let mut request = stk_request(&merchant.id);
    request.currency = Some("USD".to_string());
    let err = checkout.initiate(request).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    // The bank provider takes KES and USD but not EUR.
    let checkout = checkout_with(&h, vec![bank_provider()]);
    let err = checkout
        .initiate(CheckoutRequest {
            merchant_id: merchant.id.clone(),
            amount: dec!(250000),
            currency: Some("EUR".to_string()),
            payment_method: PaymentMethod::BankTransfer,
            phone: None,
            customer_name: None,
            description: None,
            metadata: json!({}),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    let transactions = h.ledger.list_by_merchant(&merchant.id).await.unwrap();
    assert!(transactions.is_empty());
}

#[tokio::test]
async fn disabled_payment_method_is_rejected() {
    let h = harness();
    let merchant = register_merchant(&h).await;
    let checkout = checkout_with(&h, vec![bank_provider()]);

    let err = checkout.initiate(stk_request(&merchant.id)).await.unwrap_err();
    assert!(matches!(err, CoreError::Provider(_)));
}
