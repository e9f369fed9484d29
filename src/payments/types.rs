use crate::payments::error::PaymentError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderName {
    Mpesa,
    Bank,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Mpesa => "mpesa",
            ProviderName::Bank => "bank",
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "mpesa" | "m-pesa" => Ok(ProviderName::Mpesa),
            "bank" | "bank_transfer" => Ok(ProviderName::Bank),
            _ => Err(PaymentError::ValidationError {
                message: format!("unsupported provider: {}", value),
                field: Some("provider".to_string()),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    MpesaStk,
    BankTransfer,
}

impl PaymentMethod {
    pub fn provider(&self) -> ProviderName {
        match self {
            PaymentMethod::MpesaStk => ProviderName::Mpesa,
            PaymentMethod::BankTransfer => ProviderName::Bank,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::MpesaStk => "mpesa_stk",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outbound charge request handed to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub amount: Decimal,
    pub currency: String,
    pub phone: Option<String>,
    pub customer_name: Option<String>,
    pub transaction_id: String,
    pub merchant_id: String,
    pub customer_reference: String,
    pub description: Option<String>,
}

/// Provider's synchronous answer to an initiation request. The
/// asynchronous outcome arrives later as a confirmation callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub accepted: bool,
    /// Provider-side correlation handle, stored on the transaction.
    pub provider_handle: Option<String>,
    /// Customer-facing payment instructions (bank transfer flows).
    pub instructions: Option<JsonValue>,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_name_round_trips() {
        assert_eq!(ProviderName::from_str("m-pesa").unwrap(), ProviderName::Mpesa);
        assert_eq!(
            ProviderName::from_str("bank_transfer").unwrap(),
            ProviderName::Bank
        );
        assert!(ProviderName::from_str("card").is_err());
    }

    #[test]
    fn payment_method_maps_to_provider() {
        assert_eq!(PaymentMethod::MpesaStk.provider(), ProviderName::Mpesa);
        assert_eq!(PaymentMethod::BankTransfer.provider(), ProviderName::Bank);
    }

    #[test]
    fn payment_method_serializes_snake_case() {
        let json = serde_json::to_value(PaymentMethod::MpesaStk).unwrap();
        assert_eq!(json, "mpesa_stk");
    }
}
