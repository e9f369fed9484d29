use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("payment declined: {message}")]
    PaymentDeclinedError {
        message: String,
        provider_code: Option<String>,
    },

    #[error("network error: {message}")]
    NetworkError { message: String },

    #[error("provider call timed out after {seconds}s")]
    TimeoutError { seconds: u64 },

    #[error("malformed callback payload: {message}")]
    CallbackParseError { message: String },

    #[error("provider error: provider={provider}, message={message}")]
    ProviderError {
        provider: String,
        message: String,
        provider_code: Option<String>,
        retryable: bool,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::PaymentDeclinedError { .. } => false,
            PaymentError::NetworkError { .. } => true,
            PaymentError::TimeoutError { .. } => true,
            PaymentError::CallbackParseError { .. } => false,
            PaymentError::ProviderError { retryable, .. } => *retryable,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PaymentError::ValidationError { message, .. } => message.clone(),
            PaymentError::PaymentDeclinedError { .. } => {
                "Payment was declined by the provider".to_string()
            }
            PaymentError::NetworkError { .. } => {
                "Payment provider is temporarily unavailable".to_string()
            }
            PaymentError::TimeoutError { .. } => {
                "Payment provider did not respond in time. The payment may still complete"
                    .to_string()
            }
            PaymentError::CallbackParseError { .. } => {
                "Provider callback could not be interpreted".to_string()
            }
            PaymentError::ProviderError { .. } => {
                "Payment provider returned an error".to_string()
            }
        }
    }
}
