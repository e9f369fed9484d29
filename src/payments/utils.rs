//! Small helpers shared by provider implementations.

use crate::payments::error::{PaymentError, PaymentResult};

/// Normalize a Kenyan MSISDN to the `2547XXXXXXXX` wire format.
pub fn normalize_msisdn(phone: &str) -> PaymentResult<String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    let normalized = if let Some(rest) = digits.strip_prefix("254") {
        format!("254{rest}")
    } else if let Some(rest) = digits.strip_prefix('0') {
        format!("254{rest}")
    } else if digits.len() == 9 {
        format!("254{digits}")
    } else {
        digits.clone()
    };

    if normalized.len() != 12 || !normalized.starts_with("254") {
        return Err(PaymentError::ValidationError {
            message: format!("invalid phone number: {phone}"),
            field: Some("phone".to_string()),
        });
    }
    Ok(normalized)
}

/// Truncate to a provider field limit without splitting a UTF-8 boundary.
pub fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msisdn_variants_normalize() {
        assert_eq!(normalize_msisdn("0712345678").unwrap(), "254712345678");
        assert_eq!(normalize_msisdn("254712345678").unwrap(), "254712345678");
        assert_eq!(normalize_msisdn("+254 712 345 678").unwrap(), "254712345678");
        assert_eq!(normalize_msisdn("712345678").unwrap(), "254712345678");
    }

    #[test]
    fn invalid_msisdn_is_rejected() {
        assert!(normalize_msisdn("12345").is_err());
        assert!(normalize_msisdn("").is_err());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("payment description", 7), "payment");
        assert_eq!(truncate("short", 20), "short");
    }
}
