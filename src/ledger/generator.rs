//! Transaction id and customer reference generation.
//!
//! Transaction ids combine a millisecond timestamp with a 32-bit random
//! suffix; collisions are astronomically unlikely and surface as a
//! create-time `DuplicateId` conflict rather than an overwrite.

use chrono::Utc;
use rand::Rng;

/// Globally unique (with overwhelming probability) transaction id,
/// e.g. `TXN17251234567893fa9c21b`.
pub fn transaction_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen();
    format!("TXN{millis}{suffix:08x}")
}

/// Short, human-presentable reference the customer quotes back to us.
/// Unique per merchant with high probability, not globally unique.
pub fn customer_reference(merchant_id: &str, _transaction_id: &str) -> String {
    let short_merchant: String = merchant_id.chars().take(4).collect();
    let millis = Utc::now().timestamp_millis().to_string();
    let time_part = &millis[millis.len().saturating_sub(6)..];
    let random: u16 = rand::thread_rng().gen_range(0..1000);
    format!("{short_merchant}{time_part}{random:03}")
}

/// Bank-transfer reference, prefixed and uppercased so it survives
/// manual entry on a bank slip.
pub fn bank_reference(prefix: &str, merchant_id: &str) -> String {
    let short_merchant: String = merchant_id.chars().take(3).collect::<String>().to_uppercase();
    let millis = Utc::now().timestamp_millis().to_string();
    let time_part = &millis[millis.len().saturating_sub(6)..];
    let random: u16 = rand::thread_rng().gen();
    format!("{prefix}{short_merchant}{time_part}{random:04X}")
}

/// Append correlation parameters to a provider callback URL.
pub fn callback_url(base_url: &str, merchant_id: &str, transaction_id: &str) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{separator}merchantId={merchant_id}&txnId={transaction_id}")
}
