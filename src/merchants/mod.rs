//! Merchant records and aggregate volume tracking.

pub mod aggregator;
pub mod store;

pub use aggregator::MerchantAggregator;
pub use store::{InMemoryMerchantStore, MerchantStore};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MerchantStatus {
    Active,
    Suspended,
}

/// Merchant aggregate record. `monthly_volume` and `transaction_count`
/// are monotonically non-decreasing within a reset period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Merchant {
    pub id: String,
    pub business_name: String,
    pub email: String,
    pub phone: String,
    pub contact_name: Option<String>,
    pub business_type: Option<String>,
    pub tier: String,
    pub status: MerchantStatus,
    pub monthly_volume: Decimal,
    pub transaction_count: u64,
    pub created_at: DateTime<Utc>,
}

/// Registration input; field validation beyond the required trio is the
/// responsibility of the (excluded) registration surface.
#[derive(Debug, Clone, Default)]
pub struct NewMerchant {
    pub business_name: String,
    pub email: String,
    pub phone: String,
    pub contact_name: Option<String>,
    pub business_type: Option<String>,
}
