//! Periodic merchant housekeeping: tier recomputation from the closing
//! month's volume, then the monthly counter reset.

use crate::error::CoreResult;
use crate::merchants::MerchantAggregator;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct ResetSummary {
    pub merchants_processed: usize,
    pub tier_changes: usize,
}

pub struct HousekeepingService {
    merchants: Arc<MerchantAggregator>,
}

impl HousekeepingService {
    pub fn new(merchants: Arc<MerchantAggregator>) -> Self {
        Self { merchants }
    }

    /// Tiers are derived from the volume the merchant closed the month
    /// with, so recomputation must happen before the counters zero out.
    pub async fn run_monthly_reset(&self) -> CoreResult<ResetSummary> {
        info!("monthly_reset_started");
        let merchants = self.merchants.list().await?;

        let mut summary = ResetSummary::default();
        for merchant in &merchants {
            match self.merchants.recompute_tier(&merchant.id).await {
                Ok(tier) => {
                    summary.merchants_processed += 1;
                    if tier.name != merchant.tier {
                        summary.tier_changes += 1;
                    }
                }
                Err(err) => {
                    // One bad merchant must not block the reset for the
                    // rest.
                    error!(
                        merchant_id = %merchant.id,
                        error = %err,
                        "tier_recompute_failed"
                    );
                }
            }
        }

        let reset_count = self.merchants.reset_all().await?;
        info!(
            merchants_processed = summary.merchants_processed,
            tier_changes = summary.tier_changes,
            volumes_reset = reset_count,
            "monthly_reset_completed"
        );
        Ok(summary)
    }
}
