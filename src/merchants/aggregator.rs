//! Merchant aggregate counters and tier management.

use crate::error::{CoreError, CoreResult};
use crate::fees::{FeeEngine, TierBracket};
use crate::merchants::store::MerchantStore;
use crate::merchants::{Merchant, MerchantStatus, NewMerchant};
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Tracks rolling monthly volume and transaction counts per merchant and
/// derives the subscription tier from the fee engine's tier table.
pub struct MerchantAggregator {
    store: Arc<dyn MerchantStore>,
    fees: Arc<FeeEngine>,
}

impl MerchantAggregator {
    pub fn new(store: Arc<dyn MerchantStore>, fees: Arc<FeeEngine>) -> Self {
        Self { store, fees }
    }

    /// Register a merchant with a generated id and the entry tier.
    pub async fn register(&self, input: NewMerchant) -> CoreResult<Merchant> {
        if input.business_name.trim().is_empty() {
            return Err(CoreError::validation_field(
                "business name is required",
                "business_name",
            ));
        }
        if input.email.trim().is_empty() {
            return Err(CoreError::validation_field("email is required", "email"));
        }
        if input.phone.trim().is_empty() {
            return Err(CoreError::validation_field("phone is required", "phone"));
        }

        let entry_tier = self.fees.tier_for_volume(Decimal::ZERO)?.name.clone();
        let random: u16 = rand::thread_rng().gen_range(0..1000);
        let merchant = Merchant {
            id: format!("M{}{random:03}", Utc::now().timestamp_millis()),
            business_name: input.business_name,
            email: input.email,
            phone: input.phone,
            contact_name: input.contact_name,
            business_type: input.business_type,
            tier: entry_tier,
            status: MerchantStatus::Active,
            monthly_volume: Decimal::ZERO,
            transaction_count: 0,
            created_at: Utc::now(),
        };

        let created = self.store.insert(merchant).await?;
        info!(merchant_id = %created.id, tier = %created.tier, "merchant_registered");
        Ok(created)
    }

    pub async fn get(&self, merchant_id: &str) -> CoreResult<Merchant> {
        self.store
            .get(merchant_id)
            .await?
            .ok_or_else(|| CoreError::not_found("merchant", merchant_id))
    }

    /// Record a completed transaction's volume. Invoked exactly once per
    /// COMPLETED transaction; the ledger's terminal-state guard is the
    /// idempotency boundary, not this method.
    pub async fn record_completed_volume(
        &self,
        merchant_id: &str,
        amount: Decimal,
    ) -> CoreResult<Merchant> {
        let merchant = self.store.apply_volume(merchant_id, amount).await?;
        info!(
            merchant_id = %merchant.id,
            amount = %amount,
            monthly_volume = %merchant.monthly_volume,
            "merchant_volume_recorded"
        );
        Ok(merchant)
    }

    /// Derive and persist the tier for the merchant's current volume.
    pub async fn recompute_tier(&self, merchant_id: &str) -> CoreResult<TierBracket> {
        let merchant = self.get(merchant_id).await?;
        let tier = self.fees.tier_for_volume(merchant.monthly_volume)?.clone();
        if tier.name != merchant.tier {
            info!(
                merchant_id = %merchant_id,
                previous_tier = %merchant.tier,
                tier = %tier.name,
                "merchant_tier_changed"
            );
        }
        self.store.set_tier(merchant_id, &tier.name).await?;
        Ok(tier)
    }

    /// Zero every merchant's monthly counters. Called by housekeeping,
    /// never by transaction processing.
    pub async fn reset_all(&self) -> CoreResult<usize> {
        self.store.reset_all_volumes().await
    }

    pub async fn list(&self) -> CoreResult<Vec<Merchant>> {
        self.store.list().await
    }
}
