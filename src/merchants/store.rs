//! Merchant store contract and in-memory implementation.
//!
//! Volume increments and the periodic reset are store-level atomic
//! operations: the per-transaction reconciliation lock does not serialize
//! two different transactions of the same merchant, so a read-modify-write
//! across separate calls could lose counts.

use crate::error::{CoreError, CoreResult};
use crate::merchants::Merchant;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait MerchantStore: Send + Sync {
    async fn insert(&self, merchant: Merchant) -> CoreResult<Merchant>;

    async fn get(&self, id: &str) -> CoreResult<Option<Merchant>>;

    async fn list(&self) -> CoreResult<Vec<Merchant>>;

    /// Atomically add to monthly volume and bump the transaction count.
    async fn apply_volume(&self, id: &str, amount: Decimal) -> CoreResult<Merchant>;

    async fn set_tier(&self, id: &str, tier: &str) -> CoreResult<Merchant>;

    /// Zero every merchant's monthly counters; returns how many were reset.
    async fn reset_all_volumes(&self) -> CoreResult<usize>;
}

#[derive(Default)]
pub struct InMemoryMerchantStore {
    merchants: RwLock<HashMap<String, Merchant>>,
}

impl InMemoryMerchantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MerchantStore for InMemoryMerchantStore {
    async fn insert(&self, merchant: Merchant) -> CoreResult<Merchant> {
        let mut merchants = self.merchants.write().await;
        if merchants.contains_key(&merchant.id) {
            return Err(CoreError::DuplicateId {
                id: merchant.id.clone(),
            });
        }
        merchants.insert(merchant.id.clone(), merchant.clone());
        Ok(merchant)
    }

    async fn get(&self, id: &str) -> CoreResult<Option<Merchant>> {
        Ok(self.merchants.read().await.get(id).cloned())
    }

    async fn list(&self) -> CoreResult<Vec<Merchant>> {
        let merchants = self.merchants.read().await;
        let mut all: Vec<Merchant> = merchants.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn apply_volume(&self, id: &str, amount: Decimal) -> CoreResult<Merchant> {
        let mut merchants = self.merchants.write().await;
        let merchant = merchants
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("merchant", id))?;
        merchant.monthly_volume += amount;
        merchant.transaction_count += 1;
        Ok(merchant.clone())
    }

    async fn set_tier(&self, id: &str, tier: &str) -> CoreResult<Merchant> {
        let mut merchants = self.merchants.write().await;
        let merchant = merchants
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("merchant", id))?;
        merchant.tier = tier.to_string();
        Ok(merchant.clone())
    }

    async fn reset_all_volumes(&self) -> CoreResult<usize> {
        let mut merchants = self.merchants.write().await;
        for merchant in merchants.values_mut() {
            merchant.monthly_volume = Decimal::ZERO;
            merchant.transaction_count = 0;
        }
        Ok(merchants.len())
    }
}
