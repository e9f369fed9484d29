//! Fee computation and tier lookup over the immutable schedule.

use crate::error::{CoreError, CoreResult};
use crate::fees::brackets::{FeeSchedule, MarkupRule, TierBracket};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fee breakdown for a single transaction amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub amount: Decimal,
    pub provider_fee: Decimal,
    pub markup: Decimal,
    pub total_fee: Decimal,
    pub net_amount: Decimal,
}

/// Pure fee engine. Deterministic and side-effect free; safe to share
/// across tasks without coordination.
#[derive(Debug, Clone)]
pub struct FeeEngine {
    schedule: FeeSchedule,
}

impl FeeEngine {
    pub fn new(schedule: FeeSchedule) -> CoreResult<Self> {
        schedule.validate()?;
        Ok(Self { schedule })
    }

    pub fn standard() -> CoreResult<Self> {
        Self::new(FeeSchedule::standard())
    }

    pub fn schedule(&self) -> &FeeSchedule {
        &self.schedule
    }

    /// Compute the fee breakdown for a positive whole-unit amount.
    ///
    /// Amounts are whole currency units; the bracket partition is defined
    /// over integers, so a fractional amount is rejected up front rather
    /// than falling between two adjacent brackets.
    pub fn compute_fees(&self, amount: Decimal) -> CoreResult<FeeBreakdown> {
        if amount <= Decimal::ZERO {
            return Err(CoreError::validation_field(
                format!("amount must be greater than zero, got {amount}"),
                "amount",
            ));
        }
        if !amount.fract().is_zero() {
            return Err(CoreError::validation_field(
                format!("amount must be a whole number of currency units, got {amount}"),
                "amount",
            ));
        }

        let bracket = self
            .schedule
            .brackets
            .iter()
            .find(|b| b.contains(amount))
            .ok_or_else(|| {
                // Unreachable for validated input given the partition
                // invariant; an internal fault if it ever fires.
                CoreError::consistency(format!("no fee bracket covers amount {amount}"))
            })?;

        let markup = match &bracket.markup {
            MarkupRule::Flat { value } => *value,
            MarkupRule::Percent { rate, cap } => {
                let raw = amount * *rate / Decimal::ONE_HUNDRED;
                match cap {
                    Some(cap) => raw.min(*cap),
                    None => raw,
                }
            }
        };

        let total_fee = bracket.provider_fee + markup;
        Ok(FeeBreakdown {
            amount,
            provider_fee: bracket.provider_fee,
            markup,
            total_fee,
            net_amount: amount - total_fee,
        })
    }

    /// Look up the subscription tier for a merchant's monthly volume.
    pub fn tier_for_volume(&self, monthly_volume: Decimal) -> CoreResult<&TierBracket> {
        if monthly_volume < Decimal::ZERO {
            return Err(CoreError::validation_field(
                format!("monthly volume cannot be negative, got {monthly_volume}"),
                "monthly_volume",
            ));
        }

        self.schedule
            .tiers
            .iter()
            .find(|t| t.contains(monthly_volume))
            .ok_or_else(|| {
                CoreError::consistency(format!(
                    "no subscription tier covers monthly volume {monthly_volume}"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn engine() -> FeeEngine {
        FeeEngine::standard().expect("standard schedule is valid")
    }

    #[test]
    fn flat_bracket_applies_fixed_markup() {
        let fees = engine().compute_fees(dec!(50)).unwrap();
        assert_eq!(fees.provider_fee, dec!(0));
        assert_eq!(fees.markup, dec!(10));
        assert_eq!(fees.total_fee, dec!(10));
        assert_eq!(fees.net_amount, dec!(40));
    }

    #[test]
    fn percent_markup_below_cap() {
        // 200 * 1.5% = 3, below the bracket cap of 5.
        let fees = engine().compute_fees(dec!(200)).unwrap();
        assert_eq!(fees.provider_fee, dec!(7));
        assert_eq!(fees.markup, dec!(3));
        assert_eq!(fees.total_fee, dec!(10));
    }

    #[test]
    fn percent_markup_is_capped() {
        // 2000 * 1.25% = 25, capped at 20.
        let fees = engine().compute_fees(dec!(2000)).unwrap();
        assert_eq!(fees.provider_fee, dec!(33));
        assert_eq!(fees.markup, dec!(20));
        assert_eq!(fees.total_fee, dec!(53));
        assert_eq!(fees.net_amount, dec!(1947));
    }

    #[test]
    fn boundary_amounts_resolve_to_adjacent_brackets() {
        let at_100 = engine().compute_fees(dec!(100)).unwrap();
        let at_101 = engine().compute_fees(dec!(101)).unwrap();
        assert_eq!(at_100.provider_fee, dec!(0));
        assert_eq!(at_101.provider_fee, dec!(7));
    }

    #[test]
    fn fee_identity_holds_across_all_brackets() {
        let engine = engine();
        for amount in [1i64, 100, 101, 500, 501, 1000, 1001, 2500, 5000, 15000, 50001, 9_000_000]
        {
            let amount = Decimal::from(amount);
            let fees = engine.compute_fees(amount).unwrap();
            assert_eq!(fees.total_fee, fees.provider_fee + fees.markup);
            assert_eq!(fees.net_amount, amount - fees.total_fee);
            assert!(fees.total_fee >= Decimal::ZERO);
            assert!(fees.net_amount <= amount);
        }
    }

    #[test]
    fn percent_markup_never_exceeds_cap() {
        let engine = engine();
        for amount in [101i64, 499, 999, 2499, 4999, 14999, 49999, 1_000_000] {
            let fees = engine.compute_fees(Decimal::from(amount)).unwrap();
            let bracket = engine
                .schedule()
                .brackets
                .iter()
                .find(|b| b.contains(Decimal::from(amount)))
                .unwrap();
            if let MarkupRule::Percent { cap: Some(cap), .. } = &bracket.markup {
                assert!(fees.markup <= *cap, "markup {} over cap {cap}", fees.markup);
            }
        }
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        assert!(matches!(
            engine().compute_fees(dec!(0)),
            Err(CoreError::Validation { .. })
        ));
        assert!(matches!(
            engine().compute_fees(dec!(-10)),
            Err(CoreError::Validation { .. })
        ));
    }

    #[test]
    fn fractional_amounts_are_rejected() {
        assert!(matches!(
            engine().compute_fees(dec!(100.50)),
            Err(CoreError::Validation { .. })
        ));
    }

    #[test]
    fn tier_lookup_matches_volume_boundaries() {
        let engine = engine();
        assert_eq!(engine.tier_for_volume(dec!(0)).unwrap().name, "Starter");
        assert_eq!(
            engine.tier_for_volume(dec!(500000)).unwrap().name,
            "Starter"
        );
        assert_eq!(
            engine.tier_for_volume(dec!(500001)).unwrap().name,
            "Growing"
        );
        assert_eq!(
            engine.tier_for_volume(dec!(5000001)).unwrap().name,
            "Enterprise"
        );
    }

    #[test]
    fn negative_volume_is_rejected() {
        assert!(engine().tier_for_volume(dec!(-1)).is_err());
    }
}
