//! Fee bracket and subscription tier tables.
//!
//! Both tables are contiguous, gap-free partitions of their domain:
//! `max + 1 == next.min` for every adjacent pair and only the last entry is
//! unbounded. The tables are immutable after process start; a table that
//! fails validation is a configuration bug, not a user error.

use crate::error::{CoreError, CoreResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Markup added on top of the provider's own fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MarkupRule {
    Flat { value: Decimal },
    Percent { rate: Decimal, cap: Option<Decimal> },
}

/// One contiguous amount range with a fixed provider fee and a markup rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeBracket {
    pub min: Decimal,
    /// `None` means unbounded (the last bracket).
    pub max: Option<Decimal>,
    pub provider_fee: Decimal,
    pub markup: MarkupRule,
}

impl FeeBracket {
    pub fn contains(&self, amount: Decimal) -> bool {
        amount >= self.min && self.max.map_or(true, |max| amount <= max)
    }
}

/// Merchant subscription tier derived from trailing monthly volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierBracket {
    pub name: String,
    pub min_volume: Decimal,
    pub max_volume: Option<Decimal>,
    pub monthly_fee: Decimal,
}

impl TierBracket {
    pub fn contains(&self, volume: Decimal) -> bool {
        volume >= self.min_volume && self.max_volume.map_or(true, |max| volume <= max)
    }
}

/// The immutable fee/tier schedule shared by the fee engine and the
/// merchant aggregator.
#[derive(Debug, Clone)]
pub struct FeeSchedule {
    pub brackets: Vec<FeeBracket>,
    pub tiers: Vec<TierBracket>,
}

impl FeeSchedule {
    /// The standard M-Pesa tariff brackets plus our markup, and the four
    /// subscription tiers.
    pub fn standard() -> Self {
        fn percent(rate: Decimal, cap: i64) -> MarkupRule {
            MarkupRule::Percent {
                rate,
                cap: Some(Decimal::from(cap)),
            }
        }

        let brackets = vec![
            FeeBracket {
                min: Decimal::ONE,
                max: Some(Decimal::from(100)),
                provider_fee: Decimal::ZERO,
                markup: MarkupRule::Flat {
                    value: Decimal::from(10),
                },
            },
            FeeBracket {
                min: Decimal::from(101),
                max: Some(Decimal::from(500)),
                provider_fee: Decimal::from(7),
                markup: percent(Decimal::new(15, 1), 5),
            },
            FeeBracket {
                min: Decimal::from(501),
                max: Some(Decimal::from(1000)),
                provider_fee: Decimal::from(13),
                markup: percent(Decimal::new(15, 1), 10),
            },
            FeeBracket {
                min: Decimal::from(1001),
                max: Some(Decimal::from(2500)),
                provider_fee: Decimal::from(33),
                markup: percent(Decimal::new(125, 2), 20),
            },
            FeeBracket {
                min: Decimal::from(2501),
                max: Some(Decimal::from(5000)),
                provider_fee: Decimal::from(57),
                markup: percent(Decimal::ONE, 30),
            },
            FeeBracket {
                min: Decimal::from(5001),
                max: Some(Decimal::from(15000)),
                provider_fee: Decimal::from(100),
                markup: percent(Decimal::new(75, 2), 50),
            },
            FeeBracket {
                min: Decimal::from(15001),
                max: Some(Decimal::from(50000)),
                provider_fee: Decimal::from(108),
                markup: percent(Decimal::new(5, 1), 75),
            },
            FeeBracket {
                min: Decimal::from(50001),
                max: None,
                provider_fee: Decimal::from(108),
                markup: percent(Decimal::new(25, 2), 100),
            },
        ];

        let tiers = vec![
            TierBracket {
                name: "Starter".to_string(),
                min_volume: Decimal::ZERO,
                max_volume: Some(Decimal::from(500_000)),
                monthly_fee: Decimal::from(800),
            },
            TierBracket {
                name: "Growing".to_string(),
                min_volume: Decimal::from(500_001),
                max_volume: Some(Decimal::from(1_000_000)),
                monthly_fee: Decimal::from(600),
            },
            TierBracket {
                name: "Business".to_string(),
                min_volume: Decimal::from(1_000_001),
                max_volume: Some(Decimal::from(5_000_000)),
                monthly_fee: Decimal::from(400),
            },
            TierBracket {
                name: "Enterprise".to_string(),
                min_volume: Decimal::from(5_000_001),
                max_volume: None,
                monthly_fee: Decimal::ZERO,
            },
        ];

        Self { brackets, tiers }
    }

    /// Check the partition invariants for both tables.
    pub fn validate(&self) -> CoreResult<()> {
        validate_partition(
            "fee bracket",
            Decimal::ONE,
            self.brackets
                .iter()
                .map(|b| (b.min, b.max))
                .collect::<Vec<_>>()
                .as_slice(),
        )?;
        validate_partition(
            "subscription tier",
            Decimal::ZERO,
            self.tiers
                .iter()
                .map(|t| (t.min_volume, t.max_volume))
                .collect::<Vec<_>>()
                .as_slice(),
        )?;

        for bracket in &self.brackets {
            if bracket.provider_fee < Decimal::ZERO {
                return Err(CoreError::consistency(format!(
                    "negative provider fee in bracket starting at {}",
                    bracket.min
                )));
            }
            match &bracket.markup {
                MarkupRule::Flat { value } if *value < Decimal::ZERO => {
                    return Err(CoreError::consistency(format!(
                        "negative flat markup in bracket starting at {}",
                        bracket.min
                    )));
                }
                MarkupRule::Percent { rate, cap } => {
                    if *rate < Decimal::ZERO || cap.map_or(false, |c| c < Decimal::ZERO) {
                        return Err(CoreError::consistency(format!(
                            "negative percent markup in bracket starting at {}",
                            bracket.min
                        )));
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}

fn validate_partition(
    label: &str,
    expected_first_min: Decimal,
    ranges: &[(Decimal, Option<Decimal>)],
) -> CoreResult<()> {
    if ranges.is_empty() {
        return Err(CoreError::consistency(format!("{label} table is empty")));
    }

    if ranges[0].0 != expected_first_min {
        return Err(CoreError::consistency(format!(
            "{label} table must start at {expected_first_min}, found {}",
            ranges[0].0
        )));
    }

    for (index, (min, max)) in ranges.iter().enumerate() {
        let is_last = index == ranges.len() - 1;
        match max {
            None if !is_last => {
                return Err(CoreError::consistency(format!(
                    "{label} table has an unbounded entry before the last position"
                )));
            }
            None => {}
            Some(max) => {
                if min > max {
                    return Err(CoreError::consistency(format!(
                        "{label} range [{min}, {max}] is inverted"
                    )));
                }
                if is_last {
                    return Err(CoreError::consistency(format!(
                        "{label} table must end with an unbounded entry"
                    )));
                }
                let next_min = ranges[index + 1].0;
                if *max + Decimal::ONE != next_min {
                    return Err(CoreError::consistency(format!(
                        "{label} table has a gap or overlap between {max} and {next_min}"
                    )));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_schedule_is_valid() {
        FeeSchedule::standard().validate().expect("valid schedule");
    }

    #[test]
    fn gap_in_brackets_is_rejected() {
        let mut schedule = FeeSchedule::standard();
        // Open a gap between the first and second bracket.
        schedule.brackets[1].min = Decimal::from(102);
        let err = schedule.validate().unwrap_err();
        assert_eq!(err.fault_kind(), "consistency_fault");
    }

    #[test]
    fn overlapping_brackets_are_rejected() {
        let mut schedule = FeeSchedule::standard();
        schedule.brackets[1].min = Decimal::from(100);
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn bounded_last_bracket_is_rejected() {
        let mut schedule = FeeSchedule::standard();
        let last = schedule.brackets.last_mut().unwrap();
        last.max = Some(Decimal::from(1_000_000));
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn adjacent_brackets_are_exclusive() {
        let schedule = FeeSchedule::standard();
        let hundred = Decimal::from(100);
        let hundred_one = Decimal::from(101);
        let covering_100: Vec<_> = schedule
            .brackets
            .iter()
            .filter(|b| b.contains(hundred))
            .collect();
        let covering_101: Vec<_> = schedule
            .brackets
            .iter()
            .filter(|b| b.contains(hundred_one))
            .collect();
        assert_eq!(covering_100.len(), 1);
        assert_eq!(covering_101.len(), 1);
        assert_ne!(covering_100[0].min, covering_101[0].min);
    }
}
