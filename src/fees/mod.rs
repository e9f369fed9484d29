//! Fee engine: bracket tables and deterministic fee/tier computation.

pub mod brackets;
pub mod calculator;

pub use brackets::{FeeBracket, FeeSchedule, MarkupRule, TierBracket};
pub use calculator::{FeeBreakdown, FeeEngine};
