//! # Airline Overrides
//!
//! Some airlines pay commission by a contract formula that ignores the
//! matched rule's configured rate. The rule must still match: it decides
//! whether the sale is allowed and which deposit counter it feeds.
//!
//! | code  | commission                               | mode               |
//! |-------|------------------------------------------|--------------------|
//! | ACG   | base × 5 %                               | IMMEDIATE          |
//! | MGB   | base × 9 %                               | IMMEDIATE          |
//! | ET    | base × 5 % + agency markup               | SYSTEM_PLUS_MARKUP |
//! | FST   | full amount on every 13th sale, else 0   | IMMEDIATE          |
//! | other | engine result (+ markup unless deposit)  | engine mode        |

use crate::money::Money;
use crate::types::{CommissionMode, Rate};

use super::compute::CommissionOutcome;

/// FST pays the full sale amount on every Nth chronological sale.
pub const FST_BONUS_EVERY: i64 = 13;

const ACG_RATE: Rate = Rate::from_bps(500);
const MGB_RATE: Rate = Rate::from_bps(900);
const ET_SYSTEM_RATE: Rate = Rate::from_bps(500);

/// Commission formula selected by airline code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirlineOverride {
    Acg,
    Mgb,
    Et,
    Fst,
    /// No contract formula: the engine result stands.
    Standard,
}

/// Sale facts an override may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideContext {
    pub sale_amount: Money,
    pub commission_base: Money,
    pub agency_markup: Money,
    /// 1-based position of the sale among the airline's tickets, ordered by
    /// `(sold_at, id)`.
    pub sale_ordinal: i64,
}

impl AirlineOverride {
    pub fn for_code(code: &str) -> Self {
        match code.trim().to_uppercase().as_str() {
            "ACG" => AirlineOverride::Acg,
            "MGB" => AirlineOverride::Mgb,
            "ET" => AirlineOverride::Et,
            "FST" => AirlineOverride::Fst,
            _ => AirlineOverride::Standard,
        }
    }

    /// Whether the formula cannot work on an estimated base.
    pub fn requires_base_fare(&self) -> bool {
        matches!(
            self,
            AirlineOverride::Acg | AirlineOverride::Mgb | AirlineOverride::Et
        )
    }

    /// Whether the sale ordinal must be computed for this airline.
    pub fn needs_sale_ordinal(&self) -> bool {
        matches!(self, AirlineOverride::Fst)
    }

    /// Applies the airline formula on top of the engine result.
    pub fn apply(&self, engine: CommissionOutcome, ctx: OverrideContext) -> CommissionOutcome {
        match self {
            AirlineOverride::Acg => fixed_rate(ctx.commission_base, ACG_RATE),
            AirlineOverride::Mgb => fixed_rate(ctx.commission_base, MGB_RATE),
            AirlineOverride::Et => {
                let amount = ctx.commission_base.apply_rate(ET_SYSTEM_RATE) + ctx.agency_markup;
                CommissionOutcome {
                    rate: Rate::of(amount, ctx.commission_base),
                    amount,
                    mode_applied: CommissionMode::SystemPlusMarkup,
                }
            }
            AirlineOverride::Fst => {
                if is_fst_bonus_sale(ctx.sale_ordinal) {
                    CommissionOutcome {
                        rate: Rate::from_bps(10_000),
                        amount: ctx.sale_amount,
                        mode_applied: CommissionMode::Immediate,
                    }
                } else {
                    CommissionOutcome {
                        rate: Rate::zero(),
                        amount: Money::zero(),
                        mode_applied: CommissionMode::Immediate,
                    }
                }
            }
            AirlineOverride::Standard => {
                if engine.mode_applied == CommissionMode::AfterDeposit {
                    return engine;
                }
                let amount = engine.amount + ctx.agency_markup;
                CommissionOutcome {
                    rate: Rate::of(amount, ctx.commission_base),
                    amount,
                    mode_applied: engine.mode_applied,
                }
            }
        }
    }
}

/// Every 13th sale (13, 26, ...) earns the bonus.
pub fn is_fst_bonus_sale(ordinal: i64) -> bool {
    ordinal > 0 && ordinal % FST_BONUS_EVERY == 0
}

fn fixed_rate(base: Money, rate: Rate) -> CommissionOutcome {
    CommissionOutcome {
        rate,
        amount: base.apply_rate(rate),
        mode_applied: CommissionMode::Immediate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn major(units: i64) -> Money {
        Money::from_major_minor(units, 0)
    }

    fn engine(amount: Money, mode: CommissionMode) -> CommissionOutcome {
        CommissionOutcome {
            rate: Rate::from_bps(300),
            amount,
            mode_applied: mode,
        }
    }

    fn ctx(base: Money, markup: Money, ordinal: i64) -> OverrideContext {
        OverrideContext {
            sale_amount: major(1_000),
            commission_base: base,
            agency_markup: markup,
            sale_ordinal: ordinal,
        }
    }

    #[test]
    fn test_for_code() {
        assert_eq!(AirlineOverride::for_code("acg"), AirlineOverride::Acg);
        assert_eq!(AirlineOverride::for_code(" MGB "), AirlineOverride::Mgb);
        assert_eq!(AirlineOverride::for_code("ET"), AirlineOverride::Et);
        assert_eq!(AirlineOverride::for_code("FST"), AirlineOverride::Fst);
        assert_eq!(AirlineOverride::for_code("AF"), AirlineOverride::Standard);
    }

    #[test]
    fn test_base_fare_requirement() {
        assert!(AirlineOverride::Acg.requires_base_fare());
        assert!(AirlineOverride::Mgb.requires_base_fare());
        assert!(AirlineOverride::Et.requires_base_fare());
        assert!(!AirlineOverride::Fst.requires_base_fare());
        assert!(!AirlineOverride::Standard.requires_base_fare());
    }

    #[test]
    fn test_fixed_rate_airlines_ignore_rule_rate() {
        let eng = engine(major(30), CommissionMode::MarkupOnly);

        let out = AirlineOverride::Acg.apply(eng, ctx(major(800), major(50), 1));
        assert_eq!(out.amount, major(40));
        assert_eq!(out.rate, Rate::from_bps(500));
        assert_eq!(out.mode_applied, CommissionMode::Immediate);

        let out = AirlineOverride::Mgb.apply(eng, ctx(major(800), major(50), 1));
        assert_eq!(out.amount, major(72));
        assert_eq!(out.rate, Rate::from_bps(900));
    }

    #[test]
    fn test_et_adds_markup() {
        let eng = engine(major(30), CommissionMode::Immediate);
        let out = AirlineOverride::Et.apply(eng, ctx(major(800), major(40), 1));
        assert_eq!(out.amount, major(80));
        assert_eq!(out.rate, Rate::from_bps(1_000));
        assert_eq!(out.mode_applied, CommissionMode::SystemPlusMarkup);

        let out = AirlineOverride::Et.apply(eng, ctx(Money::zero(), major(40), 1));
        assert_eq!(out.amount, major(40));
        assert!(out.rate.is_zero());
    }

    #[test]
    fn test_fst_pays_every_thirteenth_sale() {
        let eng = engine(major(30), CommissionMode::Immediate);
        let mut paid = Vec::new();

        for ordinal in 1..=26 {
            let out = AirlineOverride::Fst.apply(eng, ctx(major(600), Money::zero(), ordinal));
            if out.amount.is_positive() {
                assert_eq!(out.amount, major(1_000));
                assert_eq!(out.rate, Rate::from_bps(10_000));
                paid.push(ordinal);
            } else {
                assert!(out.rate.is_zero());
            }
            assert_eq!(out.mode_applied, CommissionMode::Immediate);
        }

        assert_eq!(paid, vec![13, 26]);
    }

    #[test]
    fn test_standard_adds_markup_except_after_deposit() {
        let eng = engine(major(50), CommissionMode::Immediate);
        let out = AirlineOverride::Standard.apply(eng, ctx(major(1_000), major(20), 1));
        assert_eq!(out.amount, major(70));
        assert_eq!(out.rate, Rate::from_bps(700));
        assert_eq!(out.mode_applied, CommissionMode::Immediate);

        let deposit = engine(major(650), CommissionMode::AfterDeposit);
        let out = AirlineOverride::Standard.apply(deposit, ctx(major(700), major(20), 1));
        assert_eq!(out, deposit);
    }
}
