//! # Commission Computation
//!
//! Turns an amount and a rule into a commission.
//!
//! ## Modes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  IMMEDIATE           rate = system                                      │
//! │  SYSTEM_PLUS_MARKUP  rate = system + markup                             │
//! │  MARKUP_ONLY         rate = markup                                      │
//! │                      commission = amount × rate / 100                  │
//! │                                                                         │
//! │  AFTER_DEPOSIT       consumed ──────────────► consumed + amount        │
//! │                      |---- target ----|---- target ----|               │
//! │                                  ▲ crossed: +1 batch payout            │
//! │                      commission = new batches × batch amount           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `system` falls back to the legacy flat rate when the rule has no system
//! rate; `markup` includes any extra markup granted on the sale.
//!
//! ## Example
//! ```rust
//! use backoffice_core::commission::compute_commission_amount;
//! use backoffice_core::{CommissionMode, Money, Rate};
//! # use backoffice_core::CommissionRule;
//! # use chrono::Utc;
//! # let now = Utc::now();
//! # let rule = CommissionRule {
//! #     id: "r".into(), airline_id: "a".into(), route_pattern: "*".into(),
//! #     travel_class: None, commission_mode: CommissionMode::SystemPlusMarkup,
//! #     system_rate_bps: 500, markup_rate_bps: 200, rate_bps: 0,
//! #     default_base_fare_ratio_bps: None, deposit_stock_target_cents: 0,
//! #     deposit_stock_consumed_cents: 0, batch_commission_cents: 0,
//! #     starts_at: now, ends_at: None, is_active: true, created_at: now, updated_at: now,
//! # };
//!
//! let outcome = compute_commission_amount(Money::from_major_minor(1000, 0), &rule, Rate::zero());
//! assert_eq!(outcome.amount, Money::from_major_minor(70, 0));
//! assert_eq!(outcome.rate, Rate::from_bps(700));
//! assert_eq!(outcome.mode_applied, CommissionMode::SystemPlusMarkup);
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{CommissionMode, CommissionRule, Rate};

// =============================================================================
// Resolved Rates
// =============================================================================

/// The rates of a rule with the legacy fallback already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRates {
    pub system: Rate,
    pub markup: Rate,
}

impl ResolvedRates {
    /// Resolves the rule's rates: the system rate falls back to the flat
    /// rate when it is not positive.
    pub fn from_rule(rule: &CommissionRule) -> Self {
        let system = if rule.system_rate().is_positive() {
            rule.system_rate()
        } else {
            rule.flat_rate()
        };

        ResolvedRates {
            system,
            markup: rule.markup_rate(),
        }
    }

    /// Adds extra markup granted on one sale; negative extras are ignored.
    pub fn with_extra_markup(self, extra: Rate) -> Self {
        ResolvedRates {
            system: self.system,
            markup: self.markup + extra.non_negative(),
        }
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// Result of a commission computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CommissionOutcome {
    pub rate: Rate,
    pub amount: Money,
    pub mode_applied: CommissionMode,
}

impl CommissionOutcome {
    fn percentage(amount: Money, rate: Rate, mode: CommissionMode) -> Self {
        CommissionOutcome {
            rate,
            amount: amount.apply_rate(rate),
            mode_applied: mode,
        }
    }
}

// =============================================================================
// Computation
// =============================================================================

/// Computes the commission earned on `amount` under `rule`.
///
/// Pure: for AFTER_DEPOSIT the rule's consumed amount is read, never
/// written. The caller persists `consumed + amount` in the same transaction
/// that observed the consumed value.
pub fn compute_commission_amount(
    amount: Money,
    rule: &CommissionRule,
    extra_markup: Rate,
) -> CommissionOutcome {
    let rates = ResolvedRates::from_rule(rule).with_extra_markup(extra_markup);

    match rule.commission_mode {
        CommissionMode::AfterDeposit => after_deposit(amount, rule),
        CommissionMode::SystemPlusMarkup => CommissionOutcome::percentage(
            amount,
            rates.system + rates.markup,
            CommissionMode::SystemPlusMarkup,
        ),
        CommissionMode::MarkupOnly => {
            CommissionOutcome::percentage(amount, rates.markup, CommissionMode::MarkupOnly)
        }
        CommissionMode::Immediate => {
            CommissionOutcome::percentage(amount, rates.system, CommissionMode::Immediate)
        }
    }
}

/// Number of batches completed by moving the counter from `before` to
/// `before + amount`.
pub fn batches_crossed(before: Money, amount: Money, target: Money) -> i64 {
    let after = before + amount;
    (after.whole_multiples_of(target) - before.whole_multiples_of(target)).max(0)
}

fn after_deposit(amount: Money, rule: &CommissionRule) -> CommissionOutcome {
    let target = rule.deposit_target();
    let batch = rule.batch_commission();

    if !target.is_positive() || !batch.is_positive() {
        return CommissionOutcome {
            rate: Rate::zero(),
            amount: Money::zero(),
            mode_applied: CommissionMode::AfterDeposit,
        };
    }

    let new_batches = batches_crossed(rule.deposit_consumed(), amount, target);
    let commission = batch * new_batches;

    CommissionOutcome {
        rate: Rate::of(commission, amount),
        amount: commission,
        mode_applied: CommissionMode::AfterDeposit,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
