//! # Ticket Commission Quote
//!
//! Assembles the full commission of one ticket from the pieces in the
//! sibling modules. The persistence layer drives the steps in order:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. require_base_fare        override needs a real base fare?          │
//! │  2. resolve_commission_base  explicit │ sale amount │ estimate         │
//! │  3. deposit_increment        how much the rule counter grows           │
//! │        (db: UPDATE ... RETURNING, snapshot consumed before increment)  │
//! │  4. quote_ticket_commission  engine + override ──► TicketCommission    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CommissionMode, CommissionRule, CommissionStatus, Rate, Ticket};

use super::compute::compute_commission_amount;
use super::estimate::{estimate_base_fare, FareSample};
use super::overrides::{AirlineOverride, OverrideContext};

// =============================================================================
// Commission Base
// =============================================================================

/// The amount percentage commissions are computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedBase {
    pub amount: Money,
    pub status: CommissionStatus,
}

/// Fails when the airline's formula needs a base fare and none was given.
pub fn require_base_fare(
    airline_override: AirlineOverride,
    airline_code: &str,
    base_fare: Option<Money>,
) -> CoreResult<()> {
    if airline_override.requires_base_fare() && base_fare.is_none() {
        return Err(CoreError::MissingRequiredBaseFare {
            airline_code: airline_code.to_string(),
        });
    }
    Ok(())
}

/// Whether the base must be estimated from history.
pub fn needs_estimation(base_fare: Option<Money>, rule: &CommissionRule) -> bool {
    base_fare.is_none() && rule.commission_mode != CommissionMode::AfterDeposit
}

/// Resolves the commission base.
///
/// An explicit base fare is used as-is. AFTER_DEPOSIT rules count the whole
/// sale amount. Otherwise the base is estimated from `history`.
pub fn resolve_commission_base(
    sale_amount: Money,
    base_fare: Option<Money>,
    rule: &CommissionRule,
    history: &[FareSample],
) -> ResolvedBase {
    if let Some(base) = base_fare {
        return ResolvedBase {
            amount: base,
            status: CommissionStatus::Final,
        };
    }

    if rule.commission_mode == CommissionMode::AfterDeposit {
        return ResolvedBase {
            amount: sale_amount,
            status: CommissionStatus::Final,
        };
    }

    ResolvedBase {
        amount: estimate_base_fare(sale_amount, history, rule.default_base_fare_ratio()),
        status: CommissionStatus::Estimated,
    }
}

// =============================================================================
// Deposit Counter
// =============================================================================

/// What earlier versions of a ticket already contributed to one rule's
/// deposit counter.
///
/// The persistence layer keeps one credit per (ticket, rule), so a ticket
/// that leaves a deposit rule and later returns to it finds its old credit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorDepositCredit {
    pub rule_id: String,
    /// Amount already added to the rule's consumed counter.
    pub counted: Money,
    /// Batch commission already credited to the ticket.
    pub credited: Money,
}

impl PriorDepositCredit {
    /// The credit a priced ticket holds under its current rule. `None` when
    /// that rule's counter was never fed by the ticket.
    pub fn from_ticket(ticket: &Ticket) -> Option<Self> {
        if ticket.deposit_counted_cents <= 0 {
            return None;
        }

        let credited = if ticket.commission_mode == CommissionMode::AfterDeposit {
            ticket.commission()
        } else {
            Money::zero()
        };

        Some(PriorDepositCredit {
            rule_id: ticket.commission_rule_id.clone(),
            counted: Money::from_cents(ticket.deposit_counted_cents),
            credited,
        })
    }

    fn applies_to(&self, rule: &CommissionRule) -> bool {
        self.rule_id == rule.id
    }
}

/// How much the rule's consumed counter grows for this sale.
///
/// Without a credit under this rule the full amount counts. With one, only
/// growth over what was already counted does; the counter never shrinks.
pub fn deposit_increment(
    sale_amount: Money,
    rule: &CommissionRule,
    prior: Option<&PriorDepositCredit>,
) -> Money {
    if rule.commission_mode != CommissionMode::AfterDeposit {
        return Money::zero();
    }

    match prior {
        Some(prior) if prior.applies_to(rule) => (sale_amount - prior.counted).clamp_non_negative(),
        _ => sale_amount.clamp_non_negative(),
    }
}

// =============================================================================
// Quote
// =============================================================================

/// Everything needed to quote one ticket.
///
/// `rule` must carry the consumed counter as it was before this sale's
/// increment.
#[derive(Debug, Clone)]
pub struct QuoteRequest<'a> {
    pub rule: &'a CommissionRule,
    pub airline_override: AirlineOverride,
    pub sale_amount: Money,
    pub base: ResolvedBase,
    pub agency_markup: Money,
    pub extra_markup: Rate,
    pub sale_ordinal: i64,
    pub deposit_increment: Money,
    pub prior: Option<&'a PriorDepositCredit>,
}

/// The derived commission fields of a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TicketCommission {
    pub rule_id: String,
    pub rate: Rate,
    pub amount: Money,
    pub mode: CommissionMode,
    pub base: Money,
    pub status: CommissionStatus,
    /// New value of the ticket's `deposit_counted_cents`.
    pub deposit_counted: Money,
}

/// Computes the commission of a ticket.
pub fn quote_ticket_commission(req: &QuoteRequest<'_>) -> TicketCommission {
    let is_deposit = req.rule.commission_mode == CommissionMode::AfterDeposit;
    let same_rule_prior = req.prior.filter(|p| p.applies_to(req.rule));

    let engine_amount = if is_deposit {
        req.deposit_increment
    } else {
        req.base.amount
    };
    let mut engine = compute_commission_amount(engine_amount, req.rule, req.extra_markup);

    if is_deposit {
        if let Some(prior) = same_rule_prior {
            engine.amount += prior.credited;
            engine.rate = Rate::of(engine.amount, req.sale_amount);
        }
    }

    let outcome = req.airline_override.apply(
        engine,
        OverrideContext {
            sale_amount: req.sale_amount,
            commission_base: req.base.amount,
            agency_markup: req.agency_markup,
            sale_ordinal: req.sale_ordinal,
        },
    );

    let deposit_counted = match (is_deposit, same_rule_prior) {
        (false, _) => Money::zero(),
        (true, Some(prior)) => prior.counted + req.deposit_increment,
        (true, None) => req.deposit_increment,
    };

    TicketCommission {
        rule_id: req.rule.id.clone(),
        rate: outcome.rate,
        amount: outcome.amount,
        mode: outcome.mode_applied,
        base: req.base.amount,
        status: req.base.status,
        deposit_counted,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
