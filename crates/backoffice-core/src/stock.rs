//! # Stock Ledger Bookkeeping
//!
//! Pure rules of the stock ledger. Posting and persistence live in the
//! database crate; this module decides what a movement may do.
//!
//! ## Ledger Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  StockMovement log (append-only)        StockItem.current_quantity     │
//! │  ───────────────────────────────        ──────────────────────────     │
//! │  IN   80  Ramette A4                    80                             │
//! │  OUT  15  Ramette A4                    65                             │
//! │  OUT 100  Ramette A4   ✗ rejected       65 (unchanged)                 │
//! │                                                                         │
//! │  Invariant: current_quantity = Σ IN − Σ OUT ≥ 0                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust
//! use backoffice_core::stock::plan_movement;
//! use backoffice_core::{MovementDirection, StockItemKey};
//!
//! let key = StockItemKey::new("Ramette A4", "Fournitures", "paquet");
//! // First IN creates the item
//! assert_eq!(plan_movement(None, &key, MovementDirection::In, 80).unwrap(), 80);
//! // OUT on an unknown item is rejected
//! assert!(plan_movement(None, &key, MovementDirection::Out, 1).is_err());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::{MovementDirection, StockItem, StockItemKey, StockMovement};
use crate::validation::validate_movement_quantity;

// =============================================================================
// Posting Rules
// =============================================================================

/// Computes the item quantity after a movement, or rejects the movement.
///
/// `current` is the item as stored, `None` when it has never been received.
pub fn plan_movement(
    current: Option<&StockItem>,
    key: &StockItemKey,
    direction: MovementDirection,
    quantity: i64,
) -> CoreResult<i64> {
    validate_movement_quantity(quantity)?;

    let available = match (current, direction) {
        (Some(item), _) => item.current_quantity,
        (None, MovementDirection::In) => 0,
        (None, MovementDirection::Out) => {
            return Err(CoreError::ItemNeverReceived {
                item: key.to_string(),
            })
        }
    };

    apply_delta(key, available, direction, quantity)
}

fn apply_delta(
    key: &StockItemKey,
    available: i64,
    direction: MovementDirection,
    quantity: i64,
) -> CoreResult<i64> {
    let next = available + direction.signed(quantity);

    if next < 0 {
        return Err(CoreError::InsufficientStock {
            item: key.to_string(),
            available,
            requested: quantity,
        });
    }

    Ok(next)
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Per-item totals recomputed from the movement log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockTotals {
    pub in_qty: i64,
    pub out_qty: i64,
    /// `max(0, in_qty - out_qty)`
    pub resulting_quantity: i64,
}

/// Recomputes every item's balance from the full movement history, keyed by
/// item id.
///
/// Items without movements are absent from the map.
pub fn reconcile_stock_totals(movements: &[StockMovement]) -> BTreeMap<String, StockTotals> {
    let mut totals: BTreeMap<String, StockTotals> = BTreeMap::new();

    for movement in movements {
        let entry = totals.entry(movement.item_id.clone()).or_default();
        match movement.direction {
            MovementDirection::In => entry.in_qty += movement.quantity,
            MovementDirection::Out => entry.out_qty += movement.quantity,
        }
    }

    for entry in totals.values_mut() {
        entry.resulting_quantity = (entry.in_qty - entry.out_qty).max(0);
    }

    totals
}

/// Applies movements one by one with the posting rules.
///
/// Returns the final balance per item id, or the first rejection. A log
/// produced by successful postings always replays cleanly and agrees with
/// [`reconcile_stock_totals`].
pub fn replay_movements(movements: &[StockMovement]) -> CoreResult<BTreeMap<String, i64>> {
    let mut balances: BTreeMap<String, i64> = BTreeMap::new();

    for movement in movements {
        let key = StockItemKey::new(&movement.item_id, "", "");
        validate_movement_quantity(movement.quantity)?;

        let next = match (balances.get(&movement.item_id), movement.direction) {
            (Some(available), direction) => {
                apply_delta(&key, *available, direction, movement.quantity)?
            }
            (None, MovementDirection::In) => movement.quantity,
            (None, MovementDirection::Out) => {
                return Err(CoreError::ItemNeverReceived {
                    item: movement.item_id.clone(),
                })
            }
        };

        balances.insert(movement.item_id.clone(), next);
    }

    Ok(balances)
}

// =============================================================================
// Unit Tests
// =============================================================================
