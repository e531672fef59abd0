//! FEFO allocation planning.
//!
//! Planning is pure: it looks at a snapshot of lots and produces a per-lot
//! breakdown without touching any state. Callers apply the plan inside a
//! store transaction, where availability is re-checked by the lot guards.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use lotwise_core::{Entity, LotReservation, StockError, StockResult};
use lotwise_stock::StockLot;

/// A satisfiable allocation: per-lot quantities summing to the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub allocations: Vec<LotReservation>,
}

impl AllocationPlan {
    pub fn total(&self) -> u32 {
        self.allocations.iter().map(|a| a.quantity).sum()
    }
}

/// Availability for a request, without committing anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub requested: u32,
    pub available: u32,
    pub shortfall: u32,
}

impl AvailabilityReport {
    pub fn is_sufficient(&self) -> bool {
        self.shortfall == 0
    }
}

/// First-Expired-First-Out ordering over lots.
///
/// Earliest expiry first; lots without an expiry date sort last. Ties break
/// on receipt time, then lot id, so the order is total and stable across
/// runs.
pub fn fefo_order(a: &StockLot, b: &StockLot) -> Ordering {
    let by_expiry = match (a.expiry_date(), b.expiry_date()) {
        (Some(ea), Some(eb)) => ea.cmp(&eb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_expiry
        .then_with(|| a.created_at().cmp(&b.created_at()))
        .then_with(|| Entity::id(a).cmp(Entity::id(b)))
}

/// Stateless FEFO planner.
pub struct AllocationEngine;

impl AllocationEngine {
    /// Plan an allocation of `quantity` units from `lots`.
    ///
    /// Only allocatable lots (active, unexpired, with availability) are
    /// considered. Greedy in FEFO order: each lot contributes everything it
    /// has until the request is filled. Fails with `InsufficientStock` when
    /// the candidates cannot cover the request, and plans nothing partially.
    pub fn plan(lots: &[StockLot], quantity: u32, today: NaiveDate) -> StockResult<AllocationPlan> {
        if quantity == 0 {
            return Err(StockError::validation(
                "allocation quantity must be positive",
            ));
        }
        let mut candidates: Vec<&StockLot> =
            lots.iter().filter(|l| l.is_allocatable(today)).collect();
        candidates.sort_by(|a, b| fefo_order(a, b));

        let mut remaining = quantity;
        let mut allocations = Vec::new();
        for lot in candidates {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(lot.available_quantity());
            allocations.push(LotReservation::new(
                *Entity::id(lot),
                lot.lot_number(),
                take,
            ));
            remaining -= take;
        }

        if remaining > 0 {
            return Err(StockError::insufficient_stock(
                quantity,
                quantity - remaining,
            ));
        }
        Ok(AllocationPlan { allocations })
    }

    /// Report how much of `quantity` the allocatable lots could cover.
    pub fn check_availability(
        lots: &[StockLot],
        quantity: u32,
        today: NaiveDate,
    ) -> AvailabilityReport {
        let available: u32 = lots
            .iter()
            .filter(|l| l.is_allocatable(today))
            .map(|l| l.available_quantity())
            .sum();
        AvailabilityReport {
            requested: quantity,
            available,
            shortfall: quantity.saturating_sub(available),
        }
    }
}
