//! Reservation and stock movement primitives.
//!
//! The `ops` module holds the state-level building blocks: each function
//! mutates lot and balance together so the pair never drifts apart. Workflows
//! compose several of them inside a single store transaction; the public
//! [`ReservationManager`] wraps single operations for direct callers.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use lotwise_core::{Entity, LotId, LotReservation, StockKey, StockResult};
use lotwise_stock::LotSpec;

use crate::allocation::{AllocationEngine, AvailabilityReport};
use crate::store::StockStore;

pub(crate) mod ops {
    use lotwise_core::StockError;
    use lotwise_stock::{LotStatus, StockLot};

    use super::*;
    use crate::allocation::fefo_order;
    use crate::store::StockState;

    /// Hold `quantity` units on a specific lot.
    pub(crate) fn reserve(
        state: &mut StockState,
        lot_id: LotId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> StockResult<()> {
        let key = state.lot(lot_id)?.key();
        state.lot_mut(lot_id)?.reserve(quantity, now)?;
        state.balance_mut(key, now).reserve(quantity, now)?;
        Ok(())
    }

    /// Return `quantity` reserved units on a lot to available.
    pub(crate) fn release(
        state: &mut StockState,
        lot_id: LotId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> StockResult<()> {
        let key = state.lot(lot_id)?.key();
        state.lot_mut(lot_id)?.release(quantity, now)?;
        state.balance_mut(key, now).release(quantity, now)?;
        Ok(())
    }

    /// Issue `quantity` unreserved units from a lot.
    pub(crate) fn consume(
        state: &mut StockState,
        lot_id: LotId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> StockResult<()> {
        let key = state.lot(lot_id)?.key();
        state.lot_mut(lot_id)?.consume(quantity, now)?;
        state.balance_mut(key, now).remove_quantity(quantity, now)?;
        Ok(())
    }

    /// Issue `quantity` reserved units from a lot, clearing the hold.
    pub(crate) fn consume_reserved(
        state: &mut StockState,
        lot_id: LotId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> StockResult<()> {
        let key = state.lot(lot_id)?.key();
        state.lot_mut(lot_id)?.consume_reserved(quantity, now)?;
        state.balance_mut(key, now).consume_reserved(quantity, now)?;
        Ok(())
    }

    /// Reserve `quantity` units at a key in FEFO order, returning the per-lot
    /// breakdown.
    pub(crate) fn reserve_fefo(
        state: &mut StockState,
        key: StockKey,
        quantity: u32,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> StockResult<Vec<LotReservation>> {
        let lots: Vec<StockLot> = state
            .allocatable_lots(key, today)
            .into_iter()
            .cloned()
            .collect();
        let plan = AllocationEngine::plan(&lots, quantity, today)?;
        for allocation in &plan.allocations {
            reserve(state, allocation.lot_id, allocation.quantity, now)?;
        }
        Ok(plan.allocations)
    }

    /// Release every hold in a breakdown.
    pub(crate) fn release_allocations(
        state: &mut StockState,
        allocations: &[LotReservation],
        now: DateTime<Utc>,
    ) -> StockResult<()> {
        for allocation in allocations {
            release(state, allocation.lot_id, allocation.quantity, now)?;
        }
        Ok(())
    }

    /// Consume every hold in a breakdown.
    pub(crate) fn consume_allocations(
        state: &mut StockState,
        allocations: &[LotReservation],
        now: DateTime<Utc>,
    ) -> StockResult<()> {
        for allocation in allocations {
            consume_reserved(state, allocation.lot_id, allocation.quantity, now)?;
        }
        Ok(())
    }

    /// Receive `quantity` units at a key, merging into an existing lot with
    /// the same number or opening a new one. Returns the lot and its number.
    pub(crate) fn receive(
        state: &mut StockState,
        key: StockKey,
        lot_number: Option<String>,
        quantity: u32,
        spec: LotSpec,
        now: DateTime<Utc>,
    ) -> StockResult<(LotId, String)> {
        let number = match lot_number {
            Some(n) => n,
            None => state.generate_lot_number(key, now),
        };
        let existing = state
            .find_lot_by_number(key, &number)
            .map(|l| (*Entity::id(l), l.expiry_date()));
        let lot_id = match existing {
            Some((id, expiry)) => {
                if expiry != spec.expiry_date {
                    return Err(StockError::validation(format!(
                        "lot {number} already exists with a different expiry date"
                    )));
                }
                state.lot_mut(id)?.merge_receipt(quantity, now)?;
                id
            }
            None => state.insert_lot(key, number.clone(), quantity, spec, now)?,
        };
        state.balance_mut(key, now).add_quantity(quantity, now)?;
        Ok((lot_id, number))
    }

    /// Write `delta` units off in FEFO order. Unlike planning, expired lots
    /// are eligible here (and drain first): a write-down usually removes
    /// exactly the stock that went bad.
    fn write_down_fefo(
        state: &mut StockState,
        key: StockKey,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> StockResult<()> {
        let mut candidates: Vec<StockLot> = state
            .lots_for_key(key)
            .into_iter()
            .filter(|l| {
                matches!(l.status(), LotStatus::Active | LotStatus::Expired)
                    && l.available_quantity() > 0
            })
            .cloned()
            .collect();
        candidates.sort_by(fefo_order);

        let available: u32 = candidates.iter().map(|l| l.available_quantity()).sum();
        if available < quantity {
            return Err(StockError::insufficient_stock(quantity, available));
        }

        let mut remaining = quantity;
        for lot in candidates {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(lot.available_quantity());
            state.lot_mut(*Entity::id(&lot))?.consume(take, now)?;
            remaining -= take;
        }
        state.balance_mut(key, now).remove_quantity(quantity, now)?;
        Ok(())
    }

    /// Force the book quantity at a key to `target`, keeping the lots in
    /// step. Returns the signed delta applied; a zero delta is a no-op.
    pub(crate) fn apply_adjustment(
        state: &mut StockState,
        key: StockKey,
        target: u32,
        now: DateTime<Utc>,
    ) -> StockResult<i64> {
        let current = state.balance(key).map(|b| b.quantity()).unwrap_or(0);
        let delta = i64::from(target) - i64::from(current);
        if target > current {
            let quantity = target - current;
            let number = state.generate_lot_number(key, now);
            state.insert_lot(key, number, quantity, LotSpec::default(), now)?;
            state.balance_mut(key, now).add_quantity(quantity, now)?;
        } else if target < current {
            write_down_fefo(state, key, current - target, now)?;
        }
        Ok(delta)
    }

    /// Apply a signed correction relative to the current book quantity.
    pub(crate) fn apply_difference(
        state: &mut StockState,
        key: StockKey,
        delta: i64,
        now: DateTime<Utc>,
    ) -> StockResult<()> {
        if delta == 0 {
            return Ok(());
        }
        let current = state.balance(key).map(|b| b.quantity()).unwrap_or(0);
        let target = i64::from(current) + delta;
        let target = u32::try_from(target).map_err(|_| {
            StockError::validation(format!("correction would take {key} below zero"))
        })?;
        apply_adjustment(state, key, target, now)?;
        Ok(())
    }
}

/// Public reservation surface: one store transaction per call.
#[derive(Debug, Clone)]
pub struct ReservationManager {
    store: Arc<StockStore>,
}

impl ReservationManager {
    pub fn new(store: Arc<StockStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<StockStore> {
        &self.store
    }

    /// Hold `quantity` units on a specific lot.
    pub fn reserve(&self, lot_id: LotId, quantity: u32) -> StockResult<()> {
        let now = Utc::now();
        self.store.transact(|s| ops::reserve(s, lot_id, quantity, now))?;
        info!(%lot_id, quantity, "stock reserved");
        Ok(())
    }

    /// Return `quantity` reserved units on a lot to available.
    pub fn release(&self, lot_id: LotId, quantity: u32) -> StockResult<()> {
        let now = Utc::now();
        self.store.transact(|s| ops::release(s, lot_id, quantity, now))?;
        info!(%lot_id, quantity, "reservation released");
        Ok(())
    }

    /// Issue `quantity` unreserved units from a lot.
    pub fn consume(&self, lot_id: LotId, quantity: u32) -> StockResult<()> {
        let now = Utc::now();
        self.store.transact(|s| ops::consume(s, lot_id, quantity, now))?;
        info!(%lot_id, quantity, "stock consumed");
        Ok(())
    }

    /// Issue `quantity` reserved units from a lot, clearing the hold.
    pub fn consume_reserved(&self, lot_id: LotId, quantity: u32) -> StockResult<()> {
        let now = Utc::now();
        self.store
            .transact(|s| ops::consume_reserved(s, lot_id, quantity, now))?;
        info!(%lot_id, quantity, "reserved stock consumed");
        Ok(())
    }

    /// Reserve `quantity` units at a key in FEFO order. All-or-nothing: on
    /// shortfall nothing is held.
    pub fn reserve_fefo(
        &self,
        key: StockKey,
        quantity: u32,
        today: NaiveDate,
    ) -> StockResult<Vec<LotReservation>> {
        let now = Utc::now();
        let allocations = self
            .store
            .transact(|s| ops::reserve_fefo(s, key, quantity, today, now))?;
        info!(%key, quantity, lots = allocations.len(), "stock reserved (FEFO)");
        Ok(allocations)
    }

    /// Release every hold in a breakdown.
    pub fn release_allocations(&self, allocations: &[LotReservation]) -> StockResult<()> {
        let now = Utc::now();
        self.store
            .transact(|s| ops::release_allocations(s, allocations, now))?;
        info!(lots = allocations.len(), "allocations released");
        Ok(())
    }

    /// How much of `quantity` could be allocated at `key` right now.
    pub fn check_availability(
        &self,
        key: StockKey,
        quantity: u32,
        today: NaiveDate,
    ) -> StockResult<AvailabilityReport> {
        let lots = self.store.lots_for_key(key)?;
        Ok(AllocationEngine::check_availability(&lots, quantity, today))
    }
}
