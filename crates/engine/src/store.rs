//! Transactional in-memory stock state.
//!
//! All lots and balances live behind one lock so that multi-record operations
//! (reserve across lots, transfer two keys, apply a stocktaking batch) are
//! atomic: writers run against a copy of the state and the copy replaces the
//! original only when the whole operation succeeds.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, NaiveDate, Utc};

use lotwise_core::{Entity, LotId, StockError, StockKey, StockResult};
use lotwise_stock::{LotSpec, LotStatus, StockBalance, StockLot};

/// The mutable stock universe: every lot, every balance, plus the lot-number
/// index used for receipt merging.
#[derive(Debug, Clone, Default)]
pub struct StockState {
    lots: BTreeMap<LotId, StockLot>,
    balances: HashMap<StockKey, StockBalance>,
    lot_numbers: HashMap<(StockKey, String), LotId>,
}

impl StockState {
    pub fn lot(&self, id: LotId) -> StockResult<&StockLot> {
        self.lots
            .get(&id)
            .ok_or_else(|| StockError::not_found("lot", id))
    }

    pub fn lot_mut(&mut self, id: LotId) -> StockResult<&mut StockLot> {
        self.lots
            .get_mut(&id)
            .ok_or_else(|| StockError::not_found("lot", id))
    }

    pub fn find_lot_by_number(&self, key: StockKey, lot_number: &str) -> Option<&StockLot> {
        let id = self.lot_numbers.get(&(key, lot_number.to_string()))?;
        self.lots.get(id)
    }

    pub fn balance(&self, key: StockKey) -> Option<&StockBalance> {
        self.balances.get(&key)
    }

    /// Balance for a key, created as zero if the key has never held stock.
    pub fn balance_mut(&mut self, key: StockKey, now: DateTime<Utc>) -> &mut StockBalance {
        self.balances
            .entry(key)
            .or_insert_with(|| StockBalance::empty(key, now))
    }

    /// All lots at a key, in id (receipt) order.
    pub fn lots_for_key(&self, key: StockKey) -> Vec<&StockLot> {
        self.lots.values().filter(|l| l.key() == key).collect()
    }

    /// Lots a planner may draw from: active, unexpired, with availability.
    pub fn allocatable_lots(&self, key: StockKey, today: NaiveDate) -> Vec<&StockLot> {
        self.lots
            .values()
            .filter(|l| l.key() == key && l.is_allocatable(today))
            .collect()
    }

    /// Open a new lot at `key`, enforcing lot-number uniqueness per key.
    pub fn insert_lot(
        &mut self,
        key: StockKey,
        lot_number: String,
        quantity: u32,
        spec: LotSpec,
        now: DateTime<Utc>,
    ) -> StockResult<LotId> {
        let index_key = (key, lot_number.clone());
        if self.lot_numbers.contains_key(&index_key) {
            return Err(StockError::conflict(format!(
                "lot number {lot_number} already exists at {key}"
            )));
        }
        let id = LotId::new();
        let lot = StockLot::receive(id, lot_number, key, quantity, spec, now)?;
        self.lots.insert(id, lot);
        self.lot_numbers.insert(index_key, id);
        Ok(id)
    }

    /// Generate an unused lot number for `key`.
    pub fn generate_lot_number(&self, key: StockKey, now: DateTime<Utc>) -> String {
        let base = format!("LOT-{}", now.timestamp_millis());
        if !self.lot_numbers.contains_key(&(key, base.clone())) {
            return base;
        }
        let mut n = 1u32;
        loop {
            let candidate = format!("{base}-{n}");
            if !self.lot_numbers.contains_key(&(key, candidate.clone())) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Shared handle to the stock state.
///
/// Writers are serialized through [`StockStore::transact`]; readers take the
/// shared lock and copy out what they need.
#[derive(Debug, Default)]
pub struct StockStore {
    state: RwLock<StockState>,
}

impl StockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against a working copy of the state. The copy replaces the
    /// live state only if `f` returns `Ok`, so a failure anywhere in a
    /// multi-step operation leaves no trace.
    pub fn transact<T>(&self, f: impl FnOnce(&mut StockState) -> StockResult<T>) -> StockResult<T> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| StockError::conflict("stock state lock poisoned"))?;
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        *guard = draft;
        Ok(out)
    }

    /// Read-only access to the state.
    pub fn read<T>(&self, f: impl FnOnce(&StockState) -> T) -> StockResult<T> {
        let guard = self
            .state
            .read()
            .map_err(|_| StockError::conflict("stock state lock poisoned"))?;
        Ok(f(&guard))
    }

    pub fn get_lot(&self, id: LotId) -> StockResult<StockLot> {
        self.read(|s| s.lot(id).cloned())?
    }

    pub fn get_balance(&self, key: StockKey) -> StockResult<Option<StockBalance>> {
        self.read(|s| s.balance(key).cloned())
    }

    pub fn find_lot_by_number(
        &self,
        key: StockKey,
        lot_number: &str,
    ) -> StockResult<Option<StockLot>> {
        self.read(|s| s.find_lot_by_number(key, lot_number).cloned())
    }

    pub fn lots_for_key(&self, key: StockKey) -> StockResult<Vec<StockLot>> {
        self.read(|s| s.lots_for_key(key).into_iter().cloned().collect())
    }

    /// Active lots expiring within `days` days of `today`.
    pub fn lots_near_expiry(&self, today: NaiveDate, days: i64) -> StockResult<Vec<StockLot>> {
        self.read(|s| {
            s.lots
                .values()
                .filter(|l| l.status() == LotStatus::Active && l.is_near_expiry(today, days))
                .cloned()
                .collect()
        })
    }

    /// Lots past their expiry date but not yet swept to `Expired`.
    pub fn expired_lots(&self, today: NaiveDate) -> StockResult<Vec<StockLot>> {
        self.read(|s| {
            s.lots
                .values()
                .filter(|l| l.status() == LotStatus::Active && l.is_expired(today))
                .cloned()
                .collect()
        })
    }

    /// Sweep expired active lots to `Expired` status. Returns the swept ids.
    pub fn mark_expired_lots(&self, today: NaiveDate, now: DateTime<Utc>) -> StockResult<Vec<LotId>> {
        self.transact(|state| {
            let due: Vec<LotId> = state
                .lots
                .values()
                .filter(|l| l.status() == LotStatus::Active && l.is_expired(today))
                .map(|l| *Entity::id(l))
                .collect();
            for id in &due {
                state.lot_mut(*id)?.mark_expired(now)?;
            }
            Ok(due)
        })
    }
}
