use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lotwise_core::{StockError, StockKey, StockResult};

/// Aggregate on-hand position for one (product unit, warehouse, location) key.
///
/// Mirrors the sum over the key's lots: `quantity == Σ lot.current` and
/// `reserved_quantity == Σ lot.reserved` whenever no write is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBalance {
    key: StockKey,
    quantity: u32,
    reserved_quantity: u32,
    version: u64,
    updated_at: DateTime<Utc>,
}

impl StockBalance {
    /// A zero balance for a key that has never held stock.
    pub fn empty(key: StockKey, now: DateTime<Utc>) -> Self {
        Self {
            key,
            quantity: 0,
            reserved_quantity: 0,
            version: 0,
            updated_at: now,
        }
    }

    pub fn key(&self) -> StockKey {
        self.key
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn reserved_quantity(&self) -> u32 {
        self.reserved_quantity
    }

    /// Free-to-promise units at this key.
    pub fn available_quantity(&self) -> u32 {
        self.quantity - self.reserved_quantity
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }

    /// Inbound receipt.
    pub fn add_quantity(&mut self, quantity: u32, now: DateTime<Utc>) -> StockResult<()> {
        if quantity == 0 {
            return Err(StockError::validation("receipt quantity must be positive"));
        }
        self.quantity = self
            .quantity
            .checked_add(quantity)
            .ok_or_else(|| StockError::validation("receipt would overflow the balance"))?;
        self.touch(now);
        Ok(())
    }

    /// Outbound issue of unreserved stock.
    pub fn remove_quantity(&mut self, quantity: u32, now: DateTime<Utc>) -> StockResult<()> {
        if quantity == 0 {
            return Err(StockError::validation("issue quantity must be positive"));
        }
        if quantity > self.available_quantity() {
            return Err(StockError::insufficient_stock(
                quantity,
                self.available_quantity(),
            ));
        }
        self.quantity -= quantity;
        self.touch(now);
        Ok(())
    }

    pub fn reserve(&mut self, quantity: u32, now: DateTime<Utc>) -> StockResult<()> {
        if quantity == 0 {
            return Err(StockError::validation("reserve quantity must be positive"));
        }
        if quantity > self.available_quantity() {
            return Err(StockError::insufficient_stock(
                quantity,
                self.available_quantity(),
            ));
        }
        self.reserved_quantity += quantity;
        self.touch(now);
        Ok(())
    }

    pub fn release(&mut self, quantity: u32, now: DateTime<Utc>) -> StockResult<()> {
        if quantity == 0 {
            return Err(StockError::validation("release quantity must be positive"));
        }
        if quantity > self.reserved_quantity {
            return Err(StockError::ReleaseExceedsReservation {
                lot: self.key.to_string(),
                requested: quantity,
                reserved: self.reserved_quantity,
            });
        }
        self.reserved_quantity -= quantity;
        self.touch(now);
        Ok(())
    }

    /// Ship reserved stock: the hold and the quantity leave together.
    pub fn consume_reserved(&mut self, quantity: u32, now: DateTime<Utc>) -> StockResult<()> {
        if quantity == 0 {
            return Err(StockError::validation("consume quantity must be positive"));
        }
        if quantity > self.reserved_quantity {
            return Err(StockError::ReleaseExceedsReservation {
                lot: self.key.to_string(),
                requested: quantity,
                reserved: self.reserved_quantity,
            });
        }
        self.reserved_quantity -= quantity;
        self.quantity -= quantity;
        self.touch(now);
        Ok(())
    }

    /// Force the quantity to `target`, returning the signed delta.
    pub fn set_quantity(&mut self, target: u32, now: DateTime<Utc>) -> StockResult<i64> {
        if target < self.reserved_quantity {
            return Err(StockError::validation(format!(
                "cannot adjust balance {} below its reserved quantity ({} < {})",
                self.key, target, self.reserved_quantity
            )));
        }
        let delta = i64::from(target) - i64::from(self.quantity);
        self.quantity = target;
        self.touch(now);
        Ok(delta)
    }

    /// Apply a signed correction (stocktaking difference).
    pub fn apply_delta(&mut self, delta: i64, now: DateTime<Utc>) -> StockResult<()> {
        if delta == 0 {
            return Err(StockError::validation("delta cannot be zero"));
        }
        let target = i64::from(self.quantity) + delta;
        if target < 0 {
            return Err(StockError::validation(format!(
                "balance {} cannot go negative",
                self.key
            )));
        }
        let target = u32::try_from(target)
            .map_err(|_| StockError::validation("quantity out of range"))?;
        self.set_quantity(target, now)?;
        Ok(())
    }
}
