use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use lotwise_core::{Entity, LotId, StockError, StockKey, StockResult};

/// Lifecycle status of a stock lot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LotStatus {
    /// Holds stock (or is empty but still open for receipts).
    Active,
    /// Past its expiry date. Not allocatable.
    Expired,
    /// Fully consumed (`current == 0` after an outflow).
    Depleted,
    /// Blocked from allocation pending inspection.
    Quarantine,
    /// Administratively closed.
    Cancelled,
}

impl core::fmt::Display for LotStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            LotStatus::Active => "ACTIVE",
            LotStatus::Expired => "EXPIRED",
            LotStatus::Depleted => "DEPLETED",
            LotStatus::Quarantine => "QUARANTINE",
            LotStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Descriptive attributes of a lot, fixed at receipt.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LotSpec {
    pub expiry_date: Option<NaiveDate>,
    pub manufacturing_date: Option<NaiveDate>,
    pub supplier_name: Option<String>,
    pub supplier_batch_number: Option<String>,
    pub note: Option<String>,
}

/// A batch of stock received together, tracked for expiry-ordered allocation.
///
/// Quantity fields are private; all mutation goes through guard methods so
/// `reserved <= current` holds at every observable point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLot {
    id: LotId,
    lot_number: String,
    key: StockKey,
    spec: LotSpec,
    initial_quantity: u32,
    current_quantity: u32,
    reserved_quantity: u32,
    status: LotStatus,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StockLot {
    /// Open a new lot with an initial receipt quantity.
    pub fn receive(
        id: LotId,
        lot_number: impl Into<String>,
        key: StockKey,
        quantity: u32,
        spec: LotSpec,
        now: DateTime<Utc>,
    ) -> StockResult<Self> {
        let lot_number = lot_number.into();
        if lot_number.trim().is_empty() {
            return Err(StockError::validation("lot number cannot be empty"));
        }
        if quantity == 0 {
            return Err(StockError::validation("receipt quantity must be positive"));
        }
        if let (Some(mfg), Some(exp)) = (spec.manufacturing_date, spec.expiry_date) {
            if exp < mfg {
                return Err(StockError::validation(
                    "expiry date cannot precede manufacturing date",
                ));
            }
        }
        Ok(Self {
            id,
            lot_number,
            key,
            spec,
            initial_quantity: quantity,
            current_quantity: quantity,
            reserved_quantity: 0,
            status: LotStatus::Active,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn lot_number(&self) -> &str {
        &self.lot_number
    }

    pub fn key(&self) -> StockKey {
        self.key
    }

    pub fn spec(&self) -> &LotSpec {
        &self.spec
    }

    pub fn expiry_date(&self) -> Option<NaiveDate> {
        self.spec.expiry_date
    }

    pub fn initial_quantity(&self) -> u32 {
        self.initial_quantity
    }

    pub fn current_quantity(&self) -> u32 {
        self.current_quantity
    }

    pub fn reserved_quantity(&self) -> u32 {
        self.reserved_quantity
    }

    /// Units free to promise: `current - reserved`. Always derived, never stored.
    pub fn available_quantity(&self) -> u32 {
        self.current_quantity - self.reserved_quantity
    }

    pub fn status(&self) -> LotStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Whether the lot may take part in allocation.
    pub fn is_allocatable(&self, today: NaiveDate) -> bool {
        self.status == LotStatus::Active
            && !self.is_expired(today)
            && self.available_quantity() > 0
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        match self.spec.expiry_date {
            Some(exp) => exp < today,
            None => false,
        }
    }

    /// Expires within `days` days of `today` (inclusive). Never-expiring lots
    /// report false.
    pub fn is_near_expiry(&self, today: NaiveDate, days: i64) -> bool {
        match self.spec.expiry_date {
            Some(exp) => exp >= today && (exp - today).num_days() <= days,
            None => false,
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }

    fn refresh_depletion(&mut self) {
        if self.current_quantity == 0 {
            self.status = LotStatus::Depleted;
        } else if self.status == LotStatus::Depleted {
            // A receipt into a depleted lot reopens it.
            self.status = LotStatus::Active;
        }
    }

    fn ensure_open(&self, action: &'static str) -> StockResult<()> {
        match self.status {
            LotStatus::Cancelled | LotStatus::Quarantine => Err(StockError::invalid_transition(
                "lot",
                self.status,
                action,
            )),
            _ => Ok(()),
        }
    }

    /// Hold `quantity` units against this lot.
    pub fn reserve(&mut self, quantity: u32, now: DateTime<Utc>) -> StockResult<()> {
        self.ensure_open("reserve")?;
        if quantity == 0 {
            return Err(StockError::validation("reserve quantity must be positive"));
        }
        if quantity > self.available_quantity() {
            return Err(StockError::OverReservation {
                lot: self.lot_number.clone(),
                requested: quantity,
                available: self.available_quantity(),
            });
        }
        self.reserved_quantity += quantity;
        self.touch(now);
        Ok(())
    }

    /// Return `quantity` previously reserved units to available.
    pub fn release(&mut self, quantity: u32, now: DateTime<Utc>) -> StockResult<()> {
        if quantity == 0 {
            return Err(StockError::validation("release quantity must be positive"));
        }
        if quantity > self.reserved_quantity {
            return Err(StockError::ReleaseExceedsReservation {
                lot: self.lot_number.clone(),
                requested: quantity,
                reserved: self.reserved_quantity,
            });
        }
        self.reserved_quantity -= quantity;
        self.touch(now);
        Ok(())
    }

    /// Remove `quantity` unreserved units from the lot.
    pub fn consume(&mut self, quantity: u32, now: DateTime<Utc>) -> StockResult<()> {
        self.ensure_open("consume")?;
        if quantity == 0 {
            return Err(StockError::validation("consume quantity must be positive"));
        }
        if quantity > self.available_quantity() {
            return Err(StockError::insufficient_stock(
                quantity,
                self.available_quantity(),
            ));
        }
        self.current_quantity -= quantity;
        self.refresh_depletion();
        self.touch(now);
        Ok(())
    }

    /// Remove `quantity` reserved units: the reservation and the stock leave
    /// together.
    pub fn consume_reserved(&mut self, quantity: u32, now: DateTime<Utc>) -> StockResult<()> {
        self.ensure_open("consume")?;
        if quantity == 0 {
            return Err(StockError::validation("consume quantity must be positive"));
        }
        if quantity > self.reserved_quantity {
            return Err(StockError::ReleaseExceedsReservation {
                lot: self.lot_number.clone(),
                requested: quantity,
                reserved: self.reserved_quantity,
            });
        }
        self.reserved_quantity -= quantity;
        self.current_quantity -= quantity;
        self.refresh_depletion();
        self.touch(now);
        Ok(())
    }

    /// Add a follow-up receipt to an existing lot (same lot number re-received).
    pub fn merge_receipt(&mut self, quantity: u32, now: DateTime<Utc>) -> StockResult<()> {
        self.ensure_open("receive")?;
        if self.status == LotStatus::Expired {
            return Err(StockError::invalid_transition("lot", self.status, "receive"));
        }
        if quantity == 0 {
            return Err(StockError::validation("receipt quantity must be positive"));
        }
        let (Some(initial), Some(current)) = (
            self.initial_quantity.checked_add(quantity),
            self.current_quantity.checked_add(quantity),
        ) else {
            return Err(StockError::validation("receipt would overflow the lot"));
        };
        self.initial_quantity = initial;
        self.current_quantity = current;
        self.refresh_depletion();
        self.touch(now);
        Ok(())
    }

    /// Force the current quantity to `target` (stocktaking correction).
    ///
    /// Returns the signed delta applied. Rejects targets below the reserved
    /// quantity, which would strand reservations without stock behind them.
    pub fn set_quantity(&mut self, target: u32, now: DateTime<Utc>) -> StockResult<i64> {
        self.ensure_open("adjust")?;
        if target < self.reserved_quantity {
            return Err(StockError::validation(format!(
                "cannot adjust lot {} below its reserved quantity ({} < {})",
                self.lot_number, target, self.reserved_quantity
            )));
        }
        let delta = i64::from(target) - i64::from(self.current_quantity);
        self.current_quantity = target;
        self.refresh_depletion();
        self.touch(now);
        Ok(delta)
    }

    /// Mark the lot expired (time-based status sweep).
    pub fn mark_expired(&mut self, now: DateTime<Utc>) -> StockResult<()> {
        if self.status != LotStatus::Active {
            return Err(StockError::invalid_transition("lot", self.status, "expire"));
        }
        self.status = LotStatus::Expired;
        self.touch(now);
        Ok(())
    }

    /// Put the lot in quarantine.
    pub fn quarantine(&mut self, now: DateTime<Utc>) -> StockResult<()> {
        if self.status != LotStatus::Active {
            return Err(StockError::invalid_transition(
                "lot",
                self.status,
                "quarantine",
            ));
        }
        if self.reserved_quantity > 0 {
            return Err(StockError::validation(
                "cannot quarantine a lot with open reservations",
            ));
        }
        self.status = LotStatus::Quarantine;
        self.touch(now);
        Ok(())
    }

    /// Release the lot from quarantine back to active.
    pub fn release_quarantine(&mut self, now: DateTime<Utc>) -> StockResult<()> {
        if self.status != LotStatus::Quarantine {
            return Err(StockError::invalid_transition(
                "lot",
                self.status,
                "release quarantine",
            ));
        }
        self.status = LotStatus::Active;
        self.refresh_depletion();
        self.touch(now);
        Ok(())
    }

    /// Administratively close the lot. Only empty, unreserved lots qualify.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> StockResult<()> {
        if self.status == LotStatus::Cancelled {
            return Err(StockError::invalid_transition("lot", self.status, "cancel"));
        }
        if self.reserved_quantity > 0 || self.current_quantity > 0 {
            return Err(StockError::validation(
                "cannot cancel a lot that still holds stock or reservations",
            ));
        }
        self.status = LotStatus::Cancelled;
        self.touch(now);
        Ok(())
    }
}

impl Entity for StockLot {
    type Id = LotId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
