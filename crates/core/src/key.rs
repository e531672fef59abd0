//! Composite keys and small shared value objects.

use serde::{Deserialize, Serialize};

use crate::id::{LocationId, LotId, ProductUnitId, WarehouseId};
use crate::value_object::ValueObject;

/// The (product unit, warehouse, location) triple a balance row is keyed by.
///
/// Lot-level records carry the same triple so that balance quantities can be
/// cross-checked against the sum of lot quantities for the key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub product_unit_id: ProductUnitId,
    pub warehouse_id: WarehouseId,
    pub location_id: LocationId,
}

impl StockKey {
    pub fn new(
        product_unit_id: ProductUnitId,
        warehouse_id: WarehouseId,
        location_id: LocationId,
    ) -> Self {
        Self {
            product_unit_id,
            warehouse_id,
            location_id,
        }
    }

    /// Same product unit at a different warehouse/location.
    pub fn relocated(self, warehouse_id: WarehouseId, location_id: LocationId) -> Self {
        Self {
            warehouse_id,
            location_id,
            ..self
        }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}@{}/{}",
            self.product_unit_id, self.warehouse_id, self.location_id
        )
    }
}

impl ValueObject for StockKey {}

/// A per-lot slice of a reservation: which lot, and how many units.
///
/// Produced by the allocation planner and frozen onto outbound document lines
/// so approval consumes exactly the lots that were reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotReservation {
    pub lot_id: LotId,
    pub lot_number: String,
    pub quantity: u32,
}

impl LotReservation {
    pub fn new(lot_id: LotId, lot_number: impl Into<String>, quantity: u32) -> Self {
        Self {
            lot_id,
            lot_number: lot_number.into(),
            quantity,
        }
    }
}

impl ValueObject for LotReservation {}
