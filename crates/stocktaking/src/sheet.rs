use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lotwise_core::{
    Entity, LocationId, ProductUnitId, StockError, StockResult, StocktakingId, WarehouseId,
};

/// Lifecycle state of a stocktaking sheet.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StocktakingStatus {
    /// Created, counting not started.
    Pending,
    /// At least one count recorded.
    InProgress,
    /// Differences applied to stock. Irreversible.
    Confirmed,
    /// Administratively closed after confirmation.
    Completed,
    Cancelled,
}

impl StocktakingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StocktakingStatus::Completed | StocktakingStatus::Cancelled
        )
    }
}

impl core::fmt::Display for StocktakingStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            StocktakingStatus::Pending => "PENDING",
            StocktakingStatus::InProgress => "IN_PROGRESS",
            StocktakingStatus::Confirmed => "CONFIRMED",
            StocktakingStatus::Completed => "COMPLETED",
            StocktakingStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// One counted product on a sheet.
///
/// `system_quantity` is snapshotted when the detail is first recorded, so a
/// later count compares against the book value at counting time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StocktakingDetail {
    product_unit_id: ProductUnitId,
    system_quantity: u32,
    actual_quantity: Option<u32>,
    note: Option<String>,
    counted_at: Option<DateTime<Utc>>,
}

impl StocktakingDetail {
    fn snapshot(product_unit_id: ProductUnitId, system_quantity: u32) -> Self {
        Self {
            product_unit_id,
            system_quantity,
            actual_quantity: None,
            note: None,
            counted_at: None,
        }
    }

    pub fn product_unit_id(&self) -> ProductUnitId {
        self.product_unit_id
    }

    pub fn system_quantity(&self) -> u32 {
        self.system_quantity
    }

    pub fn actual_quantity(&self) -> Option<u32> {
        self.actual_quantity
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn counted_at(&self) -> Option<DateTime<Utc>> {
        self.counted_at
    }

    pub fn is_counted(&self) -> bool {
        self.actual_quantity.is_some()
    }

    /// Signed difference `actual - system`, if counted.
    pub fn difference_quantity(&self) -> Option<i64> {
        self.actual_quantity
            .map(|actual| i64::from(actual) - i64::from(self.system_quantity))
    }
}

/// A physical count of one location's stock, reconciled against book values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stocktaking {
    id: StocktakingId,
    stocktaking_number: String,
    warehouse_id: WarehouseId,
    /// Absent for warehouse-wide sheets; workflows that reconcile against
    /// balances require a concrete location.
    location_id: Option<LocationId>,
    status: StocktakingStatus,
    details: Vec<StocktakingDetail>,
    note: Option<String>,
    cancel_reason: Option<String>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl Stocktaking {
    pub fn create(
        id: StocktakingId,
        stocktaking_number: impl Into<String>,
        warehouse_id: WarehouseId,
        location_id: Option<LocationId>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> StockResult<Self> {
        let stocktaking_number = stocktaking_number.into();
        if stocktaking_number.trim().is_empty() {
            return Err(StockError::validation(
                "stocktaking number cannot be empty",
            ));
        }
        Ok(Self {
            id,
            stocktaking_number,
            warehouse_id,
            location_id,
            status: StocktakingStatus::Pending,
            details: Vec::new(),
            note,
            cancel_reason: None,
            version: 1,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
            completed_at: None,
        })
    }

    pub fn stocktaking_number(&self) -> &str {
        &self.stocktaking_number
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn location_id(&self) -> Option<LocationId> {
        self.location_id
    }

    pub fn status(&self) -> StocktakingStatus {
        self.status
    }

    pub fn details(&self) -> &[StocktakingDetail] {
        &self.details
    }

    pub fn detail(&self, product_unit_id: ProductUnitId) -> Option<&StocktakingDetail> {
        self.details
            .iter()
            .find(|d| d.product_unit_id == product_unit_id)
    }

    /// Details with a recorded count.
    pub fn counted_details(&self) -> impl Iterator<Item = &StocktakingDetail> {
        self.details.iter().filter(|d| d.is_counted())
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }

    fn ensure_counting_open(&self, action: &'static str) -> StockResult<()> {
        match self.status {
            StocktakingStatus::Pending | StocktakingStatus::InProgress => Ok(()),
            _ => Err(StockError::invalid_transition(
                "stocktaking",
                self.status,
                action,
            )),
        }
    }

    /// Pre-populate a detail with the current book quantity, without a count.
    pub fn add_snapshot(
        &mut self,
        product_unit_id: ProductUnitId,
        system_quantity: u32,
        now: DateTime<Utc>,
    ) -> StockResult<()> {
        self.ensure_counting_open("add snapshot")?;
        if self.detail(product_unit_id).is_some() {
            return Err(StockError::validation(
                "product already present on this sheet",
            ));
        }
        self.details
            .push(StocktakingDetail::snapshot(product_unit_id, system_quantity));
        self.touch(now);
        Ok(())
    }

    /// Record a count for a product. Creates the detail (snapshotting
    /// `system_quantity`) when missing; an existing detail keeps its original
    /// snapshot and only the count is updated. First count moves the sheet
    /// from `Pending` to `InProgress`.
    pub fn upsert_detail(
        &mut self,
        product_unit_id: ProductUnitId,
        system_quantity: u32,
        actual_quantity: u32,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> StockResult<()> {
        self.ensure_counting_open("record count")?;
        match self
            .details
            .iter_mut()
            .find(|d| d.product_unit_id == product_unit_id)
        {
            Some(detail) => {
                detail.actual_quantity = Some(actual_quantity);
                detail.note = note;
                detail.counted_at = Some(now);
            }
            None => {
                let mut detail = StocktakingDetail::snapshot(product_unit_id, system_quantity);
                detail.actual_quantity = Some(actual_quantity);
                detail.note = note;
                detail.counted_at = Some(now);
                self.details.push(detail);
            }
        }
        if self.status == StocktakingStatus::Pending {
            self.status = StocktakingStatus::InProgress;
        }
        self.touch(now);
        Ok(())
    }

    /// Move to `Confirmed`. Requires at least one counted detail. The caller
    /// applies the differences to stock in the same transaction.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> StockResult<()> {
        self.ensure_counting_open("confirm")?;
        if self.counted_details().next().is_none() {
            return Err(StockError::validation(
                "cannot confirm a stocktaking with no counted details",
            ));
        }
        self.status = StocktakingStatus::Confirmed;
        self.confirmed_at = Some(now);
        self.touch(now);
        Ok(())
    }

    /// Close out a confirmed sheet.
    pub fn complete(&mut self, now: DateTime<Utc>) -> StockResult<()> {
        if self.status != StocktakingStatus::Confirmed {
            return Err(StockError::invalid_transition(
                "stocktaking",
                self.status,
                "complete",
            ));
        }
        self.status = StocktakingStatus::Completed;
        self.completed_at = Some(now);
        self.touch(now);
        Ok(())
    }

    /// Abandon the sheet. Allowed from any non-terminal state; cancelling a
    /// confirmed sheet does not reverse corrections already applied.
    pub fn cancel(&mut self, reason: Option<String>, now: DateTime<Utc>) -> StockResult<()> {
        if self.status.is_terminal() {
            return Err(StockError::invalid_transition(
                "stocktaking",
                self.status,
                "cancel",
            ));
        }
        self.status = StocktakingStatus::Cancelled;
        self.cancel_reason = reason;
        self.touch(now);
        Ok(())
    }
}

impl Entity for Stocktaking {
    type Id = StocktakingId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
