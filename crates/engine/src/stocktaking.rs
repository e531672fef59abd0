//! Stocktaking workflow: counting sheets and their reconciliation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::info;

use lotwise_core::{
    Entity, ExpectedVersion, LocationId, ProductUnitId, StockError, StockKey, StockResult,
    StocktakingId, WarehouseId,
};
use lotwise_ledger::{InventoryTransaction, TransactionType};
use lotwise_stocktaking::{Stocktaking, StocktakingDetail, StocktakingStatus};

use crate::catalog::{ProductCatalog, ProductUnitInfo};
use crate::ledger::InventoryLedger;
use crate::reservation::ops;
use crate::store::StockStore;

/// One recorded count, as supplied by the counting client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountInput {
    pub product_unit_id: ProductUnitId,
    pub actual_quantity: u32,
    pub note: Option<String>,
}

/// Result of confirming a sheet: the sheet plus the correction rows applied.
#[derive(Debug, Clone)]
pub struct ConfirmOutcome {
    pub stocktaking: Stocktaking,
    pub transactions: Vec<InventoryTransaction>,
}

/// A detail joined with catalog display data.
#[derive(Debug, Clone)]
pub struct DetailView {
    pub detail: StocktakingDetail,
    pub product: Option<ProductUnitInfo>,
}

/// Drives stocktaking sheets through their lifecycle.
pub struct StocktakingWorkflow {
    store: Arc<StockStore>,
    ledger: Arc<InventoryLedger>,
    sheets: RwLock<HashMap<StocktakingId, Stocktaking>>,
}

impl StocktakingWorkflow {
    pub fn new(store: Arc<StockStore>, ledger: Arc<InventoryLedger>) -> Self {
        Self {
            store,
            ledger,
            sheets: RwLock::new(HashMap::new()),
        }
    }

    fn sheets_read(
        &self,
    ) -> StockResult<std::sync::RwLockReadGuard<'_, HashMap<StocktakingId, Stocktaking>>> {
        self.sheets
            .read()
            .map_err(|_| StockError::conflict("stocktaking store lock poisoned"))
    }

    fn sheets_write(
        &self,
    ) -> StockResult<std::sync::RwLockWriteGuard<'_, HashMap<StocktakingId, Stocktaking>>> {
        self.sheets
            .write()
            .map_err(|_| StockError::conflict("stocktaking store lock poisoned"))
    }

    fn generate_number(sheets: &HashMap<StocktakingId, Stocktaking>, now: DateTime<Utc>) -> String {
        let base = format!("ST-{}", now.timestamp_millis());
        let taken = |n: &str| sheets.values().any(|s| s.stocktaking_number() == n);
        if !taken(&base) {
            return base;
        }
        let mut n = 1u32;
        loop {
            let candidate = format!("{base}-{n}");
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Open a new counting sheet for one location.
    pub fn create(
        &self,
        warehouse_id: WarehouseId,
        location_id: LocationId,
        note: Option<String>,
    ) -> StockResult<Stocktaking> {
        let now = Utc::now();
        let mut sheets = self.sheets_write()?;
        let number = Self::generate_number(&sheets, now);
        let sheet = Stocktaking::create(
            StocktakingId::new(),
            number,
            warehouse_id,
            Some(location_id),
            note,
            now,
        )?;
        let id = *Entity::id(&sheet);
        sheets.insert(id, sheet.clone());
        info!(stocktaking_id = %id, number = sheet.stocktaking_number(), "stocktaking created");
        Ok(sheet)
    }

    pub fn get(&self, id: StocktakingId) -> StockResult<Stocktaking> {
        self.sheets_read()?
            .get(&id)
            .cloned()
            .ok_or_else(|| StockError::not_found("stocktaking", id))
    }

    fn sheet_key(sheet: &Stocktaking, product_unit_id: ProductUnitId) -> StockResult<StockKey> {
        let location_id = sheet.location_id().ok_or_else(|| {
            StockError::validation("stocktaking sheet has no location to reconcile against")
        })?;
        Ok(StockKey::new(
            product_unit_id,
            sheet.warehouse_id(),
            location_id,
        ))
    }

    /// Pre-populate the sheet with book quantities for `products`, without
    /// counting them.
    pub fn snapshot_products(
        &self,
        id: StocktakingId,
        products: &[ProductUnitId],
    ) -> StockResult<Stocktaking> {
        let now = Utc::now();
        let mut sheets = self.sheets_write()?;
        let sheet = sheets
            .get(&id)
            .ok_or_else(|| StockError::not_found("stocktaking", id))?;
        let mut draft = sheet.clone();
        for product in products {
            let key = Self::sheet_key(&draft, *product)?;
            let system = self
                .store
                .get_balance(key)?
                .map(|b| b.quantity())
                .unwrap_or(0);
            draft.add_snapshot(*product, system, now)?;
        }
        sheets.insert(id, draft.clone());
        Ok(draft)
    }

    /// Record a count. The book quantity is snapshotted from the live balance
    /// the first time a product appears on the sheet.
    pub fn record_count(&self, id: StocktakingId, count: CountInput) -> StockResult<Stocktaking> {
        let now = Utc::now();
        let mut sheets = self.sheets_write()?;
        let sheet = sheets
            .get(&id)
            .ok_or_else(|| StockError::not_found("stocktaking", id))?;
        let mut draft = sheet.clone();
        let key = Self::sheet_key(&draft, count.product_unit_id)?;
        let system = self
            .store
            .get_balance(key)?
            .map(|b| b.quantity())
            .unwrap_or(0);
        draft.upsert_detail(
            count.product_unit_id,
            system,
            count.actual_quantity,
            count.note,
            now,
        )?;
        sheets.insert(id, draft.clone());
        info!(
            stocktaking_id = %id,
            product_unit_id = %count.product_unit_id,
            actual = count.actual_quantity,
            "count recorded"
        );
        Ok(draft)
    }

    /// Confirm the sheet and apply every counted difference to stock as one
    /// atomic batch. Uncounted details and zero differences move nothing.
    pub fn confirm(&self, id: StocktakingId, expected: ExpectedVersion) -> StockResult<ConfirmOutcome> {
        let now = Utc::now();
        let mut sheets = self.sheets_write()?;
        let sheet = sheets
            .get(&id)
            .ok_or_else(|| StockError::not_found("stocktaking", id))?;
        expected.check(sheet.version())?;

        let mut draft = sheet.clone();
        draft.confirm(now)?;

        let mut corrections: Vec<(StockKey, i64, Option<String>)> = Vec::new();
        for detail in draft.counted_details() {
            let Some(diff) = detail.difference_quantity() else {
                continue;
            };
            if diff == 0 {
                continue;
            }
            corrections.push((
                Self::sheet_key(&draft, detail.product_unit_id())?,
                diff,
                detail.note().map(str::to_string),
            ));
        }

        let sheet_id = *Entity::id(&draft);
        // Ledger access is secured before any stock moves, so the batch
        // cannot fail to land after the corrections commit.
        let appender = self.ledger.appender()?;
        let transactions = self.store.transact(|state| {
            let mut rows = Vec::with_capacity(corrections.len());
            for (key, diff, note) in &corrections {
                ops::apply_difference(state, *key, *diff, now)?;
                rows.push(InventoryTransaction::new(
                    *key,
                    None,
                    TransactionType::Adjust,
                    *diff,
                    None,
                    note.clone().or_else(|| {
                        Some(format!("stocktaking {}", draft.stocktaking_number()))
                    }),
                    now,
                )?);
            }
            Ok(rows)
        })?;
        appender.commit(transactions.clone());
        sheets.insert(id, draft.clone());
        info!(
            stocktaking_id = %sheet_id,
            corrections = transactions.len(),
            "stocktaking confirmed"
        );
        Ok(ConfirmOutcome {
            stocktaking: draft,
            transactions,
        })
    }

    /// Record a batch of counts and confirm in one call. Equivalent to
    /// `record_count` per entry followed by `confirm`; the version check runs
    /// against the sheet as handed in, before the counts bump it.
    pub fn confirm_with_counts(
        &self,
        id: StocktakingId,
        counts: Vec<CountInput>,
        expected: ExpectedVersion,
    ) -> StockResult<ConfirmOutcome> {
        expected.check(self.get(id)?.version())?;
        for count in counts {
            self.record_count(id, count)?;
        }
        self.confirm(id, ExpectedVersion::Any)
    }

    /// Close out a confirmed sheet.
    pub fn complete(&self, id: StocktakingId) -> StockResult<Stocktaking> {
        let now = Utc::now();
        let mut sheets = self.sheets_write()?;
        let sheet = sheets
            .get(&id)
            .ok_or_else(|| StockError::not_found("stocktaking", id))?;
        let mut draft = sheet.clone();
        draft.complete(now)?;
        sheets.insert(id, draft.clone());
        info!(stocktaking_id = %id, "stocktaking completed");
        Ok(draft)
    }

    /// Abandon the sheet. Corrections already applied by a confirmation are
    /// not reversed.
    pub fn cancel(&self, id: StocktakingId, reason: Option<String>) -> StockResult<Stocktaking> {
        let now = Utc::now();
        let mut sheets = self.sheets_write()?;
        let sheet = sheets
            .get(&id)
            .ok_or_else(|| StockError::not_found("stocktaking", id))?;
        let mut draft = sheet.clone();
        draft.cancel(reason, now)?;
        sheets.insert(id, draft.clone());
        info!(stocktaking_id = %id, "stocktaking cancelled");
        Ok(draft)
    }

    pub fn sheets_with_status(&self, status: StocktakingStatus) -> StockResult<Vec<Stocktaking>> {
        Ok(self
            .sheets_read()?
            .values()
            .filter(|s| s.status() == status)
            .cloned()
            .collect())
    }

    /// The sheet's details joined with catalog display data.
    pub fn detail_views(
        &self,
        id: StocktakingId,
        catalog: &dyn ProductCatalog,
    ) -> StockResult<Vec<DetailView>> {
        let sheet = self.get(id)?;
        let mut views = Vec::with_capacity(sheet.details().len());
        for detail in sheet.details() {
            views.push(DetailView {
                product: catalog.product_unit(detail.product_unit_id())?,
                detail: detail.clone(),
            });
        }
        Ok(views)
    }
}
