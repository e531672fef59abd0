//! Stock document workflow: drafting, reservation bookkeeping, approval.
//!
//! Approval is all-or-nothing per document: every line's stock effect runs
//! inside one store transaction, the ledger rows are appended as one batch,
//! and the document flips to its new status only after both succeed.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::info;

use lotwise_core::{
    DocumentId, Entity, ExpectedVersion, LocationId, StockError, StockKey, StockResult,
    WarehouseId,
};
use lotwise_documents::{DocumentStatus, DocumentType, LineInput, LineNo, StockDocument};
use lotwise_ledger::{InventoryTransaction, TransactionType};
use lotwise_stock::LotSpec;

use crate::catalog::{ProductCatalog, ProductUnitInfo};
use crate::config::{EngineConfig, ReservationPolicy};
use crate::ledger::InventoryLedger;
use crate::reservation::ops;
use crate::store::{StockState, StockStore};

/// Result of approving a document: the new document state plus the ledger
/// rows the approval produced.
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub document: StockDocument,
    pub transactions: Vec<InventoryTransaction>,
}

/// A document line joined with catalog display data.
#[derive(Debug, Clone)]
pub struct DocumentLineView {
    pub line: lotwise_documents::StockDocumentLine,
    pub product: Option<ProductUnitInfo>,
}

/// A document joined with catalog display data for its lines.
#[derive(Debug, Clone)]
pub struct DocumentView {
    pub document: StockDocument,
    pub lines: Vec<DocumentLineView>,
}

/// Drives stock documents through their lifecycle.
pub struct StockDocumentWorkflow {
    store: Arc<StockStore>,
    ledger: Arc<InventoryLedger>,
    documents: RwLock<HashMap<DocumentId, StockDocument>>,
    config: EngineConfig,
}

impl StockDocumentWorkflow {
    pub fn new(store: Arc<StockStore>, ledger: Arc<InventoryLedger>, config: EngineConfig) -> Self {
        Self {
            store,
            ledger,
            documents: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn store(&self) -> &Arc<StockStore> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<InventoryLedger> {
        &self.ledger
    }

    fn docs_read(
        &self,
    ) -> StockResult<std::sync::RwLockReadGuard<'_, HashMap<DocumentId, StockDocument>>> {
        self.documents
            .read()
            .map_err(|_| StockError::conflict("document store lock poisoned"))
    }

    fn docs_write(
        &self,
    ) -> StockResult<std::sync::RwLockWriteGuard<'_, HashMap<DocumentId, StockDocument>>> {
        self.documents
            .write()
            .map_err(|_| StockError::conflict("document store lock poisoned"))
    }

    fn generate_document_number(
        docs: &HashMap<DocumentId, StockDocument>,
        document_type: DocumentType,
        now: DateTime<Utc>,
    ) -> String {
        let prefix = match document_type {
            DocumentType::Inbound => "IN",
            DocumentType::Outbound => "OUT",
            DocumentType::Transfer => "TRF",
            DocumentType::Adjustment => "ADJ",
        };
        let base = format!("{prefix}-{}", now.timestamp_millis());
        let taken = |n: &str| docs.values().any(|d| d.document_number() == n);
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

    /// Open a new draft document.
    pub fn create_document(
        &self,
        document_type: DocumentType,
        warehouse_id: WarehouseId,
        location_id: LocationId,
        destination: Option<(WarehouseId, LocationId)>,
        note: Option<String>,
    ) -> StockResult<StockDocument> {
        let now = Utc::now();
        let mut docs = self.docs_write()?;
        let number = Self::generate_document_number(&docs, document_type, now);
        let document = StockDocument::create(
            DocumentId::new(),
            number,
            document_type,
            warehouse_id,
            location_id,
            destination,
            note,
            now,
        )?;
        let id = *Entity::id(&document);
        docs.insert(id, document.clone());
        info!(document_id = %id, %document_type, number = document.document_number(), "document created");
        Ok(document)
    }

    pub fn get_document(&self, id: DocumentId) -> StockResult<StockDocument> {
        self.docs_read()?
            .get(&id)
            .cloned()
            .ok_or_else(|| StockError::not_found("document", id))
    }

    pub fn documents_with_status(&self, status: DocumentStatus) -> StockResult<Vec<StockDocument>> {
        Ok(self
            .docs_read()?
            .values()
            .filter(|d| d.status() == status)
            .cloned()
            .collect())
    }

    fn line_key(document: &StockDocument, input: &LineInput) -> StockKey {
        StockKey::new(
            input.product_unit_id,
            document.warehouse_id(),
            document.location_id(),
        )
    }

    fn reserves_on_add(&self, document: &StockDocument) -> bool {
        document.reserves_stock() && self.config.reservation_policy == ReservationPolicy::OnLineAdd
    }

    /// Add a line to a draft. Under the on-line-add policy, outbound and
    /// transfer lines take their FEFO hold here; the failed hold fails the
    /// whole call and the document is unchanged.
    pub fn add_line(&self, id: DocumentId, input: LineInput) -> StockResult<(LineNo, StockDocument)> {
        let now = Utc::now();
        let mut docs = self.docs_write()?;
        let document = docs
            .get(&id)
            .ok_or_else(|| StockError::not_found("document", id))?;

        let mut draft = document.clone();
        let line_no = draft.add_line(input.clone(), now)?;
        if self.reserves_on_add(&draft) {
            let key = Self::line_key(&draft, &input);
            let allocations = self.store.transact(|s| {
                ops::reserve_fefo(s, key, input.quantity, now.date_naive(), now)
            })?;
            draft.set_line_reservation(line_no, allocations, now)?;
        }
        docs.insert(id, draft.clone());
        info!(document_id = %id, line_no, quantity = input.quantity, "line added");
        Ok((line_no, draft))
    }

    /// Replace a line on a draft, rebooking its reservation in one stock
    /// transaction: the old hold is released and the new one taken together,
    /// so a shortfall on the new quantity leaves the old hold in place.
    pub fn update_line(
        &self,
        id: DocumentId,
        line_no: LineNo,
        input: LineInput,
    ) -> StockResult<StockDocument> {
        let now = Utc::now();
        let mut docs = self.docs_write()?;
        let document = docs
            .get(&id)
            .ok_or_else(|| StockError::not_found("document", id))?;

        let mut draft = document.clone();
        let old = draft.take_line_reservation(line_no, now)?;
        draft.update_line(line_no, input.clone(), now)?;

        let reserve_new = self.reserves_on_add(&draft);
        let key = Self::line_key(&draft, &input);
        let allocations = self.store.transact(|s| {
            if let Some(old) = &old {
                ops::release_allocations(s, old, now)?;
            }
            if reserve_new {
                ops::reserve_fefo(s, key, input.quantity, now.date_naive(), now).map(Some)
            } else {
                Ok(None)
            }
        })?;
        if let Some(allocations) = allocations {
            draft.set_line_reservation(line_no, allocations, now)?;
        }
        docs.insert(id, draft.clone());
        info!(document_id = %id, line_no, "line updated");
        Ok(draft)
    }

    /// Remove a line from a draft, releasing any hold it carried.
    pub fn delete_line(&self, id: DocumentId, line_no: LineNo) -> StockResult<StockDocument> {
        let now = Utc::now();
        let mut docs = self.docs_write()?;
        let document = docs
            .get(&id)
            .ok_or_else(|| StockError::not_found("document", id))?;

        let mut draft = document.clone();
        let old = draft.take_line_reservation(line_no, now)?;
        draft.delete_line(line_no, now)?;
        if let Some(old) = old {
            self.store
                .transact(|s| ops::release_allocations(s, &old, now))?;
        }
        docs.insert(id, draft.clone());
        info!(document_id = %id, line_no, "line deleted");
        Ok(draft)
    }

    /// Approve a draft, applying every line's stock effect atomically.
    pub fn approve(&self, id: DocumentId, expected: ExpectedVersion) -> StockResult<ApprovalOutcome> {
        let now = Utc::now();
        let mut docs = self.docs_write()?;
        let document = docs
            .get(&id)
            .ok_or_else(|| StockError::not_found("document", id))?;
        expected.check(document.version())?;

        let mut draft = document.clone();
        // Reservation breakdowns are pulled off the lines before the status
        // flip so approval consumes exactly what drafting held.
        let mut breakdowns = Vec::with_capacity(draft.lines().len());
        for line_no in draft.lines().iter().map(|l| l.line_no()).collect::<Vec<_>>() {
            breakdowns.push((line_no, draft.take_line_reservation(line_no, now)?));
        }
        draft.approve(now)?;

        // Ledger access is secured before any stock moves: after the stock
        // transaction commits, neither the append nor the status flip can
        // fail.
        let appender = self.ledger.appender()?;
        let transactions = match draft.document_type() {
            DocumentType::Inbound => self.apply_inbound(&draft, now)?,
            DocumentType::Outbound => self.apply_outbound(&draft, &breakdowns, now)?,
            DocumentType::Transfer => self.apply_transfer(&draft, &breakdowns, now)?,
            DocumentType::Adjustment => self.apply_adjustment(&draft, now)?,
        };
        appender.commit(transactions.clone());
        docs.insert(id, draft.clone());
        info!(
            document_id = %id,
            document_type = %draft.document_type(),
            rows = transactions.len(),
            "document approved"
        );
        Ok(ApprovalOutcome {
            document: draft,
            transactions,
        })
    }

    fn apply_inbound(
        &self,
        document: &StockDocument,
        now: DateTime<Utc>,
    ) -> StockResult<Vec<InventoryTransaction>> {
        let id = *Entity::id(document);
        self.store.transact(|state| {
            let mut rows = Vec::new();
            for line in document.lines() {
                let key = Self::line_key(document, line.input());
                let spec = LotSpec {
                    expiry_date: line.expiry_date(),
                    manufacturing_date: line.manufacturing_date(),
                    note: line.note().map(str::to_string),
                    ..LotSpec::default()
                };
                let (lot_id, _) = ops::receive(
                    state,
                    key,
                    line.lot_number().map(str::to_string),
                    line.quantity(),
                    spec,
                    now,
                )?;
                rows.push(InventoryTransaction::new(
                    key,
                    Some(lot_id),
                    TransactionType::Import,
                    i64::from(line.quantity()),
                    Some(id),
                    None,
                    now,
                )?);
            }
            Ok(rows)
        })
    }

    fn apply_outbound(
        &self,
        document: &StockDocument,
        breakdowns: &[(LineNo, Option<Vec<lotwise_core::LotReservation>>)],
        now: DateTime<Utc>,
    ) -> StockResult<Vec<InventoryTransaction>> {
        let id = *Entity::id(document);
        self.store.transact(|state| {
            let mut rows = Vec::new();
            for line in document.lines() {
                let key = Self::line_key(document, line.input());
                let allocations =
                    Self::line_allocations(state, key, line, breakdowns, now)?;
                ops::consume_allocations(state, &allocations, now)?;
                // One row per line; the per-lot breakdown goes in the note.
                rows.push(InventoryTransaction::new(
                    key,
                    None,
                    TransactionType::Export,
                    -i64::from(line.quantity()),
                    Some(id),
                    Self::breakdown_note(&allocations),
                    now,
                )?);
            }
            Ok(rows)
        })
    }

    fn apply_transfer(
        &self,
        document: &StockDocument,
        breakdowns: &[(LineNo, Option<Vec<lotwise_core::LotReservation>>)],
        now: DateTime<Utc>,
    ) -> StockResult<Vec<InventoryTransaction>> {
        let id = *Entity::id(document);
        let (dest_warehouse, dest_location) = document
            .destination()
            .ok_or_else(|| StockError::validation("transfer document has no destination"))?;
        self.store.transact(|state| {
            let mut rows = Vec::new();
            for line in document.lines() {
                let source_key = Self::line_key(document, line.input());
                let dest_key = source_key.relocated(dest_warehouse, dest_location);
                let allocations =
                    Self::line_allocations(state, source_key, line, breakdowns, now)?;
                for allocation in &allocations {
                    // The lot keeps its identity across the move: same
                    // number, same expiry, new location.
                    let spec = state.lot(allocation.lot_id)?.spec().clone();
                    ops::consume_reserved(state, allocation.lot_id, allocation.quantity, now)?;
                    ops::receive(
                        state,
                        dest_key,
                        Some(allocation.lot_number.clone()),
                        allocation.quantity,
                        spec,
                        now,
                    )?;
                }
                // One row per affected key: out at the source, in at the
                // destination.
                let note = Self::breakdown_note(&allocations);
                rows.push(InventoryTransaction::new(
                    source_key,
                    None,
                    TransactionType::Transfer,
                    -i64::from(line.quantity()),
                    Some(id),
                    note.clone(),
                    now,
                )?);
                rows.push(InventoryTransaction::new(
                    dest_key,
                    None,
                    TransactionType::Transfer,
                    i64::from(line.quantity()),
                    Some(id),
                    note,
                    now,
                )?);
            }
            Ok(rows)
        })
    }

    fn apply_adjustment(
        &self,
        document: &StockDocument,
        now: DateTime<Utc>,
    ) -> StockResult<Vec<InventoryTransaction>> {
        let id = *Entity::id(document);
        self.store.transact(|state| {
            let mut rows = Vec::new();
            for line in document.lines() {
                let key = Self::line_key(document, line.input());
                let delta = ops::apply_adjustment(state, key, line.quantity(), now)?;
                // A target equal to the book quantity moves nothing and
                // leaves no ledger row.
                if delta != 0 {
                    rows.push(InventoryTransaction::new(
                        key,
                        None,
                        TransactionType::Adjust,
                        delta,
                        Some(id),
                        None,
                        now,
                    )?);
                }
            }
            Ok(rows)
        })
    }

    /// The lots an approval draws from: the frozen draft hold when one
    /// exists, otherwise a hold taken now (on-approve policy, or a line that
    /// was never reserved).
    fn line_allocations(
        state: &mut StockState,
        key: StockKey,
        line: &lotwise_documents::StockDocumentLine,
        breakdowns: &[(LineNo, Option<Vec<lotwise_core::LotReservation>>)],
        now: DateTime<Utc>,
    ) -> StockResult<Vec<lotwise_core::LotReservation>> {
        let frozen = breakdowns
            .iter()
            .find(|(n, _)| *n == line.line_no())
            .and_then(|(_, b)| b.clone());
        match frozen {
            Some(allocations) => Ok(allocations),
            None => ops::reserve_fefo(state, key, line.quantity(), now.date_naive(), now),
        }
    }

    /// "lot:qty" pairs for a ledger row note, so the per-lot breakdown
    /// survives even though the row is keyed per line.
    fn breakdown_note(allocations: &[lotwise_core::LotReservation]) -> Option<String> {
        if allocations.is_empty() {
            return None;
        }
        let pairs: Vec<String> = allocations
            .iter()
            .map(|a| format!("{}:{}", a.lot_number, a.quantity))
            .collect();
        Some(format!("lots {}", pairs.join(", ")))
    }

    /// Cancel a draft, releasing every hold it carried.
    pub fn cancel(&self, id: DocumentId, expected: ExpectedVersion) -> StockResult<StockDocument> {
        self.cancel_inner(id, expected, None)
    }

    /// Cancel a draft with a recorded reason (review rejection).
    pub fn reject(
        &self,
        id: DocumentId,
        expected: ExpectedVersion,
        reason: impl Into<String>,
    ) -> StockResult<StockDocument> {
        self.cancel_inner(id, expected, Some(reason.into()))
    }

    fn cancel_inner(
        &self,
        id: DocumentId,
        expected: ExpectedVersion,
        reason: Option<String>,
    ) -> StockResult<StockDocument> {
        let now = Utc::now();
        let mut docs = self.docs_write()?;
        let document = docs
            .get(&id)
            .ok_or_else(|| StockError::not_found("document", id))?;
        expected.check(document.version())?;

        let mut draft = document.clone();
        let mut held = Vec::new();
        for line_no in draft.lines().iter().map(|l| l.line_no()).collect::<Vec<_>>() {
            if let Some(allocations) = draft.take_line_reservation(line_no, now)? {
                held.extend(allocations);
            }
        }
        draft.cancel(reason, now)?;
        if !held.is_empty() {
            self.store
                .transact(|s| ops::release_allocations(s, &held, now))?;
        }
        docs.insert(id, draft.clone());
        info!(document_id = %id, released = held.len(), "document cancelled");
        Ok(draft)
    }

    /// The document with catalog display data joined onto its lines.
    pub fn document_view(
        &self,
        id: DocumentId,
        catalog: &dyn ProductCatalog,
    ) -> StockResult<DocumentView> {
        let document = self.get_document(id)?;
        let mut lines = Vec::with_capacity(document.lines().len());
        for line in document.lines() {
            lines.push(DocumentLineView {
                product: catalog.product_unit(line.product_unit_id())?,
                line: line.clone(),
            });
        }
        Ok(DocumentView { document, lines })
    }
}
