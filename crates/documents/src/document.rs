use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use lotwise_core::{
    DocumentId, Entity, LocationId, LotReservation, ProductUnitId, StockError, StockResult,
    WarehouseId,
};

/// Sequential line number within a document, starting at 1.
pub type LineNo = u32;

/// Business intent of a stock document.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    /// Goods receipt: approval creates lots and increases balances.
    Inbound,
    /// Goods issue: approval consumes reserved stock.
    Outbound,
    /// Move between locations: consume at source, receive at destination.
    Transfer,
    /// Set quantities to stated targets.
    Adjustment,
}

impl core::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            DocumentType::Inbound => "INBOUND",
            DocumentType::Outbound => "OUTBOUND",
            DocumentType::Transfer => "TRANSFER",
            DocumentType::Adjustment => "ADJUSTMENT",
        };
        f.write_str(s)
    }
}

/// Lifecycle state of a document.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Draft,
    Approved,
    Cancelled,
}

impl DocumentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Approved | DocumentStatus::Cancelled)
    }
}

impl core::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            DocumentStatus::Draft => "DRAFT",
            DocumentStatus::Approved => "APPROVED",
            DocumentStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Caller-supplied line data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    pub product_unit_id: ProductUnitId,
    pub quantity: u32,
    /// Explicit lot for inbound lines. Auto-generated when absent.
    pub lot_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub manufacturing_date: Option<NaiveDate>,
    pub note: Option<String>,
}

impl LineInput {
    pub fn new(product_unit_id: ProductUnitId, quantity: u32) -> Self {
        Self {
            product_unit_id,
            quantity,
            lot_number: None,
            expiry_date: None,
            manufacturing_date: None,
            note: None,
        }
    }

    pub fn with_lot(mut self, lot_number: impl Into<String>) -> Self {
        self.lot_number = Some(lot_number.into());
        self
    }

    pub fn with_expiry(mut self, expiry_date: NaiveDate) -> Self {
        self.expiry_date = Some(expiry_date);
        self
    }

    fn validate(&self, document_type: DocumentType) -> StockResult<()> {
        // Adjustment lines carry a target quantity, where zero (write-off)
        // is legitimate. Movement lines need a positive quantity.
        if self.quantity == 0 && document_type != DocumentType::Adjustment {
            return Err(StockError::validation("line quantity must be positive"));
        }
        if let Some(lot) = &self.lot_number {
            if lot.trim().is_empty() {
                return Err(StockError::validation("lot number cannot be empty"));
            }
        }
        if let (Some(mfg), Some(exp)) = (self.manufacturing_date, self.expiry_date) {
            if exp < mfg {
                return Err(StockError::validation(
                    "expiry date cannot precede manufacturing date",
                ));
            }
        }
        Ok(())
    }
}

/// One line of a stock document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDocumentLine {
    line_no: LineNo,
    input: LineInput,
    /// Per-lot reservation breakdown, frozen when stock is reserved for the
    /// line. Approval consumes exactly these lots.
    reserved_lots: Option<Vec<LotReservation>>,
}

impl StockDocumentLine {
    fn new(line_no: LineNo, input: LineInput) -> Self {
        Self {
            line_no,
            input,
            reserved_lots: None,
        }
    }

    pub fn line_no(&self) -> LineNo {
        self.line_no
    }

    pub fn product_unit_id(&self) -> ProductUnitId {
        self.input.product_unit_id
    }

    pub fn quantity(&self) -> u32 {
        self.input.quantity
    }

    pub fn lot_number(&self) -> Option<&str> {
        self.input.lot_number.as_deref()
    }

    pub fn expiry_date(&self) -> Option<NaiveDate> {
        self.input.expiry_date
    }

    pub fn manufacturing_date(&self) -> Option<NaiveDate> {
        self.input.manufacturing_date
    }

    pub fn note(&self) -> Option<&str> {
        self.input.note.as_deref()
    }

    pub fn input(&self) -> &LineInput {
        &self.input
    }

    pub fn reserved_lots(&self) -> Option<&[LotReservation]> {
        self.reserved_lots.as_deref()
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved_lots.is_some()
    }
}

/// Stock document aggregate: a draft list of lines that becomes a stock
/// movement on approval.
///
/// Lines are editable only in `Draft`. `Approved` and `Cancelled` are
/// terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDocument {
    id: DocumentId,
    document_number: String,
    document_type: DocumentType,
    status: DocumentStatus,
    warehouse_id: WarehouseId,
    location_id: LocationId,
    destination_warehouse_id: Option<WarehouseId>,
    destination_location_id: Option<LocationId>,
    lines: Vec<StockDocumentLine>,
    next_line_no: LineNo,
    note: Option<String>,
    cancel_reason: Option<String>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    approved_at: Option<DateTime<Utc>>,
}

impl StockDocument {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        id: DocumentId,
        document_number: impl Into<String>,
        document_type: DocumentType,
        warehouse_id: WarehouseId,
        location_id: LocationId,
        destination: Option<(WarehouseId, LocationId)>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> StockResult<Self> {
        let document_number = document_number.into();
        if document_number.trim().is_empty() {
            return Err(StockError::validation("document number cannot be empty"));
        }
        match (document_type, destination) {
            (DocumentType::Transfer, None) => {
                return Err(StockError::validation(
                    "transfer documents require a destination",
                ));
            }
            (DocumentType::Transfer, Some((dw, dl))) => {
                if dw == warehouse_id && dl == location_id {
                    return Err(StockError::validation(
                        "transfer destination must differ from source",
                    ));
                }
            }
            (_, Some(_)) => {
                return Err(StockError::validation(
                    "only transfer documents carry a destination",
                ));
            }
            _ => {}
        }
        let (destination_warehouse_id, destination_location_id) = match destination {
            Some((dw, dl)) => (Some(dw), Some(dl)),
            None => (None, None),
        };
        Ok(Self {
            id,
            document_number,
            document_type,
            status: DocumentStatus::Draft,
            warehouse_id,
            location_id,
            destination_warehouse_id,
            destination_location_id,
            lines: Vec::new(),
            next_line_no: 1,
            note,
            cancel_reason: None,
            version: 1,
            created_at: now,
            updated_at: now,
            approved_at: None,
        })
    }

    pub fn document_number(&self) -> &str {
        &self.document_number
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn location_id(&self) -> LocationId {
        self.location_id
    }

    pub fn destination(&self) -> Option<(WarehouseId, LocationId)> {
        match (self.destination_warehouse_id, self.destination_location_id) {
            (Some(w), Some(l)) => Some((w, l)),
            _ => None,
        }
    }

    pub fn lines(&self) -> &[StockDocumentLine] {
        &self.lines
    }

    pub fn line(&self, line_no: LineNo) -> StockResult<&StockDocumentLine> {
        self.lines
            .iter()
            .find(|l| l.line_no == line_no)
            .ok_or_else(|| StockError::not_found("document line", line_no))
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Whether this document type holds stock while in draft.
    pub fn reserves_stock(&self) -> bool {
        matches!(
            self.document_type,
            DocumentType::Outbound | DocumentType::Transfer
        )
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }

    fn ensure_draft(&self, action: &'static str) -> StockResult<()> {
        if self.status != DocumentStatus::Draft {
            return Err(StockError::invalid_transition(
                "document",
                self.status,
                action,
            ));
        }
        Ok(())
    }

    fn line_mut(&mut self, line_no: LineNo) -> StockResult<&mut StockDocumentLine> {
        self.lines
            .iter_mut()
            .find(|l| l.line_no == line_no)
            .ok_or_else(|| StockError::not_found("document line", line_no))
    }

    /// Append a line. Draft only. Returns the assigned line number.
    pub fn add_line(&mut self, input: LineInput, now: DateTime<Utc>) -> StockResult<LineNo> {
        self.ensure_draft("add line")?;
        input.validate(self.document_type)?;
        let line_no = self.next_line_no;
        self.next_line_no += 1;
        self.lines.push(StockDocumentLine::new(line_no, input));
        self.touch(now);
        Ok(line_no)
    }

    /// Replace a line's data. Draft only. Any reservation snapshot on the line
    /// is cleared; the caller re-reserves against the new input.
    pub fn update_line(
        &mut self,
        line_no: LineNo,
        input: LineInput,
        now: DateTime<Utc>,
    ) -> StockResult<()> {
        self.ensure_draft("update line")?;
        input.validate(self.document_type)?;
        let line = self.line_mut(line_no)?;
        line.input = input;
        line.reserved_lots = None;
        self.touch(now);
        Ok(())
    }

    /// Remove a line. Draft only. Line numbers of the remaining lines are
    /// stable; numbering never compacts.
    pub fn delete_line(&mut self, line_no: LineNo, now: DateTime<Utc>) -> StockResult<()> {
        self.ensure_draft("delete line")?;
        let before = self.lines.len();
        self.lines.retain(|l| l.line_no != line_no);
        if self.lines.len() == before {
            return Err(StockError::not_found("document line", line_no));
        }
        self.touch(now);
        Ok(())
    }

    /// Record the per-lot breakdown backing a line's reservation.
    pub fn set_line_reservation(
        &mut self,
        line_no: LineNo,
        lots: Vec<LotReservation>,
        now: DateTime<Utc>,
    ) -> StockResult<()> {
        self.ensure_draft("reserve line")?;
        let quantity = self.line(line_no)?.quantity();
        let total: u32 = lots.iter().map(|r| r.quantity).sum();
        if total != quantity {
            return Err(StockError::validation(format!(
                "reservation breakdown totals {total}, line quantity is {quantity}"
            )));
        }
        self.line_mut(line_no)?.reserved_lots = Some(lots);
        self.touch(now);
        Ok(())
    }

    /// Take and clear a line's reservation breakdown.
    pub fn take_line_reservation(
        &mut self,
        line_no: LineNo,
        now: DateTime<Utc>,
    ) -> StockResult<Option<Vec<LotReservation>>> {
        let line = self.line_mut(line_no)?;
        let lots = line.reserved_lots.take();
        if lots.is_some() {
            self.touch(now);
        }
        Ok(lots)
    }

    /// Move to `Approved`. Draft only, and the document must have lines.
    pub fn approve(&mut self, now: DateTime<Utc>) -> StockResult<()> {
        self.ensure_draft("approve")?;
        if self.lines.is_empty() {
            return Err(StockError::validation(
                "cannot approve a document with no lines",
            ));
        }
        self.status = DocumentStatus::Approved;
        self.approved_at = Some(now);
        self.touch(now);
        Ok(())
    }

    /// Move to `Cancelled`. Draft only; approved documents are immutable
    /// history.
    pub fn cancel(&mut self, reason: Option<String>, now: DateTime<Utc>) -> StockResult<()> {
        self.ensure_draft("cancel")?;
        self.status = DocumentStatus::Cancelled;
        self.cancel_reason = reason;
        self.touch(now);
        Ok(())
    }
}

impl Entity for StockDocument {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
