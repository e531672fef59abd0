use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lotwise_core::{DocumentId, LotId, StockError, StockKey, StockResult, TransactionId};

/// Kind of stock movement a ledger row records.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Inbound receipt. Positive quantity.
    Import,
    /// Outbound issue. Negative quantity.
    Export,
    /// Correction from an adjustment document or stocktaking. Signed.
    Adjust,
    /// One leg of an inter-location transfer. Signed (out is negative,
    /// in is positive).
    Transfer,
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            TransactionType::Import => "IMPORT",
            TransactionType::Export => "EXPORT",
            TransactionType::Adjust => "ADJUST",
            TransactionType::Transfer => "TRANSFER",
        };
        f.write_str(s)
    }
}

/// One immutable row of the inventory ledger.
///
/// Quantities are signed: the sum of a key's rows reconstructs its on-hand
/// quantity. Rows are never edited or deleted once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    id: TransactionId,
    key: StockKey,
    lot_id: Option<LotId>,
    transaction_type: TransactionType,
    quantity: i64,
    source_document_id: Option<DocumentId>,
    note: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl InventoryTransaction {
    pub fn new(
        key: StockKey,
        lot_id: Option<LotId>,
        transaction_type: TransactionType,
        quantity: i64,
        source_document_id: Option<DocumentId>,
        note: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<Self> {
        if quantity == 0 {
            return Err(StockError::validation(
                "ledger quantity cannot be zero",
            ));
        }
        match transaction_type {
            TransactionType::Import if quantity < 0 => {
                return Err(StockError::validation("import quantity must be positive"));
            }
            TransactionType::Export if quantity > 0 => {
                return Err(StockError::validation("export quantity must be negative"));
            }
            _ => {}
        }
        Ok(Self {
            id: TransactionId::new(),
            key,
            lot_id,
            transaction_type,
            quantity,
            source_document_id,
            note,
            occurred_at,
        })
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn key(&self) -> StockKey {
        self.key
    }

    pub fn lot_id(&self) -> Option<LotId> {
        self.lot_id
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    /// Signed movement quantity.
    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn source_document_id(&self) -> Option<DocumentId> {
        self.source_document_id
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotwise_core::{LocationId, ProductUnitId, WarehouseId};

    fn test_key() -> StockKey {
        StockKey::new(ProductUnitId::new(), WarehouseId::new(), LocationId::new())
    }

    #[test]
    fn zero_quantity_rows_are_rejected() {
        let err = InventoryTransaction::new(
            test_key(),
            None,
            TransactionType::Adjust,
            0,
            None,
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, StockError::Validation(_)));
    }

    #[test]
    fn import_must_be_positive_export_negative() {
        assert!(
            InventoryTransaction::new(
                test_key(),
                None,
                TransactionType::Import,
                -5,
                None,
                None,
                Utc::now(),
            )
            .is_err()
        );
        assert!(
            InventoryTransaction::new(
                test_key(),
                None,
                TransactionType::Export,
                5,
                None,
                None,
                Utc::now(),
            )
            .is_err()
        );
    }

    #[test]
    fn adjust_rows_may_be_signed_either_way() {
        for qty in [-7i64, 7] {
            let row = InventoryTransaction::new(
                test_key(),
                None,
                TransactionType::Adjust,
                qty,
                None,
                None,
                Utc::now(),
            )
            .unwrap();
            assert_eq!(row.quantity(), qty);
        }
    }
}
