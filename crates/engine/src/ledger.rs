//! Append-only inventory ledger.

use std::sync::{RwLock, RwLockWriteGuard};

use lotwise_core::{DocumentId, LotId, StockError, StockKey, StockResult};
use lotwise_ledger::InventoryTransaction;

/// In-memory append-only transaction log.
///
/// Rows are only ever appended; there is no update or delete surface. The
/// signed sum of a key's rows reconstructs its on-hand quantity.
#[derive(Debug, Default)]
pub struct InventoryLedger {
    rows: RwLock<Vec<InventoryTransaction>>,
}

impl InventoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> StockResult<std::sync::RwLockWriteGuard<'_, Vec<InventoryTransaction>>> {
        self.rows
            .write()
            .map_err(|_| StockError::conflict("ledger lock poisoned"))
    }

    fn read(&self) -> StockResult<std::sync::RwLockReadGuard<'_, Vec<InventoryTransaction>>> {
        self.rows
            .read()
            .map_err(|_| StockError::conflict("ledger lock poisoned"))
    }

    pub fn append(&self, row: InventoryTransaction) -> StockResult<()> {
        self.write()?.push(row);
        Ok(())
    }

    /// Stage a batch append. Acquiring the appender is the only fallible
    /// step; callers take it *before* mutating other state, so once stock has
    /// committed the rows are guaranteed to land.
    pub fn appender(&self) -> StockResult<LedgerAppender<'_>> {
        Ok(LedgerAppender {
            rows: self.write()?,
        })
    }

    pub fn len(&self) -> StockResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> StockResult<bool> {
        Ok(self.read()?.is_empty())
    }

    pub fn all(&self) -> StockResult<Vec<InventoryTransaction>> {
        Ok(self.read()?.clone())
    }

    pub fn rows_for_key(&self, key: StockKey) -> StockResult<Vec<InventoryTransaction>> {
        Ok(self
            .read()?
            .iter()
            .filter(|r| r.key() == key)
            .cloned()
            .collect())
    }

    pub fn rows_for_lot(&self, lot_id: LotId) -> StockResult<Vec<InventoryTransaction>> {
        Ok(self
            .read()?
            .iter()
            .filter(|r| r.lot_id() == Some(lot_id))
            .cloned()
            .collect())
    }

    pub fn rows_for_document(
        &self,
        document_id: DocumentId,
    ) -> StockResult<Vec<InventoryTransaction>> {
        Ok(self
            .read()?
            .iter()
            .filter(|r| r.source_document_id() == Some(document_id))
            .cloned()
            .collect())
    }

    /// Signed sum of all movements at a key.
    pub fn net_quantity(&self, key: StockKey) -> StockResult<i64> {
        Ok(self
            .read()?
            .iter()
            .filter(|r| r.key() == key)
            .map(|r| r.quantity())
            .sum())
    }
}

/// Write access staged ahead of a stock mutation.
pub struct LedgerAppender<'a> {
    rows: RwLockWriteGuard<'a, Vec<InventoryTransaction>>,
}

impl LedgerAppender<'_> {
    /// Append the batch. Infallible: the lock is already held.
    pub fn commit(mut self, rows: Vec<InventoryTransaction>) {
        self.rows.extend(rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lotwise_core::{LocationId, ProductUnitId, WarehouseId};
    use lotwise_ledger::TransactionType;

    fn test_key() -> StockKey {
        StockKey::new(ProductUnitId::new(), WarehouseId::new(), LocationId::new())
    }

    fn row(key: StockKey, tx: TransactionType, quantity: i64) -> InventoryTransaction {
        InventoryTransaction::new(key, None, tx, quantity, None, None, Utc::now()).unwrap()
    }

    #[test]
    fn net_quantity_sums_signed_rows() {
        let ledger = InventoryLedger::new();
        let key = test_key();
        ledger.append(row(key, TransactionType::Import, 100)).unwrap();
        ledger.append(row(key, TransactionType::Export, -30)).unwrap();
        ledger.append(row(key, TransactionType::Adjust, -5)).unwrap();
        ledger.append(row(test_key(), TransactionType::Import, 999)).unwrap();
        assert_eq!(ledger.net_quantity(key).unwrap(), 65);
    }

    #[test]
    fn staged_appender_lands_rows() {
        let ledger = InventoryLedger::new();
        let key = test_key();
        let appender = ledger.appender().unwrap();
        appender.commit(vec![row(key, TransactionType::Import, 10)]);
        assert_eq!(ledger.len().unwrap(), 1);
    }

    #[test]
    fn document_rows_are_queryable() {
        let ledger = InventoryLedger::new();
        let key = test_key();
        let doc = DocumentId::new();
        let with_doc = InventoryTransaction::new(
            key,
            None,
            TransactionType::Import,
            10,
            Some(doc),
            None,
            Utc::now(),
        )
        .unwrap();
        ledger.append(with_doc).unwrap();
        ledger.append(row(key, TransactionType::Import, 5)).unwrap();
        assert_eq!(ledger.rows_for_document(doc).unwrap().len(), 1);
        assert_eq!(ledger.rows_for_key(key).unwrap().len(), 2);
    }
}
