//! Product catalog lookup seam.
//!
//! The engine tracks stock by `ProductUnitId`; names and SKUs live elsewhere.
//! Views ask a [`ProductCatalog`] for display data so callers can plug in
//! their own product master.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use lotwise_core::{ProductUnitId, StockError, StockResult};

/// Display data for a product unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUnitInfo {
    pub product_unit_id: ProductUnitId,
    pub sku: String,
    pub name: String,
}

/// Read-only product master lookup.
pub trait ProductCatalog: Send + Sync {
    fn product_unit(&self, id: ProductUnitId) -> StockResult<Option<ProductUnitInfo>>;
}

/// Catalog backed by a map, for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    entries: RwLock<HashMap<ProductUnitId, ProductUnitInfo>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, info: ProductUnitInfo) -> StockResult<()> {
        self.entries
            .write()
            .map_err(|_| StockError::conflict("catalog lock poisoned"))?
            .insert(info.product_unit_id, info);
        Ok(())
    }
}

impl ProductCatalog for InMemoryCatalog {
    fn product_unit(&self, id: ProductUnitId) -> StockResult<Option<ProductUnitInfo>> {
        Ok(self
            .entries
            .read()
            .map_err(|_| StockError::conflict("catalog lock poisoned"))?
            .get(&id)
            .cloned())
    }
}

/// Catalog that knows nothing. Views fall back to bare ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCatalog;

impl ProductCatalog for NoCatalog {
    fn product_unit(&self, _id: ProductUnitId) -> StockResult<Option<ProductUnitInfo>> {
        Ok(None)
    }
}
