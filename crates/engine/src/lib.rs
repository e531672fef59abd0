//! `lotwise-engine` — transactional stock engine.
//!
//! Wires the domain crates together: the [`store::StockStore`] holds every
//! lot and balance behind one transactional boundary, the
//! [`allocation::AllocationEngine`] plans FEFO allocations over snapshots of
//! it, and the workflows drive documents and stocktakings through their
//! lifecycles while keeping the [`ledger::InventoryLedger`] appended.

pub mod allocation;
pub mod catalog;
pub mod config;
pub mod documents;
pub mod ledger;
pub mod reservation;
pub mod stocktaking;
pub mod store;
pub mod telemetry;

#[cfg(test)]
mod integration_tests;

pub use allocation::{AllocationEngine, AllocationPlan, AvailabilityReport};
pub use catalog::{InMemoryCatalog, NoCatalog, ProductCatalog, ProductUnitInfo};
pub use config::{EngineConfig, ReservationPolicy};
pub use documents::{ApprovalOutcome, DocumentLineView, DocumentView, StockDocumentWorkflow};
pub use ledger::{InventoryLedger, LedgerAppender};
pub use reservation::ReservationManager;
pub use stocktaking::{ConfirmOutcome, CountInput, DetailView, StocktakingWorkflow};
pub use store::StockStore;
