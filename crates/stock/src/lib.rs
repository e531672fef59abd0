//! `lotwise-stock` — stock lot and balance aggregates.
//!
//! Quantity bookkeeping lives here: every mutation goes through a guard method
//! that enforces the non-negativity and reservation invariants, so callers can
//! never observe `reserved > current` or a negative quantity.

pub mod balance;
pub mod lot;

pub use balance::StockBalance;
pub use lot::{LotSpec, LotStatus, StockLot};
