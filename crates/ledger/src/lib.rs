//! `lotwise-ledger` — immutable inventory transaction records.

pub mod transaction;

pub use transaction::{InventoryTransaction, TransactionType};
