//! `lotwise-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod key;
pub mod value_object;

pub use entity::{Entity, ExpectedVersion};
pub use error::{StockError, StockResult};
pub use id::{
    DocumentId, LocationId, LotId, ProductUnitId, StocktakingId, TransactionId, WarehouseId,
};
pub use key::{LotReservation, StockKey};
pub use value_object::ValueObject;
