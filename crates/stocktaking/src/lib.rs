//! `lotwise-stocktaking` — physical count sheets.

pub mod sheet;

pub use sheet::{Stocktaking, StocktakingDetail, StocktakingStatus};
