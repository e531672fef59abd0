//! Error taxonomy for the stock engine.

use thiserror::Error;

/// Result type used across the stock domain.
pub type StockResult<T> = Result<T, StockError>;

/// Typed failure of a stock operation.
///
/// Every multi-step operation in the engine is all-or-nothing: when one of
/// these is returned, no partial mutation has been persisted. Variants carry
/// enough context (lot number, shortfall, offending state) for the caller to
/// act without re-querying.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// A value failed validation (e.g. malformed or missing input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A requested record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An allocation cannot be satisfied from available stock.
    #[error("insufficient stock: requested {requested}, available {available} (short {shortfall})")]
    InsufficientStock {
        requested: u32,
        available: u32,
        shortfall: u32,
    },

    /// A reservation would exceed what the lot has available.
    #[error("over-reservation on lot {lot}: requested {requested}, available {available}")]
    OverReservation {
        lot: String,
        requested: u32,
        available: u32,
    },

    /// A release would exceed what is currently reserved.
    #[error("release exceeds reservation on lot {lot}: requested {requested}, reserved {reserved}")]
    ReleaseExceedsReservation {
        lot: String,
        requested: u32,
        reserved: u32,
    },

    /// A state machine was asked to transition from a state that does not
    /// permit it (e.g. approving a non-draft document).
    #[error("invalid {entity} transition: cannot {action} while {state}")]
    InvalidTransition {
        entity: &'static str,
        state: String,
        action: &'static str,
    },

    /// A conflict occurred (stale version / lost update on a contended row).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StockError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn insufficient_stock(requested: u32, available: u32) -> Self {
        Self::InsufficientStock {
            requested,
            available,
            shortfall: requested.saturating_sub(available),
        }
    }

    pub fn invalid_transition(
        entity: &'static str,
        state: impl ToString,
        action: &'static str,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            state: state.to_string(),
            action,
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
