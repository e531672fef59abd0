//! `lotwise-documents` — stock document aggregate and lifecycle.
//!
//! A document here is pure state: it validates its own transitions and line
//! edits, while stock effects (reservations, ledger rows) are applied by the
//! engine when the document moves through its lifecycle.

pub mod document;

pub use document::{
    DocumentStatus, DocumentType, LineInput, LineNo, StockDocument, StockDocumentLine,
};
