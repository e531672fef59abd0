//! End-to-end flows across the engine.
//!
//! Exercises: receipt → reservation → issue, transfers, adjustments,
//! stocktaking reconciliation, and the atomicity/concurrency guarantees the
//! single-writer store provides.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use lotwise_core::{
    Entity, ExpectedVersion, LocationId, ProductUnitId, StockError, StockKey, WarehouseId,
};
use lotwise_documents::{DocumentStatus, DocumentType, LineInput};
use lotwise_ledger::TransactionType;
use lotwise_stocktaking::StocktakingStatus;

use crate::config::{EngineConfig, ReservationPolicy};
use crate::documents::StockDocumentWorkflow;
use crate::ledger::InventoryLedger;
use crate::reservation::ReservationManager;
use crate::stocktaking::{CountInput, StocktakingWorkflow};
use crate::store::StockStore;

struct Harness {
    store: Arc<StockStore>,
    ledger: Arc<InventoryLedger>,
    documents: StockDocumentWorkflow,
    stocktakings: StocktakingWorkflow,
    warehouse: WarehouseId,
    location: LocationId,
}

fn harness_with(config: EngineConfig) -> Harness {
    let store = Arc::new(StockStore::new());
    let ledger = Arc::new(InventoryLedger::new());
    Harness {
        documents: StockDocumentWorkflow::new(store.clone(), ledger.clone(), config),
        stocktakings: StocktakingWorkflow::new(store.clone(), ledger.clone()),
        store,
        ledger,
        warehouse: WarehouseId::new(),
        location: LocationId::new(),
    }
}

fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

fn day(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

impl Harness {
    fn key(&self, product: ProductUnitId) -> StockKey {
        StockKey::new(product, self.warehouse, self.location)
    }

    /// Approve an inbound receipt of `lots` for one product.
    fn receive(&self, product: ProductUnitId, lots: &[(&str, u32, Option<&str>)]) {
        let doc = self
            .documents
            .create_document(DocumentType::Inbound, self.warehouse, self.location, None, None)
            .unwrap();
        for (number, quantity, expiry) in lots {
            let mut input = LineInput::new(product, *quantity).with_lot(*number);
            if let Some(expiry) = expiry {
                input = input.with_expiry(day(expiry));
            }
            self.documents.add_line(*Entity::id(&doc), input).unwrap();
        }
        self.documents
            .approve(*Entity::id(&doc), ExpectedVersion::Any)
            .unwrap();
    }

    /// Assert the balance mirrors the lot sums at `key`.
    fn assert_balance_matches_lots(&self, key: StockKey) {
        let lots = self.store.lots_for_key(key).unwrap();
        let lot_current: u32 = lots.iter().map(|l| l.current_quantity()).sum();
        let lot_reserved: u32 = lots.iter().map(|l| l.reserved_quantity()).sum();
        let balance = self.store.get_balance(key).unwrap().unwrap();
        assert_eq!(balance.quantity(), lot_current);
        assert_eq!(balance.reserved_quantity(), lot_reserved);
    }
}

#[test]
fn receipt_reservation_issue_round_trip() {
    let h = harness();
    let product = ProductUnitId::new();
    let key = h.key(product);
    h.receive(
        product,
        &[
            ("LOT-EARLY", 10, Some("2031-03-01")),
            ("LOT-LATE", 20, Some("2031-09-01")),
        ],
    );

    // Outbound draft reserves FEFO on line add.
    let doc = h
        .documents
        .create_document(DocumentType::Outbound, h.warehouse, h.location, None, None)
        .unwrap();
    let (line_no, doc_after) = h
        .documents
        .add_line(*Entity::id(&doc), LineInput::new(product, 15))
        .unwrap();
    let reserved = doc_after.line(line_no).unwrap().reserved_lots().unwrap();
    assert_eq!(reserved[0].lot_number, "LOT-EARLY");
    assert_eq!(reserved[0].quantity, 10);
    assert_eq!(reserved[1].lot_number, "LOT-LATE");
    assert_eq!(reserved[1].quantity, 5);
    h.assert_balance_matches_lots(key);

    let outcome = h
        .documents
        .approve(*Entity::id(&doc), ExpectedVersion::Any)
        .unwrap();
    assert_eq!(outcome.document.status(), DocumentStatus::Approved);
    // One export row for the line, regardless of how many lots it drew from.
    assert_eq!(outcome.transactions.len(), 1);
    assert_eq!(outcome.transactions[0].transaction_type(), TransactionType::Export);
    assert_eq!(outcome.transactions[0].quantity(), -15);

    let balance = h.store.get_balance(key).unwrap().unwrap();
    assert_eq!(balance.quantity(), 15);
    assert_eq!(balance.reserved_quantity(), 0);
    h.assert_balance_matches_lots(key);

    // Ledger reconstructs the balance.
    assert_eq!(h.ledger.net_quantity(key).unwrap(), 15);
}

#[test]
fn outbound_line_spanning_lots_writes_one_export_row() {
    let h = harness();
    let product = ProductUnitId::new();
    let key = h.key(product);
    h.receive(
        product,
        &[
            ("LOT-A", 10, Some("2031-02-01")),
            ("LOT-B", 20, Some("2031-08-01")),
        ],
    );

    let doc = h
        .documents
        .create_document(DocumentType::Outbound, h.warehouse, h.location, None, None)
        .unwrap();
    h.documents
        .add_line(*Entity::id(&doc), LineInput::new(product, 15))
        .unwrap();
    let outcome = h
        .documents
        .approve(*Entity::id(&doc), ExpectedVersion::Any)
        .unwrap();

    // The 15 units came out of two lots, but the ledger sees one row per
    // line, with the breakdown preserved in the note.
    assert_eq!(outcome.transactions.len(), 1);
    let row = &outcome.transactions[0];
    assert_eq!(row.transaction_type(), TransactionType::Export);
    assert_eq!(row.quantity(), -15);
    assert_eq!(row.key(), key);
    assert_eq!(row.lot_id(), None);
    let note = row.note().unwrap();
    assert!(note.contains("LOT-A:10"));
    assert!(note.contains("LOT-B:5"));
    assert_eq!(h.ledger.net_quantity(key).unwrap(), 15);
}

/// Panic while holding the ledger's write lock, leaving it poisoned.
fn poison_ledger(ledger: &Arc<InventoryLedger>) {
    let ledger = ledger.clone();
    let handle = std::thread::spawn(move || {
        let _appender = ledger.appender().unwrap();
        panic!("bail while holding the ledger");
    });
    assert!(handle.join().is_err());
}

#[test]
fn unavailable_ledger_fails_approval_before_stock_moves() {
    let h = harness();
    let product = ProductUnitId::new();
    let doc = h
        .documents
        .create_document(DocumentType::Inbound, h.warehouse, h.location, None, None)
        .unwrap();
    h.documents
        .add_line(
            *Entity::id(&doc),
            LineInput::new(product, 10).with_lot("LOT-A"),
        )
        .unwrap();

    poison_ledger(&h.ledger);
    let err = h
        .documents
        .approve(*Entity::id(&doc), ExpectedVersion::Any)
        .unwrap_err();
    assert!(matches!(err, StockError::Conflict(_)));

    // Nothing was received and the document is still a draft, so the failed
    // approval cannot double-count stock.
    assert!(h.store.get_balance(h.key(product)).unwrap().is_none());
    assert_eq!(
        h.documents.get_document(*Entity::id(&doc)).unwrap().status(),
        DocumentStatus::Draft
    );
}

#[test]
fn unavailable_ledger_fails_confirm_before_corrections() {
    let h = harness();
    let product = ProductUnitId::new();
    h.receive(product, &[("LOT-A", 10, None)]);

    let sheet = h.stocktakings.create(h.warehouse, h.location, None).unwrap();
    let id = *Entity::id(&sheet);
    h.stocktakings
        .record_count(
            id,
            CountInput {
                product_unit_id: product,
                actual_quantity: 7,
                note: None,
            },
        )
        .unwrap();

    poison_ledger(&h.ledger);
    let err = h.stocktakings.confirm(id, ExpectedVersion::Any).unwrap_err();
    assert!(matches!(err, StockError::Conflict(_)));

    assert_eq!(h.store.get_balance(h.key(product)).unwrap().unwrap().quantity(), 10);
    assert_eq!(
        h.stocktakings.get(id).unwrap().status(),
        StocktakingStatus::InProgress
    );
}

#[test]
fn draft_cancellation_releases_holds() {
    let h = harness();
    let product = ProductUnitId::new();
    let key = h.key(product);
    h.receive(product, &[("LOT-A", 10, None)]);

    let doc = h
        .documents
        .create_document(DocumentType::Outbound, h.warehouse, h.location, None, None)
        .unwrap();
    h.documents
        .add_line(*Entity::id(&doc), LineInput::new(product, 7))
        .unwrap();
    assert_eq!(
        h.store.get_balance(key).unwrap().unwrap().available_quantity(),
        3
    );

    let cancelled = h
        .documents
        .cancel(*Entity::id(&doc), ExpectedVersion::Any)
        .unwrap();
    assert_eq!(cancelled.status(), DocumentStatus::Cancelled);
    assert_eq!(
        h.store.get_balance(key).unwrap().unwrap().available_quantity(),
        10
    );
    // Cancellation moves no stock, so no ledger rows beyond the receipt.
    assert_eq!(h.ledger.rows_for_key(key).unwrap().len(), 1);
}

#[test]
fn rejection_records_the_reason_and_releases_holds() {
    let h = harness();
    let product = ProductUnitId::new();
    h.receive(product, &[("LOT-A", 10, None)]);

    let doc = h
        .documents
        .create_document(DocumentType::Outbound, h.warehouse, h.location, None, None)
        .unwrap();
    h.documents
        .add_line(*Entity::id(&doc), LineInput::new(product, 4))
        .unwrap();
    let rejected = h
        .documents
        .reject(*Entity::id(&doc), ExpectedVersion::Any, "wrong customer")
        .unwrap();
    assert_eq!(rejected.status(), DocumentStatus::Cancelled);
    assert_eq!(rejected.cancel_reason(), Some("wrong customer"));
    assert_eq!(
        h.store
            .get_balance(h.key(product))
            .unwrap()
            .unwrap()
            .reserved_quantity(),
        0
    );
}

#[test]
fn insufficient_stock_fails_line_add_without_partial_holds() {
    let h = harness();
    let product = ProductUnitId::new();
    let key = h.key(product);
    h.receive(product, &[("LOT-A", 5, None), ("LOT-B", 5, None)]);

    let doc = h
        .documents
        .create_document(DocumentType::Outbound, h.warehouse, h.location, None, None)
        .unwrap();
    let err = h
        .documents
        .add_line(*Entity::id(&doc), LineInput::new(product, 11))
        .unwrap_err();
    assert_eq!(
        err,
        StockError::InsufficientStock {
            requested: 11,
            available: 10,
            shortfall: 1,
        }
    );
    // Nothing held, no line on the document.
    assert_eq!(
        h.store.get_balance(key).unwrap().unwrap().reserved_quantity(),
        0
    );
    assert!(h.documents.get_document(*Entity::id(&doc)).unwrap().lines().is_empty());
}

#[test]
fn update_line_rebooks_atomically() {
    let h = harness();
    let product = ProductUnitId::new();
    let key = h.key(product);
    h.receive(product, &[("LOT-A", 10, None)]);

    let doc = h
        .documents
        .create_document(DocumentType::Outbound, h.warehouse, h.location, None, None)
        .unwrap();
    let (line_no, _) = h
        .documents
        .add_line(*Entity::id(&doc), LineInput::new(product, 4))
        .unwrap();

    // Growing the line works: 4 released + 9 re-held out of 10.
    h.documents
        .update_line(*Entity::id(&doc), line_no, LineInput::new(product, 9))
        .unwrap();
    assert_eq!(
        h.store.get_balance(key).unwrap().unwrap().reserved_quantity(),
        9
    );

    // An impossible target fails and the 9-unit hold survives.
    let err = h
        .documents
        .update_line(*Entity::id(&doc), line_no, LineInput::new(product, 11))
        .unwrap_err();
    assert!(matches!(err, StockError::InsufficientStock { .. }));
    assert_eq!(
        h.store.get_balance(key).unwrap().unwrap().reserved_quantity(),
        9
    );
    let line = h
        .documents
        .get_document(*Entity::id(&doc))
        .unwrap()
        .line(line_no)
        .unwrap()
        .clone();
    assert_eq!(line.quantity(), 9);
    h.assert_balance_matches_lots(key);
}

#[test]
fn transfer_moves_lot_identity_to_destination() {
    let h = harness();
    let product = ProductUnitId::new();
    let source_key = h.key(product);
    h.receive(product, &[("LOT-A", 12, Some("2031-05-01"))]);

    let dest_warehouse = WarehouseId::new();
    let dest_location = LocationId::new();
    let dest_key = source_key.relocated(dest_warehouse, dest_location);

    let doc = h
        .documents
        .create_document(
            DocumentType::Transfer,
            h.warehouse,
            h.location,
            Some((dest_warehouse, dest_location)),
            None,
        )
        .unwrap();
    h.documents
        .add_line(*Entity::id(&doc), LineInput::new(product, 8))
        .unwrap();
    let outcome = h
        .documents
        .approve(*Entity::id(&doc), ExpectedVersion::Any)
        .unwrap();

    // One negative row at the source, one positive at the destination.
    assert_eq!(outcome.transactions.len(), 2);
    let (out_row, in_row) = (&outcome.transactions[0], &outcome.transactions[1]);
    assert_eq!(out_row.transaction_type(), TransactionType::Transfer);
    assert_eq!(out_row.quantity(), -8);
    assert_eq!(out_row.key(), source_key);
    assert_eq!(in_row.quantity(), 8);
    assert_eq!(in_row.key(), dest_key);

    // The destination lot keeps the number and expiry.
    let dest_lot = h
        .store
        .find_lot_by_number(dest_key, "LOT-A")
        .unwrap()
        .unwrap();
    assert_eq!(dest_lot.current_quantity(), 8);
    assert_eq!(dest_lot.expiry_date(), Some(day("2031-05-01")));

    assert_eq!(h.store.get_balance(source_key).unwrap().unwrap().quantity(), 4);
    assert_eq!(h.store.get_balance(dest_key).unwrap().unwrap().quantity(), 8);
    h.assert_balance_matches_lots(source_key);
    h.assert_balance_matches_lots(dest_key);
    assert_eq!(h.ledger.net_quantity(source_key).unwrap(), 4);
    assert_eq!(h.ledger.net_quantity(dest_key).unwrap(), 8);
}

#[test]
fn adjustment_document_sets_targets() {
    let h = harness();
    let product = ProductUnitId::new();
    let key = h.key(product);
    h.receive(product, &[("LOT-A", 10, None)]);

    let doc = h
        .documents
        .create_document(DocumentType::Adjustment, h.warehouse, h.location, None, None)
        .unwrap();
    h.documents
        .add_line(*Entity::id(&doc), LineInput::new(product, 16))
        .unwrap();
    let outcome = h
        .documents
        .approve(*Entity::id(&doc), ExpectedVersion::Any)
        .unwrap();

    assert_eq!(outcome.transactions.len(), 1);
    assert_eq!(outcome.transactions[0].transaction_type(), TransactionType::Adjust);
    assert_eq!(outcome.transactions[0].quantity(), 6);
    assert_eq!(h.store.get_balance(key).unwrap().unwrap().quantity(), 16);
    h.assert_balance_matches_lots(key);
}

#[test]
fn adjustment_to_book_quantity_writes_no_rows() {
    let h = harness();
    let product = ProductUnitId::new();
    let key = h.key(product);
    h.receive(product, &[("LOT-A", 10, None)]);

    let doc = h
        .documents
        .create_document(DocumentType::Adjustment, h.warehouse, h.location, None, None)
        .unwrap();
    h.documents
        .add_line(*Entity::id(&doc), LineInput::new(product, 10))
        .unwrap();
    let outcome = h
        .documents
        .approve(*Entity::id(&doc), ExpectedVersion::Any)
        .unwrap();
    assert!(outcome.transactions.is_empty());
    assert_eq!(h.ledger.rows_for_key(key).unwrap().len(), 1);
}

#[test]
fn adjustment_cannot_cut_into_reserved_stock() {
    let h = harness();
    let product = ProductUnitId::new();
    h.receive(product, &[("LOT-A", 10, None)]);
    let manager = ReservationManager::new(h.store.clone());
    manager
        .reserve_fefo(h.key(product), 7, Utc::now().date_naive())
        .unwrap();

    let doc = h
        .documents
        .create_document(DocumentType::Adjustment, h.warehouse, h.location, None, None)
        .unwrap();
    h.documents
        .add_line(*Entity::id(&doc), LineInput::new(product, 5))
        .unwrap();
    let err = h
        .documents
        .approve(*Entity::id(&doc), ExpectedVersion::Any)
        .unwrap_err();
    assert!(matches!(err, StockError::InsufficientStock { .. }));
    // The failed approval left the document in draft and stock untouched.
    assert_eq!(
        h.documents.get_document(*Entity::id(&doc)).unwrap().status(),
        DocumentStatus::Draft
    );
    assert_eq!(h.store.get_balance(h.key(product)).unwrap().unwrap().quantity(), 10);
}

#[test]
fn multi_line_approval_is_all_or_nothing() {
    let h = harness();
    let product_ok = ProductUnitId::new();
    let product_short = ProductUnitId::new();
    h.receive(product_ok, &[("LOT-A", 10, None)]);
    h.receive(product_short, &[("LOT-B", 2, None)]);

    // On-approve policy so the shortage surfaces at approval time.
    let h2 = Harness {
        documents: StockDocumentWorkflow::new(
            h.store.clone(),
            h.ledger.clone(),
            EngineConfig::default().with_reservation_policy(ReservationPolicy::OnApprove),
        ),
        stocktakings: StocktakingWorkflow::new(h.store.clone(), h.ledger.clone()),
        store: h.store.clone(),
        ledger: h.ledger.clone(),
        warehouse: h.warehouse,
        location: h.location,
    };

    let doc = h2
        .documents
        .create_document(DocumentType::Outbound, h2.warehouse, h2.location, None, None)
        .unwrap();
    h2.documents
        .add_line(*Entity::id(&doc), LineInput::new(product_ok, 5))
        .unwrap();
    h2.documents
        .add_line(*Entity::id(&doc), LineInput::new(product_short, 3))
        .unwrap();

    let err = h2
        .documents
        .approve(*Entity::id(&doc), ExpectedVersion::Any)
        .unwrap_err();
    assert!(matches!(err, StockError::InsufficientStock { .. }));

    // The first line's consumption must have rolled back with the second's
    // failure.
    let balance = h2.store.get_balance(h2.key(product_ok)).unwrap().unwrap();
    assert_eq!(balance.quantity(), 10);
    assert_eq!(balance.reserved_quantity(), 0);
}

#[test]
fn stale_version_is_rejected_on_approval() {
    let h = harness();
    let product = ProductUnitId::new();
    h.receive(product, &[("LOT-A", 10, None)]);

    let doc = h
        .documents
        .create_document(DocumentType::Outbound, h.warehouse, h.location, None, None)
        .unwrap();
    let version_before_line = doc.version();
    h.documents
        .add_line(*Entity::id(&doc), LineInput::new(product, 5))
        .unwrap();

    let err = h
        .documents
        .approve(*Entity::id(&doc), ExpectedVersion::Exact(version_before_line))
        .unwrap_err();
    assert!(matches!(err, StockError::Conflict(_)));

    let current = h.documents.get_document(*Entity::id(&doc)).unwrap();
    h.documents
        .approve(*Entity::id(&doc), ExpectedVersion::Exact(current.version()))
        .unwrap();
}

#[test]
fn stocktaking_reconciles_counted_differences() {
    let h = harness();
    let product_over = ProductUnitId::new();
    let product_short = ProductUnitId::new();
    let product_exact = ProductUnitId::new();
    h.receive(product_over, &[("LOT-A", 50, None)]);
    h.receive(product_short, &[("LOT-B", 30, None)]);
    h.receive(product_exact, &[("LOT-C", 20, None)]);

    let sheet = h.stocktakings.create(h.warehouse, h.location, None).unwrap();
    let id = *Entity::id(&sheet);

    h.stocktakings
        .record_count(
            id,
            CountInput {
                product_unit_id: product_over,
                actual_quantity: 53,
                note: None,
            },
        )
        .unwrap();
    h.stocktakings
        .record_count(
            id,
            CountInput {
                product_unit_id: product_short,
                actual_quantity: 28,
                note: Some("two damaged".to_string()),
            },
        )
        .unwrap();
    h.stocktakings
        .record_count(
            id,
            CountInput {
                product_unit_id: product_exact,
                actual_quantity: 20,
                note: None,
            },
        )
        .unwrap();

    let outcome = h.stocktakings.confirm(id, ExpectedVersion::Any).unwrap();
    assert_eq!(outcome.stocktaking.status(), StocktakingStatus::Confirmed);
    // Only the two non-zero differences produce corrections.
    assert_eq!(outcome.transactions.len(), 2);

    assert_eq!(
        h.store.get_balance(h.key(product_over)).unwrap().unwrap().quantity(),
        53
    );
    assert_eq!(
        h.store.get_balance(h.key(product_short)).unwrap().unwrap().quantity(),
        28
    );
    assert_eq!(
        h.store.get_balance(h.key(product_exact)).unwrap().unwrap().quantity(),
        20
    );
    h.assert_balance_matches_lots(h.key(product_over));
    h.assert_balance_matches_lots(h.key(product_short));

    // The ledger carries the corrections.
    assert_eq!(h.ledger.net_quantity(h.key(product_over)).unwrap(), 53);
    assert_eq!(h.ledger.net_quantity(h.key(product_short)).unwrap(), 28);

    let completed = h.stocktakings.complete(id).unwrap();
    assert_eq!(completed.status(), StocktakingStatus::Completed);
}

#[test]
fn stocktaking_confirm_requires_counts() {
    let h = harness();
    let sheet = h.stocktakings.create(h.warehouse, h.location, None).unwrap();
    let err = h
        .stocktakings
        .confirm(*Entity::id(&sheet), ExpectedVersion::Any)
        .unwrap_err();
    assert!(matches!(err, StockError::Validation(_)));
}

#[test]
fn batch_counts_confirm_in_one_call() {
    let h = harness();
    let product_a = ProductUnitId::new();
    let product_b = ProductUnitId::new();
    h.receive(product_a, &[("LOT-A", 10, None)]);
    h.receive(product_b, &[("LOT-B", 10, None)]);

    let sheet = h.stocktakings.create(h.warehouse, h.location, None).unwrap();
    let outcome = h
        .stocktakings
        .confirm_with_counts(
            *Entity::id(&sheet),
            vec![
                CountInput {
                    product_unit_id: product_a,
                    actual_quantity: 12,
                    note: None,
                },
                CountInput {
                    product_unit_id: product_b,
                    actual_quantity: 10,
                    note: None,
                },
            ],
            ExpectedVersion::Exact(sheet.version()),
        )
        .unwrap();
    assert_eq!(outcome.stocktaking.status(), StocktakingStatus::Confirmed);
    assert_eq!(outcome.transactions.len(), 1);
    assert_eq!(h.store.get_balance(h.key(product_a)).unwrap().unwrap().quantity(), 12);
}

#[test]
fn cancelled_stocktaking_after_confirm_keeps_corrections() {
    let h = harness();
    let product = ProductUnitId::new();
    h.receive(product, &[("LOT-A", 10, None)]);

    let sheet = h.stocktakings.create(h.warehouse, h.location, None).unwrap();
    let id = *Entity::id(&sheet);
    h.stocktakings
        .record_count(
            id,
            CountInput {
                product_unit_id: product,
                actual_quantity: 7,
                note: None,
            },
        )
        .unwrap();
    h.stocktakings.confirm(id, ExpectedVersion::Any).unwrap();
    h.stocktakings
        .cancel(id, Some("count disputed".to_string()))
        .unwrap();

    // Cancellation does not reverse the applied correction.
    assert_eq!(h.store.get_balance(h.key(product)).unwrap().unwrap().quantity(), 7);
}

#[test]
fn concurrent_reservations_never_oversell() {
    let h = harness();
    let product = ProductUnitId::new();
    let key = h.key(product);
    h.receive(product, &[("LOT-A", 10, None)]);

    let manager = ReservationManager::new(h.store.clone());
    let today = Utc::now().date_naive();

    // Two threads race to reserve 6 of 10. Exactly one can win.
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let manager = manager.clone();
            std::thread::spawn(move || manager.reserve_fefo(key, 6, today))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|t| t.join().unwrap()).collect();

    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    let loss = results.iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loss.as_ref().unwrap_err(),
        StockError::InsufficientStock { .. }
    ));

    let balance = h.store.get_balance(key).unwrap().unwrap();
    assert_eq!(balance.reserved_quantity(), 6);
    h.assert_balance_matches_lots(key);
}
