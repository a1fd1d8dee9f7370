//! Integration tests for the full write path.
//!
//! Tests: StockService → MovementValidator → LedgerStore → BalanceSheet → report
//!
//! Verifies:
//! - Accepted movements show up in balances, history and the report
//! - Rejected writes leave the ledger untouched
//! - Concurrent withdrawals never drive a balance negative

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{TimeZone, Utc};

    use stockflow_core::{DomainError, LocationId, MovementId, ProductId};
    use stockflow_ledger::{MovementDraft, MovementKind, Quantity, StockLine};

    use crate::service::StockService;
    use crate::store::InMemoryLedgerStore;

    fn prod(s: &str) -> ProductId {
        ProductId::parse(s).unwrap()
    }

    fn loc(s: &str) -> LocationId {
        LocationId::parse(s).unwrap()
    }

    fn draft(product: &str, from: Option<&str>, to: Option<&str>, qty: i64) -> MovementDraft {
        MovementDraft::new(prod(product), from.map(loc), to.map(loc), Quantity::new(qty).unwrap())
    }

    fn line(product: &str, location: &str, balance: i64) -> StockLine {
        StockLine {
            product_id: prod(product),
            location_id: loc(location),
            balance,
        }
    }

    fn setup() -> StockService<InMemoryLedgerStore> {
        let service = StockService::new(InMemoryLedgerStore::new());
        for p in ["P1", "P2"] {
            service.register_product(prod(p)).unwrap();
        }
        for l in ["L1", "L2", "L3"] {
            service.register_location(loc(l)).unwrap();
        }
        service
    }

    /// Scenario 2 state: 10 × P1 received at L1.
    fn with_receipt() -> StockService<InMemoryLedgerStore> {
        let service = setup();
        service
            .record_movement(draft("P1", None, Some("L1"), 10))
            .unwrap();
        service
    }

    #[test]
    fn empty_ledger_reports_nothing() {
        let service = setup();
        assert!(service.stock_report().unwrap().is_empty());
        assert!(service.movement_history().unwrap().is_empty());
    }

    #[test]
    fn receipt_raises_destination_balance() {
        let service = with_receipt();
        assert_eq!(service.balance(&prod("P1"), &loc("L1")).unwrap(), 10);
        assert_eq!(service.stock_report().unwrap(), vec![line("P1", "L1", 10)]);
    }

    #[test]
    fn overdrawn_transfer_is_rejected_and_ledger_unchanged() {
        let service = with_receipt();
        let before = service.movement_history().unwrap();

        let err = service
            .record_movement(draft("P1", Some("L1"), Some("L2"), 15))
            .unwrap_err();

        assert_eq!(err.shortfall(), Some((10, 15)));
        assert_eq!(
            err.as_domain(),
            Some(&DomainError::insufficient_stock("P1", "L1", 10, 15))
        );
        assert_eq!(service.movement_history().unwrap(), before);
        assert_eq!(service.balance(&prod("P1"), &loc("L1")).unwrap(), 10);
        assert_eq!(service.balance(&prod("P1"), &loc("L2")).unwrap(), 0);
    }

    #[test]
    fn covered_transfer_moves_stock() {
        let service = with_receipt();
        let transfer = service
            .record_movement(draft("P1", Some("L1"), Some("L2"), 4))
            .unwrap();

        assert_eq!(transfer.kind(), MovementKind::Transfer);
        assert_eq!(service.balance(&prod("P1"), &loc("L1")).unwrap(), 6);
        assert_eq!(service.balance(&prod("P1"), &loc("L2")).unwrap(), 4);
        assert_eq!(
            service.stock_report().unwrap(),
            vec![line("P1", "L1", 6), line("P1", "L2", 4)]
        );
    }

    #[test]
    fn amendment_beyond_available_stock_is_rejected() {
        let service = with_receipt();
        let transfer = service
            .record_movement(draft("P1", Some("L1"), Some("L2"), 4))
            .unwrap();

        let err = service
            .amend_movement(transfer.movement_id, draft("P1", Some("L1"), Some("L2"), 20))
            .unwrap_err();

        assert_eq!(err.shortfall(), Some((6, 16)));
        assert_eq!(service.movement(transfer.movement_id).unwrap(), transfer);
        assert_eq!(service.balance(&prod("P1"), &loc("L1")).unwrap(), 6);
    }

    #[test]
    fn amendment_within_available_stock_is_accepted() {
        let service = with_receipt();
        let transfer = service
            .record_movement(draft("P1", Some("L1"), Some("L2"), 4))
            .unwrap();

        let amended = service
            .amend_movement(transfer.movement_id, draft("P1", Some("L1"), Some("L2"), 10))
            .unwrap();

        assert_eq!(amended.qty.get(), 10);
        assert_eq!(service.balance(&prod("P1"), &loc("L1")).unwrap(), 0);
        assert_eq!(service.stock_report().unwrap(), vec![line("P1", "L2", 10)]);
    }

    #[test]
    fn shrinking_a_receipt_below_what_was_shipped_is_rejected() {
        let service = with_receipt();
        let receipt = service.movement_history().unwrap().remove(0);
        service
            .record_movement(draft("P1", Some("L1"), None, 8))
            .unwrap();

        let err = service
            .amend_movement(receipt.movement_id, draft("P1", None, Some("L1"), 5))
            .unwrap_err();

        assert_eq!(err.shortfall(), Some((2, 5)));
        assert_eq!(service.balance(&prod("P1"), &loc("L1")).unwrap(), 2);
    }

    #[test]
    fn recorded_movement_round_trips_through_history() {
        let service = with_receipt();
        let occurred_at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();
        let supplied = draft("P1", Some("L1"), None, 3).at(occurred_at);

        let recorded = service.record_movement(supplied.clone()).unwrap();

        let history = service.movement_history().unwrap();
        assert_eq!(history.len(), 2);
        let stored = history
            .iter()
            .find(|m| m.movement_id == recorded.movement_id)
            .unwrap();
        assert_eq!(stored, &recorded);
        assert_eq!(stored.movement_id, MovementId::new(2));
        assert_eq!(stored.product_id, supplied.product_id);
        assert_eq!(stored.from_location, supplied.from_location);
        assert_eq!(stored.to_location, supplied.to_location);
        assert_eq!(stored.qty, supplied.qty);
        assert_eq!(stored.timestamp, occurred_at);
        assert_eq!(stored.to_draft(), supplied);
        assert_eq!(stored.kind(), MovementKind::Issue);
    }

    #[test]
    fn report_is_idempotent() {
        let service = with_receipt();
        service
            .record_movement(draft("P1", Some("L1"), Some("L3"), 2))
            .unwrap();
        service
            .record_movement(draft("P2", None, Some("L2"), 7))
            .unwrap();

        let first = service.stock_report().unwrap();
        let second = service.stock_report().unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![line("P1", "L1", 8), line("P1", "L3", 2), line("P2", "L2", 7)]
        );
    }

    #[test]
    fn report_omits_drained_balances() {
        let service = with_receipt();
        service
            .record_movement(draft("P1", Some("L1"), None, 10))
            .unwrap();
        assert!(service.stock_report().unwrap().is_empty());
    }

    #[test]
    fn history_is_newest_first_with_id_tiebreak() {
        let service = setup();
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();

        let a = service
            .record_movement(draft("P1", None, Some("L1"), 1).at(late))
            .unwrap();
        let b = service
            .record_movement(draft("P1", None, Some("L1"), 1).at(early))
            .unwrap();
        let c = service
            .record_movement(draft("P1", None, Some("L1"), 1).at(late))
            .unwrap();

        let ids: Vec<MovementId> = service
            .movement_history()
            .unwrap()
            .into_iter()
            .map(|m| m.movement_id)
            .collect();
        assert_eq!(ids, vec![c.movement_id, a.movement_id, b.movement_id]);
    }

    #[test]
    fn renames_follow_through_history_and_report() {
        let service = with_receipt();
        service
            .record_movement(draft("P1", Some("L1"), Some("L2"), 4))
            .unwrap();

        service.rename_product(&prod("P1"), prod("WIDGET")).unwrap();
        service.rename_location(&loc("L1"), loc("MAIN")).unwrap();

        assert_eq!(
            service.stock_report().unwrap(),
            vec![line("WIDGET", "L2", 4), line("WIDGET", "MAIN", 6)]
        );
        let history = service.movement_history().unwrap();
        assert!(history.iter().all(|m| m.product_id == prod("WIDGET")));
        assert!(history.iter().all(|m| m.to_location.as_ref() != Some(&loc("L1"))));
        assert_eq!(service.products().unwrap(), vec![prod("P2"), prod("WIDGET")]);

        // The old ids are free again and unrelated to the moved stock.
        service.register_product(prod("P1")).unwrap();
        assert_eq!(service.balance(&prod("P1"), &loc("MAIN")).unwrap(), 0);
    }

    #[test]
    fn error_kinds_are_distinguishable() {
        let service = with_receipt();

        let unknown_location = service
            .record_movement(draft("P1", Some("L1"), Some("NOWHERE"), 1))
            .unwrap_err();
        assert!(matches!(
            unknown_location.as_domain(),
            Some(DomainError::Referential(_))
        ));

        let same_place = service
            .record_movement(draft("P1", Some("L1"), Some("L1"), 1))
            .unwrap_err();
        assert!(matches!(same_place.as_domain(), Some(DomainError::Validation(_))));

        let missing = service
            .amend_movement(MovementId::new(77), draft("P1", None, Some("L1"), 1))
            .unwrap_err();
        assert!(matches!(missing.as_domain(), Some(DomainError::NotFound { .. })));

        let taken = service.register_location(loc("L2")).unwrap_err();
        assert!(matches!(taken.as_domain(), Some(DomainError::Conflict(_))));

        assert!(MovementDraft::parse("P1", Some(""), Some(""), 1).is_err());
        assert!(MovementDraft::parse("P1", Some("L1"), None, 0).is_err());

        assert_eq!(service.movement_history().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_withdrawals_never_overdraw() {
        let service = Arc::new(with_receipt());
        let accepted = AtomicUsize::new(0);
        let rejected = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    match service.record_movement(draft("P1", Some("L1"), Some("L2"), 3)) {
                        Ok(_) => accepted.fetch_add(1, Ordering::SeqCst),
                        Err(e) => {
                            assert!(e.shortfall().is_some(), "unexpected error: {e}");
                            rejected.fetch_add(1, Ordering::SeqCst)
                        }
                    };
                });
            }
        });

        assert_eq!(accepted.load(Ordering::SeqCst), 3);
        assert_eq!(rejected.load(Ordering::SeqCst), 5);
        assert_eq!(service.balance(&prod("P1"), &loc("L1")).unwrap(), 1);
        assert_eq!(service.balance(&prod("P1"), &loc("L2")).unwrap(), 9);
    }

    #[test]
    fn shared_store_sees_writes_from_every_service() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let writer = StockService::new(Arc::clone(&store));
        let reader = StockService::new(store);

        writer.register_product(prod("P1")).unwrap();
        writer.register_location(loc("L1")).unwrap();
        writer
            .record_movement(draft("P1", None, Some("L1"), 5))
            .unwrap();

        assert_eq!(reader.stock_report().unwrap(), vec![line("P1", "L1", 5)]);
    }
}
