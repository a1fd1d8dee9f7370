use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use stockflow_core::{LocationId, MovementId, ProductId};
use stockflow_infra::StockService;
use stockflow_infra::store::InMemoryLedgerStore;
use stockflow_ledger::{BalanceSheet, Movement, MovementDraft, Quantity, StockLine, balance};

const PRODUCTS: usize = 20;
const LOCATIONS: usize = 10;

fn products() -> Vec<ProductId> {
    (0..PRODUCTS)
        .map(|i| ProductId::parse(format!("P{i:03}")).unwrap())
        .collect()
}

fn locations() -> Vec<LocationId> {
    (0..LOCATIONS)
        .map(|i| LocationId::parse(format!("L{i:03}")).unwrap())
        .collect()
}

/// Receipts into every location, then a chain of transfers between neighbours.
fn ledger(movement_count: usize) -> Vec<Movement> {
    let products = products();
    let locations = locations();
    let now = Utc::now();

    (0..movement_count)
        .map(|i| {
            let product = products[i % PRODUCTS].clone();
            let to = locations[i % LOCATIONS].clone();
            let draft = if i < PRODUCTS * LOCATIONS {
                MovementDraft::new(product, None, Some(to), Quantity::new(1_000).unwrap())
            } else {
                let from = locations[(i + 1) % LOCATIONS].clone();
                MovementDraft::new(product, Some(from), Some(to), Quantity::new(1).unwrap())
            };
            Movement::from_draft(MovementId::new(i as u64 + 1), draft, now)
        })
        .collect()
}

/// One aggregate pass per (product, location) pair.
fn report_by_pair(movements: &[Movement], products: &[ProductId], locations: &[LocationId]) -> Vec<StockLine> {
    let mut lines = Vec::new();
    for product in products {
        for location in locations {
            let qty = balance(movements, product, location);
            if qty > 0 {
                lines.push(StockLine {
                    product_id: product.clone(),
                    location_id: location.clone(),
                    balance: qty,
                });
            }
        }
    }
    lines
}

fn bench_stock_report(c: &mut Criterion) {
    let mut group = c.benchmark_group("stock_report");
    let products = products();
    let locations = locations();

    for movement_count in [200, 1_000, 10_000].iter() {
        let movements = ledger(*movement_count);
        group.throughput(Throughput::Elements(*movement_count as u64));

        group.bench_with_input(
            BenchmarkId::new("per_pair_recompute", movement_count),
            &movements,
            |b, movements| {
                b.iter(|| black_box(report_by_pair(movements, &products, &locations)));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("single_pass_sheet", movement_count),
            &movements,
            |b, movements| {
                b.iter(|| {
                    let sheet = BalanceSheet::from_movements(movements);
                    black_box(sheet.positive_lines(&products, &locations))
                });
            },
        );

        let sheet = BalanceSheet::from_movements(&movements);
        group.bench_with_input(
            BenchmarkId::new("maintained_sheet", movement_count),
            &sheet,
            |b, sheet| {
                b.iter(|| black_box(sheet.positive_lines(&products, &locations)));
            },
        );
    }

    group.finish();
}

fn bench_record_movement(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_movement");

    let service = StockService::new(InMemoryLedgerStore::new());
    for product in products() {
        service.register_product(product).unwrap();
    }
    for location in locations() {
        service.register_location(location).unwrap();
    }
    let product = products()[0].clone();
    let [from, to] = [locations()[0].clone(), locations()[1].clone()];
    service
        .record_movement(MovementDraft::new(
            product.clone(),
            None,
            Some(from.clone()),
            Quantity::new(i32::MAX as i64).unwrap(),
        ))
        .unwrap();

    group.throughput(Throughput::Elements(1));
    group.bench_function("validated_transfer", |b| {
        b.iter(|| {
            let draft = MovementDraft::new(
                product.clone(),
                Some(from.clone()),
                Some(to.clone()),
                Quantity::new(1).unwrap(),
            );
            black_box(service.record_movement(draft).unwrap())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_stock_report, bench_record_movement);
criterion_main!(benches);
