use chrono::{Duration, NaiveDate, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use lotwise_core::{LocationId, LotId, ProductUnitId, StockKey, WarehouseId};
use lotwise_engine::AllocationEngine;
use lotwise_stock::{LotSpec, StockLot};

fn seed_lots(count: usize) -> Vec<StockLot> {
    let key = StockKey::new(ProductUnitId::new(), WarehouseId::new(), LocationId::new());
    let start: NaiveDate = "2026-01-01".parse().unwrap();
    (0..count)
        .map(|i| {
            let spec = LotSpec {
                // Spread expiries so the sort has real work to do; every
                // seventh lot never expires.
                expiry_date: (i % 7 != 0).then(|| start + Duration::days((i * 13 % 365) as i64)),
                ..LotSpec::default()
            };
            StockLot::receive(
                LotId::new(),
                format!("LOT-{i:05}"),
                key,
                50,
                spec,
                Utc::now(),
            )
            .unwrap()
        })
        .collect()
}

fn bench_fefo_plan(c: &mut Criterion) {
    let today: NaiveDate = "2025-12-01".parse().unwrap();
    let mut group = c.benchmark_group("fefo_plan");
    for lot_count in [16usize, 256, 4096] {
        let lots = seed_lots(lot_count);
        // Draw through roughly half the lots.
        let quantity = (lot_count as u32) * 25;
        group.throughput(Throughput::Elements(lot_count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lot_count), &lots, |b, lots| {
            b.iter(|| {
                let plan =
                    AllocationEngine::plan(black_box(lots), black_box(quantity), today).unwrap();
                black_box(plan)
            })
        });
    }
    group.finish();
}

fn bench_availability(c: &mut Criterion) {
    let today: NaiveDate = "2025-12-01".parse().unwrap();
    let lots = seed_lots(4096);
    c.bench_function("check_availability_4096", |b| {
        b.iter(|| {
            black_box(AllocationEngine::check_availability(
                black_box(&lots),
                black_box(100_000),
                today,
            ))
        })
    });
}

criterion_group!(benches, bench_fefo_plan, bench_availability);
criterion_main!(benches);
