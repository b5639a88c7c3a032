use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pos_backoffice::entities::order::{OrderType, PaymentMethod};
use pos_backoffice::services::pricing::{compute_totals, AppliedDiscount, PricedLine, PricingPolicy};
use pos_backoffice::services::stock::{merge_quantities, plan_stock_changes, StockLine};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn lines(count: usize) -> Vec<PricedLine> {
    (0..count)
        .map(|i| PricedLine::new((i % 4) as i32 + 1, dec!(349.50) + Decimal::from(i as i64)))
        .collect()
}

fn order_totals_benchmark(c: &mut Criterion) {
    let policy = PricingPolicy::default();
    let discount = AppliedDiscount::percentage(dec!(12.5));
    let mut group = c.benchmark_group("order_totals");

    for size in [1, 5, 20, 100].iter() {
        let order_lines = lines(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &order_lines, |b, order_lines| {
            b.iter(|| {
                compute_totals(
                    black_box(order_lines),
                    Some(&discount),
                    PaymentMethod::Card,
                    OrderType::DineIn,
                    &policy,
                )
            });
        });
    }

    group.finish();
}

fn stock_planning_benchmark(c: &mut Criterion) {
    let stock_lines: Vec<StockLine> = (0..50)
        .map(|i| StockLine {
            product_id: Uuid::new_v4(),
            name: format!("Item {}", i),
            running_item: i % 5 == 0,
            available: 100,
            old_quantity: i % 3,
            new_quantity: i % 7,
        })
        .collect();

    c.bench_function("plan_stock_changes", |b| {
        b.iter(|| plan_stock_changes(black_box(&stock_lines)))
    });

    let ids: Vec<Uuid> = (0..10).map(|_| Uuid::new_v4()).collect();
    c.bench_function("merge_quantities", |b| {
        b.iter(|| merge_quantities(black_box(ids.iter().cycle().take(200).map(|id| (*id, 2)))))
    });
}

criterion_group!(benches, order_totals_benchmark, stock_planning_benchmark);
criterion_main!(benches);
