use criterion::{criterion_group, criterion_main, Criterion};
use data_pipeline::{synthetic_store, SyntheticSpec};
use fund_rank::{weekly_review, Leaderboard};
use fund_stats::StatsParams;

fn bench_leaderboard(c: &mut Criterion) {
    let store = synthetic_store(&SyntheticSpec {
        products: 200,
        weeks: 260,
        ..SyntheticSpec::default()
    })
    .unwrap();
    let params = StatsParams::default();
    let view = store.view(Some(52));
    c.bench_function("leaderboard_200x208", |b| {
        b.iter(|| Leaderboard::over_window(&view, 52, 259, None, &params))
    });
    c.bench_function("weekly_review_200", |b| {
        b.iter(|| weekly_review(&view, 259, 42))
    });
}

criterion_group!(benches, bench_leaderboard);
criterion_main!(benches);
