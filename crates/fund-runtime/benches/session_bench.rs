use criterion::{criterion_group, criterion_main, Criterion};
use data_pipeline::{synthetic_store, SyntheticSpec};
use fund_core::{ProductId, RawCommentary, SimConfig};
use fund_runtime::Session;

fn bench_play_through(c: &mut Criterion) {
    let store = synthetic_store(&SyntheticSpec {
        products: 40,
        start: chrono::NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
        weeks: 156,
        ..SyntheticSpec::default()
    })
    .unwrap();
    c.bench_function("session_play_through", |b| {
        b.iter(|| {
            let mut session =
                Session::new(store.clone(), RawCommentary::default(), SimConfig::default())
                    .unwrap();
            let mut week = 0usize;
            while !session.is_finished() {
                if session.selector_open() || week % 13 == 0 {
                    if session.open_selector().is_ok() {
                        let _ = session.select_product(ProductId(week % 40));
                    }
                }
                let _ = session.advance();
                week += 1;
            }
            session.final_summary()
        })
    });
}

criterion_group!(benches, bench_play_through);
criterion_main!(benches);
