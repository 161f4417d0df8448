use criterion::{
    black_box, criterion_group, criterion_main, AxisScale, BenchmarkId, Criterion,
    PlotConfiguration,
};
use traffic_signal_sim::control_system::decide;
use traffic_signal_sim::shared_data::{DirectionId, WorkerResult};

/// Builds `rounds` worth of results; every 7th round carries an emergency on the
/// last direction so both decision paths are exercised.
fn generate_rounds(rounds: usize) -> Vec<Vec<WorkerResult>> {
    (0..rounds)
        .map(|r| {
            DirectionId::ALL
                .iter()
                .enumerate()
                .map(|(i, d)| WorkerResult {
                    vehicle_count: ((r * 31 + i * 17) % 25) as u32,
                    emergency_present: r % 7 == 0 && i == 3,
                    completed: true,
                    ..WorkerResult::new(*d)
                })
                .collect()
        })
        .collect()
}

fn bench_decide(c: &mut Criterion) {
    let batch_sizes = [100, 1_000, 10_000];

    let mut group = c.benchmark_group("Decision_Policy_Benchmarks");
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for &batch in batch_sizes.iter() {
        let rounds = generate_rounds(batch);
        group.bench_with_input(BenchmarkId::new("decide", batch), &batch, |b, &_batch| {
            b.iter(|| {
                for results in &rounds {
                    black_box(decide(black_box(results)));
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decide);
criterion_main!(benches);
