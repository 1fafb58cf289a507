//! Conformance checker benchmarks: verify the per-constraint walk stays
//! linear in the trace length.

use chrono::{DateTime, FixedOffset, TimeZone};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use declaro::{check_trace_conformance, parse_model, DeclareModel, Event, Trace, TraceLabel};
use std::collections::BTreeMap;

fn bench_model() -> DeclareModel {
    parse_model(
        "activity a\nactivity b\nExistence[a]\nResponse[a, b]\nAlternate Response[a, b]\nChain Response[a, b]\nPrecedence[a, b]\nAlternate Precedence[a, b]\nNot Chain Response[b, a]\n",
    )
}

fn stamp() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(3600)
        .expect("offset")
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("timestamp")
}

fn alternating_trace(len: usize) -> Trace {
    Trace {
        name: "bench".to_string(),
        label: TraceLabel::Positive,
        events: (0..len)
            .map(|i| Event {
                activity: if i % 2 == 0 { "a" } else { "b" }.to_string(),
                position: i + 1,
                resources: BTreeMap::new(),
                timestamp: stamp(),
            })
            .collect(),
    }
}

fn bench_checker_scaling(c: &mut Criterion) {
    let model = bench_model();
    let mut group = c.benchmark_group("checker_trace_length");
    for size in [100usize, 1_000, 10_000] {
        let trace = alternating_trace(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| check_trace_conformance(&model, &trace, false));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_checker_scaling);
criterion_main!(benches);
