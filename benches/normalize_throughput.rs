//! Normalizer throughput benchmark.
//!
//! Measures `normalize::parse` across the three extraction strategies and a
//! growing number of highlighted areas using Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cropwatch_core::normalize;
use serde_json::json;

fn body(areas: usize) -> String {
    let highlighted: Vec<_> = (0..areas)
        .map(|i| {
            let offset = (i % 7) as f64 * 0.1;
            json!({
                "label": format!("lesion {}", i),
                "severity": "moderate",
                "boundingBox": {"x": 0.15 + offset, "y": 0.2, "width": 0.08, "height": 0.06}
            })
        })
        .collect();
    json!({
        "plantIdentification": {"name": "Tomato", "confidence": 91},
        "diseases": [{"name": "Early Blight", "confidence": 0.77}],
        "highlightedAreas": highlighted,
        "symptoms": ["concentric rings", "yellow halo"],
        "severity": "medium",
        "toolCallsPlan": [{"toolName": "weather_forecast", "parameters": "{\"latitude\": 41.9, \"longitude\": 12.5}"}]
    })
    .to_string()
}

fn bench_strategies(c: &mut Criterion) {
    let raw = body(4);
    let inputs = [
        ("direct", raw.clone()),
        ("fenced", format!("Here you go:\n```json\n{}\n```\n", raw)),
        ("brace_span", format!("My assessment follows. {} Hope that helps!", raw)),
    ];

    let mut group = c.benchmark_group("parse_strategy");
    for (name, input) in &inputs {
        group.bench_with_input(BenchmarkId::from_parameter(name), input, |b, input| {
            b.iter(|| normalize::parse(black_box(input)))
        });
    }
    group.finish();
}

fn bench_area_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_areas");
    for &areas in &[0usize, 8, 64, 256] {
        let raw = body(areas);
        group.bench_with_input(BenchmarkId::from_parameter(areas), &raw, |b, raw| {
            b.iter(|| normalize::parse(black_box(raw)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_strategies, bench_area_count);
criterion_main!(benches);
