//! Benchmarks for the deserialization hot path.
//!
//! Run with: cargo bench -p rehydrate-core -- deserialize

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value as JsonValue};

use rehydrate_core::{
    AttributeDescriptor, ComponentClass, DeserializeOptions, Deserializer, ValueType,
};

fn movie_class() -> Arc<ComponentClass> {
    ComponentClass::builder("Movie")
        .attribute(AttributeDescriptor::new("title", ValueType::string()))
        .attribute(AttributeDescriptor::new("year", ValueType::number()))
        .attribute(AttributeDescriptor::new("tags", ValueType::array(ValueType::string())))
        .attribute(AttributeDescriptor::new("metadata", ValueType::object().optional()))
        .build()
}

fn catalog(count: u64) -> JsonValue {
    JsonValue::Array(
        (0..count)
            .map(|i| {
                json!({
                    "__component": "Movie",
                    "title": format!("Movie {i}"),
                    "year": 1950 + i % 70,
                    "tags": ["drama", "classic"],
                    "metadata": {"rank": i}
                })
            })
            .collect(),
    )
}

fn bench_components(c: &mut Criterion) {
    let mut group = c.benchmark_group("deserialize/components");
    let deserializer = Deserializer::new(DeserializeOptions::new().known_component(movie_class()));

    for count in [10, 100, 1_000] {
        group.throughput(Throughput::Elements(count));
        let payload = catalog(count);

        group.bench_with_input(BenchmarkId::from_parameter(count), &payload, |b, payload| {
            b.iter(|| {
                let value = deserializer.deserialize(black_box(payload.clone()));
                black_box(value.ready())
            })
        });
    }

    group.finish();
}

fn bench_functions(c: &mut Criterion) {
    let deserializer = Deserializer::new(DeserializeOptions::new().deserialize_functions(true));
    let payload = json!({
        "__function": "(movie) => movie.title + ' (' + movie.year + ')'",
        "__context": {"separator": " - "}
    });

    c.bench_function("deserialize/function", |b| {
        b.iter(|| black_box(deserializer.deserialize(black_box(payload.clone())).ready()))
    });
}

criterion_group!(benches, bench_components, bench_functions);
criterion_main!(benches);
