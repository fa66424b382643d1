//! Benchmarks for keyed merge and operand list sync on CSV-sized documents.

use bundle_reconcile::image::ImageEntry;
use bundle_reconcile::merge::keyed::{keyed_merge, sync_and_filter, MergeScheme};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_yaml::{Mapping, Value};

fn image_list(count: usize, registry: &str) -> Value {
    let items = (0..count)
        .map(|i| {
            let mut item = Mapping::new();
            item.insert("name".into(), format!("RELATED_IMAGE_COMPONENT_{}", i).into());
            item.insert(
                "value".into(),
                format!("{}/rhoai/component-{}@sha256:{:064x}", registry, i, i).into(),
            );
            Value::Mapping(item)
        })
        .collect();
    Value::Sequence(items)
}

fn csv_like(count: usize, registry: &str) -> Value {
    let mut spec = Mapping::new();
    spec.insert("relatedImages".into(), image_list(count, registry));
    let mut root = Mapping::new();
    root.insert("spec".into(), Value::Mapping(spec));
    Value::Mapping(root)
}

fn bench_keyed_merge(c: &mut Criterion) {
    let scheme = MergeScheme::keyed("$.spec.relatedImages", "name").unwrap();
    let target = csv_like(150, "quay.io");
    let source = csv_like(200, "registry.redhat.io");

    c.bench_function("keyed_merge_related_images_200", |b| {
        b.iter(|| keyed_merge(black_box(&target), black_box(&source), &scheme))
    });
}

fn bench_sync_and_filter(c: &mut Criterion) {
    let authoritative: Vec<ImageEntry> = (0..200)
        .map(|i| {
            ImageEntry::new(
                format!("RELATED_IMAGE_COMPONENT_{}", i % 180),
                format!("quay.io/rhoai/component-{}@sha256:{:064x}", i, i),
            )
        })
        .collect();
    let destination = image_list(120, "registry.redhat.io");
    let exclusions = vec!["FBC".to_string(), "BUNDLE".to_string()];

    c.bench_function("sync_and_filter_operands_200", |b| {
        b.iter(|| sync_and_filter(black_box(&authoritative), black_box(&destination), &exclusions).unwrap())
    });
}

criterion_group!(benches, bench_keyed_merge, bench_sync_and_filter);
criterion_main!(benches);
