use chassis_core::{write_graph_to_path, Builder, BuilderParams, Graph, InMemoryVectorStore, OnDiskGraph, SimilarityFunction};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;
use tempfile::TempDir;

const DIMENSIONS: usize = 128;

fn generate_vector(seed: u64) -> Vec<f32> {
    (0..DIMENSIONS)
        .map(|i| (((seed.wrapping_mul(2654435761)) + i as u64) % 1000) as f32 / 1000.0)
        .collect()
}

fn build_and_write(n: usize, path: &std::path::Path) {
    let mut store = InMemoryVectorStore::new(DIMENSIONS).unwrap();
    for i in 0..n {
        store.push(&generate_vector(i as u64)).unwrap();
    }
    let graph = Arc::new(Graph::new(Arc::new(store), SimilarityFunction::Cosine, 16).unwrap());
    Builder::build_all(Arc::clone(&graph), BuilderParams { max_degree: 16, ..BuilderParams::default() }).unwrap();
    write_graph_to_path(&graph, path).unwrap();
}

fn bench_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("ondisk_open");
    group.sample_size(20);

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("graph.bin");
    build_and_write(5000, &path);

    group.bench_function("open_5000", |b| {
        b.iter(|| black_box(OnDiskGraph::open(&path).unwrap()));
    });
    group.finish();
}

fn bench_random_vector_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("ondisk_vector_read");

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("graph.bin");
    build_and_write(5000, &path);
    let on_disk = OnDiskGraph::open(&path).unwrap();

    group.bench_function("cold_tail_reads", |b| {
        b.iter(|| {
            for ord in (4900..4990u32).step_by(7) {
                black_box(on_disk.vector(black_box(ord)).unwrap());
            }
        });
    });
    group.finish();
}

criterion_group!(benches, bench_open, bench_random_vector_reads);
criterion_main!(benches);
