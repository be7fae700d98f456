//! Scenario 5 (reduced scale): build a graph, write it to disk, reopen it
//! mmapped, quantize the corpus, run an approximate search with exact
//! rerank against the mmapped graph, and check recall against brute force.

use chassis_core::{
    write_graph_to_path, AcceptOrds, Builder, BuilderParams, Graph, InMemoryVectorStore,
    OnDiskGraph, ProductQuantizer, SimilarityFunction, VectorStore,
};
use std::sync::Arc;
use tempfile::NamedTempFile;

fn pseudo_random(seed: &mut u64) -> f32 {
    *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    ((*seed >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0
}

#[test]
fn on_disk_search_matches_in_memory_top_k() {
    let dim = 16;
    let n = 400;
    let mut seed = 7u64;
    let mut store = InMemoryVectorStore::new(dim).unwrap();
    for _ in 0..n {
        let v: Vec<f32> = (0..dim).map(|_| pseudo_random(&mut seed)).collect();
        store.push(&v).unwrap();
    }

    let graph = Arc::new(Graph::new(Arc::new(store), SimilarityFunction::Euclidean, 16).unwrap());
    Builder::build_all(Arc::clone(&graph), BuilderParams { max_degree: 16, beam_width: 64, ..BuilderParams::default() }).unwrap();

    let temp = NamedTempFile::new().unwrap();
    write_graph_to_path(&graph, temp.path()).unwrap();
    let on_disk = OnDiskGraph::open(temp.path()).unwrap();

    let sim = graph.similarity();
    let query: Vec<f32> = (0..dim).map(|_| pseudo_random(&mut seed)).collect();

    let in_memory_score = {
        let g = Arc::clone(&graph);
        let q = query.clone();
        move |ord: u32| -> anyhow::Result<f32> {
            let v = g.store().vector_value(ord as usize)?;
            Ok(sim.compare(&q, v))
        }
    };
    let mut searcher = chassis_core::GraphSearcher::new(&*graph, in_memory_score, AcceptOrds::All, None);
    let in_memory_top = searcher.search(10).unwrap();

    let on_disk_score = {
        let q = query.clone();
        move |ord: u32| -> anyhow::Result<f32> {
            let v = on_disk.vector(ord)?;
            Ok(sim.compare(&q, &v))
        }
    };
    let mut on_disk_searcher = chassis_core::GraphSearcher::new(&on_disk, on_disk_score, AcceptOrds::All, None);
    let on_disk_top = on_disk_searcher.search(10).unwrap();

    let in_memory_ords: std::collections::BTreeSet<u32> = in_memory_top.nodes.iter().map(|s| s.ord).collect();
    let on_disk_ords: std::collections::BTreeSet<u32> = on_disk_top.nodes.iter().map(|s| s.ord).collect();
    assert_eq!(in_memory_ords, on_disk_ords);
}

#[test]
fn pq_approximate_search_with_rerank_recalls_well() {
    let dim = 16;
    let n = 500;
    let mut seed = 99u64;
    let mut store = InMemoryVectorStore::new(dim).unwrap();
    let mut vectors = Vec::with_capacity(n);
    for _ in 0..n {
        let v: Vec<f32> = (0..dim).map(|_| pseudo_random(&mut seed)).collect();
        store.push(&v).unwrap();
        vectors.push(v);
    }

    let graph = Arc::new(Graph::new(Arc::new(store), SimilarityFunction::Euclidean, 16).unwrap());
    Builder::build_all(Arc::clone(&graph), BuilderParams { max_degree: 16, beam_width: 80, ..BuilderParams::default() }).unwrap();

    let pq = ProductQuantizer::train(&vectors, dim / 2, false).unwrap();
    let codes: Vec<Vec<u8>> = vectors.iter().map(|v| pq.encode(v).unwrap()).collect();

    let sim = SimilarityFunction::Euclidean;
    let top_k = 10;
    let queries = 20;
    let mut total_recall = 0.0;

    for _ in 0..queries {
        let query: Vec<f32> = (0..dim).map(|_| pseudo_random(&mut seed)).collect();

        let mut brute: Vec<(u32, f32)> = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i as u32, sim.compare(&query, v)))
            .collect();
        brute.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        let truth: std::collections::HashSet<u32> = brute.iter().take(top_k).map(|(ord, _)| *ord).collect();

        let table = pq.build_adc_table(&query, sim).unwrap();
        let approx_score = {
            let codes = &codes;
            let table = &table;
            move |ord: u32| -> anyhow::Result<f32> { table.score(&codes[ord as usize]) }
        };
        let g = Arc::clone(&graph);
        let q = query.clone();
        let exact_score = move |ord: u32, _approx: f32| -> anyhow::Result<f32> {
            let v = g.store().vector_value(ord as usize)?;
            Ok(sim.compare(&q, v))
        };

        let outcome = chassis_core::search_with_rerank(&*graph, approx_score, exact_score, top_k, 4, AcceptOrds::All).unwrap();
        let found = outcome.nodes.iter().filter(|s| truth.contains(&s.ord)).count();
        total_recall += found as f32 / top_k as f32;
    }

    let macro_recall = total_recall / queries as f32;
    assert!(macro_recall > 0.6, "macro recall {macro_recall} too low");
}
