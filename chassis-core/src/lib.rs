//! Chassis - Embeddable approximate nearest neighbor vector search engine
//!
//! Chassis builds a Vamana-style navigable small-world graph over a corpus
//! of vectors, incrementally and concurrently, and searches it with a
//! resumable best-first traversal. It's built in Rust and runs anywhere
//! from a Raspberry Pi to a data center.
//!
//! # Features
//!
//! - Incremental graph construction with RobustPrune diversity edge
//!   selection, parallelized with `rayon`
//! - Resumable greedy best-first search (`search`/`resume`/`reset`)
//! - Euclidean, dot-product, and cosine similarity, each normalized to a
//!   "higher is closer" score, with AVX2/NEON/scalar SIMD kernels
//! - Optional product-quantization side index for approximate scoring with
//!   exact rerank
//! - A page-aligned, memory-mapped on-disk vector store with explicit
//!   durability control via `commit()`, and a self-contained on-disk graph
//!   format with an LRU warm-node cache
//!
//! # Example
//!
//! ```no_run
//! use chassis_core::{Builder, BuilderParams, Graph, InMemoryVectorStore, SimilarityFunction};
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut store = InMemoryVectorStore::new(128)?;
//! store.push(&vec![0.1; 128])?;
//! store.push(&vec![0.2; 128])?;
//!
//! let graph = Arc::new(Graph::new(Arc::new(store), SimilarityFunction::Cosine, 32)?);
//! Builder::build_all(Arc::clone(&graph), BuilderParams::default())?;
//! # Ok(())
//! # }
//! ```
//!
//! # Design Philosophy
//!
//! Chassis is intentionally simple and focused. It does not aim to be:
//! - A database server
//! - A cloud service
//! - A distributed system
//! - A full query engine with filtering DSLs or query planning
//!
//! These concerns are left to the application layer. Chassis is a search
//! primitive, like SQLite for relational data.

mod bitset;
mod builder;
mod error;
mod graph;
mod header;
mod neighbor_set;
mod node_queue;
mod ondisk;
mod pq;
mod searcher;
mod similarity;
mod storage;
mod vector_store;

pub use bitset::{AcceptOrds, FixedBitSet};
pub use builder::{Builder, BuilderParams};
pub use error::{ChassisError, Result};
pub use graph::{Graph, GraphView};
pub use header::{Header, HEADER_SIZE, MAGIC, VERSION};
pub use neighbor_set::{robust_prune, NeighborSet};
pub use node_queue::{BoundedMaxHeap, Scored};
pub use ondisk::{record_len, write_graph, write_graph_to_path, OnDiskGraph, HEADER_LEN as GRAPH_HEADER_LEN};
pub use pq::{AdcTable, ProductQuantizer};
pub use searcher::{search_with_rerank, GraphSearcher, ScoreFn, SearchOutcome};
pub use similarity::{cosine, dot_product, squared_euclidean, SimilarityFunction};
pub use storage::Storage;
pub use vector_store::{InMemoryVectorStore, MmapVectorStore, VectorStore};
