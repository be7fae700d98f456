//! Vector store abstraction: random-access provider of vector `i` → float
//! vector, either in-memory or backed by a memory-mapped file.

use crate::error::{invalid_argument, Result};
use crate::storage::Storage;
use std::path::Path;

/// Consumed vector-store contract (spec §6).
///
/// If [`is_value_shared`](VectorStore::is_value_shared) returns `true`, the
/// vector reference returned by [`vector_value`](VectorStore::vector_value)
/// is only valid until the next call on the same store instance — callers
/// that need to retain it must copy.
pub trait VectorStore: Send + Sync {
    fn size(&self) -> usize;
    fn dimension(&self) -> usize;
    fn vector_value(&self, i: usize) -> Result<&[f32]>;
    /// A detached copy of every vector currently in the store. Implementations
    /// that cannot cheaply duplicate their backing resource (e.g. a memory-mapped
    /// file handle) materialize an owned in-memory copy instead of panicking.
    fn copy(&self) -> Result<Box<dyn VectorStore>>;
    fn is_value_shared(&self) -> bool;
}

/// Flat structure-of-arrays in-memory vector store: vector `i` occupies
/// `data[i*dim..(i+1)*dim]`. One contiguous allocation, not `Vec<Vec<f32>>`,
/// so sequential scans stay cache-friendly.
#[derive(Debug, Clone)]
pub struct InMemoryVectorStore {
    dim: usize,
    data: Vec<f32>,
}

impl InMemoryVectorStore {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            invalid_argument!("vector store dimension must be > 0");
        }
        Ok(Self { dim, data: Vec::new() })
    }

    pub fn from_vectors(dim: usize, vectors: &[Vec<f32>]) -> Result<Self> {
        let mut store = Self::new(dim)?;
        for v in vectors {
            store.push(v)?;
        }
        Ok(store)
    }

    /// Append a vector, returning its assigned ordinal.
    pub fn push(&mut self, vector: &[f32]) -> Result<usize> {
        if vector.len() != self.dim {
            invalid_argument!(
                "vector dimension mismatch: expected {}, got {}",
                self.dim,
                vector.len()
            );
        }
        let ord = self.data.len() / self.dim;
        self.data.extend_from_slice(vector);
        Ok(ord)
    }
}

impl VectorStore for InMemoryVectorStore {
    fn size(&self) -> usize {
        if self.dim == 0 { 0 } else { self.data.len() / self.dim }
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn vector_value(&self, i: usize) -> Result<&[f32]> {
        if i >= self.size() {
            invalid_argument!("ordinal {} out of bounds (size {})", i, self.size());
        }
        Ok(&self.data[i * self.dim..(i + 1) * self.dim])
    }

    fn copy(&self) -> Result<Box<dyn VectorStore>> {
        Ok(Box::new(self.clone()))
    }

    fn is_value_shared(&self) -> bool {
        // Freshly allocated arrays, never invalidated by a later call.
        false
    }
}

/// Memory-mapped vector store backed by [`Storage`]. Returned slices point
/// directly into the mmap and are invalidated by the next call that grows
/// the file (e.g. an `insert`); callers must honor `is_value_shared() ==
/// true` and copy before retaining.
pub struct MmapVectorStore {
    storage: Storage,
}

impl MmapVectorStore {
    pub fn open<P: AsRef<Path>>(path: P, dimension: usize) -> Result<Self> {
        let storage = Storage::open(path, dimension as u32)?;
        Ok(Self { storage })
    }

    pub fn insert(&mut self, vector: &[f32]) -> Result<usize> {
        Ok(self.storage.insert(vector)? as usize)
    }

    pub fn commit(&mut self) -> Result<()> {
        self.storage.commit()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

impl VectorStore for MmapVectorStore {
    fn size(&self) -> usize {
        self.storage.count() as usize
    }

    fn dimension(&self) -> usize {
        self.storage.dimensions() as usize
    }

    fn vector_value(&self, i: usize) -> Result<&[f32]> {
        Ok(self.storage.get_vector_slice(i as u64)?)
    }

    /// The mmap-backed store cannot cheaply clone its file handle into an
    /// independent `Storage`, so this materializes a detached
    /// `InMemoryVectorStore` by reading every vector through
    /// [`vector_value`](VectorStore::vector_value). This store is always
    /// `is_value_shared() == true`, so the searcher never needs `copy()` to
    /// retain a vector past the next call — this path exists only to honor
    /// the trait contract for callers that do.
    fn copy(&self) -> Result<Box<dyn VectorStore>> {
        let mut store = InMemoryVectorStore::new(self.dimension())?;
        for i in 0..self.size() {
            store.push(self.vector_value(i)?)?;
        }
        Ok(Box::new(store))
    }

    fn is_value_shared(&self) -> bool {
        true
    }
}
