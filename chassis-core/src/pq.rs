//! Product quantization: per-subspace codebook training, vector encoding,
//! and asymmetric distance tables for approximate scoring (spec §4.5).
//!
//! Grounded in the corpus's `ivf_pq::ProductQuantizer` shape (flat
//! `[subspace][codeword][dim]` codebooks, `fit`/`quantize`/table-lookup
//! scoring split), generalized to the codebook size (`k=256`) and
//! combination-formula requirements this engine's similarity functions need.

use crate::error::{invalid_argument, Result};
use crate::similarity::{squared_euclidean, SimilarityFunction};
use rand::prelude::*;

/// Fixed codebook size per subspace (one byte per code).
const CODEBOOK_SIZE: usize = 256;
const MAX_ITERATIONS: usize = 25;
const CONVERGENCE_EPSILON: f32 = 1e-4;

/// A trained product quantizer: `subspaces` codebooks of up to
/// [`CODEBOOK_SIZE`] centroids each, over equal-width partitions of the
/// original dimension.
pub struct ProductQuantizer {
    dimension: usize,
    subspaces: usize,
    subspace_width: usize,
    /// `Some` when training subtracted the global centroid first; encoding
    /// and scoring both re-apply this shift.
    center: Option<Vec<f32>>,
    /// `codebooks[s]` is `codebook_size[s] * subspace_width` floats, flattened.
    codebooks: Vec<Vec<f32>>,
    codebook_size: Vec<usize>,
}

impl ProductQuantizer {
    /// Train a quantizer over `vectors`, partitioning each into `subspaces`
    /// equal-width pieces. `center` subtracts the global centroid before
    /// training and encoding.
    pub fn train(vectors: &[Vec<f32>], subspaces: usize, center: bool) -> Result<Self> {
        if vectors.is_empty() {
            invalid_argument!("cannot train a product quantizer on zero vectors");
        }
        let dimension = vectors[0].len();
        if dimension == 0 || subspaces == 0 {
            invalid_argument!("dimension and subspace count must be > 0");
        }
        if dimension % subspaces != 0 {
            invalid_argument!(
                "dimension {} is not evenly divisible by {} subspaces",
                dimension,
                subspaces
            );
        }
        for v in vectors {
            if v.len() != dimension {
                invalid_argument!("vector dimension mismatch during PQ training");
            }
        }
        let subspace_width = dimension / subspaces;

        let global_centroid = if center {
            Some(centroid_of(vectors, dimension))
        } else {
            None
        };
        let shifted: Vec<Vec<f32>> = match &global_centroid {
            Some(c) => vectors.iter().map(|v| subtract(v, c)).collect(),
            None => vectors.to_vec(),
        };

        let mut codebooks = Vec::with_capacity(subspaces);
        let mut codebook_size = Vec::with_capacity(subspaces);
        let mut rng = rand::rng();
        for s in 0..subspaces {
            let start = s * subspace_width;
            let end = start + subspace_width;
            let sub_points: Vec<Vec<f32>> = shifted.iter().map(|v| v[start..end].to_vec()).collect();
            let k = CODEBOOK_SIZE.min(sub_points.len());
            let centroids = lloyds_kmeans(&sub_points, k, subspace_width, &mut rng);
            codebook_size.push(centroids.len());
            codebooks.push(centroids.into_iter().flatten().collect());
        }

        Ok(Self {
            dimension,
            subspaces,
            subspace_width,
            center: global_centroid,
            codebooks,
            codebook_size,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn subspaces(&self) -> usize {
        self.subspaces
    }

    fn codeword(&self, subspace: usize, code: u8) -> &[f32] {
        let start = code as usize * self.subspace_width;
        &self.codebooks[subspace][start..start + self.subspace_width]
    }

    /// Encode a vector as `subspaces` codebook indices, one byte per
    /// subspace, each the nearest centroid by squared distance.
    pub fn encode(&self, v: &[f32]) -> Result<Vec<u8>> {
        if v.len() != self.dimension {
            invalid_argument!("vector dimension {} does not match quantizer dimension {}", v.len(), self.dimension);
        }
        let shifted;
        let v = if let Some(c) = &self.center {
            shifted = subtract(v, c);
            &shifted[..]
        } else {
            v
        };

        let mut codes = Vec::with_capacity(self.subspaces);
        for s in 0..self.subspaces {
            let start = s * self.subspace_width;
            let sub = &v[start..start + self.subspace_width];
            let size = self.codebook_size[s];
            let mut best_code = 0usize;
            let mut best_dist = f32::INFINITY;
            for code in 0..size {
                let d = squared_euclidean(sub, self.codeword(s, code as u8));
                if d < best_dist {
                    best_dist = d;
                    best_code = code;
                }
            }
            codes.push(best_code as u8);
        }
        Ok(codes)
    }

    /// Decode a compressed code back to a `dimension`-length vector, for
    /// testing the bounded round-trip property. Not used on the query path.
    pub fn decode(&self, codes: &[u8]) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.dimension);
        for (s, &code) in codes.iter().enumerate() {
            out.extend_from_slice(self.codeword(s, code));
        }
        if let Some(c) = &self.center {
            for (o, shift) in out.iter_mut().zip(c) {
                *o += shift;
            }
        }
        out
    }

    /// Precompute an asymmetric distance table for `query` under `sim`.
    pub fn build_adc_table(&self, query: &[f32], sim: SimilarityFunction) -> Result<AdcTable> {
        if query.len() != self.dimension {
            invalid_argument!("query dimension {} does not match quantizer dimension {}", query.len(), self.dimension);
        }
        let shifted;
        let query = if let Some(c) = &self.center {
            shifted = subtract(query, c);
            &shifted[..]
        } else {
            query
        };

        let mut dot_partials = vec![0.0_f32; self.subspaces * CODEBOOK_SIZE];
        let mut sq_dist_partials = vec![0.0_f32; self.subspaces * CODEBOOK_SIZE];
        let mut centroid_sqnorm = vec![0.0_f32; self.subspaces * CODEBOOK_SIZE];

        for s in 0..self.subspaces {
            let start = s * self.subspace_width;
            let q_sub = &query[start..start + self.subspace_width];
            for code in 0..self.codebook_size[s] {
                let centroid = self.codeword(s, code as u8);
                let idx = s * CODEBOOK_SIZE + code;
                dot_partials[idx] = crate::similarity::dot_product(q_sub, centroid);
                sq_dist_partials[idx] = squared_euclidean(q_sub, centroid);
                centroid_sqnorm[idx] = crate::similarity::dot_product(centroid, centroid);
            }
        }

        let query_norm = crate::similarity::dot_product(query, query).sqrt();

        Ok(AdcTable {
            quantizer_subspaces: self.subspaces,
            dot_partials,
            sq_dist_partials,
            centroid_sqnorm,
            query_norm,
            similarity: sim,
        })
    }
}

/// A query-specific asymmetric distance table: `subspaces x 256` partial
/// scores, reused to score every compressed corpus vector against one
/// query without touching the original float vectors.
pub struct AdcTable {
    quantizer_subspaces: usize,
    dot_partials: Vec<f32>,
    sq_dist_partials: Vec<f32>,
    centroid_sqnorm: Vec<f32>,
    query_norm: f32,
    similarity: SimilarityFunction,
}

impl AdcTable {
    /// Approximate similarity of a compressed vector against this table's
    /// query, on the same scale as [`SimilarityFunction::compare`].
    pub fn score(&self, codes: &[u8]) -> Result<f32> {
        if codes.len() != self.quantizer_subspaces {
            invalid_argument!("code length {} does not match {} subspaces", codes.len(), self.quantizer_subspaces);
        }
        Ok(match self.similarity {
            SimilarityFunction::DotProduct => {
                let sum = self.partial_sum(&self.dot_partials, codes);
                (1.0 + sum) / 2.0
            }
            SimilarityFunction::Euclidean => {
                let sum = self.partial_sum(&self.sq_dist_partials, codes);
                1.0 / (1.0 + sum)
            }
            SimilarityFunction::Cosine => {
                let dot_sum = self.partial_sum(&self.dot_partials, codes);
                let decoded_sqnorm: f32 = self.partial_sum(&self.centroid_sqnorm, codes);
                let denom = self.query_norm * decoded_sqnorm.sqrt();
                let cos = if denom > f32::EPSILON { dot_sum / denom } else { 0.0 };
                (1.0 + cos) / 2.0
            }
        })
    }

    fn partial_sum(&self, table: &[f32], codes: &[u8]) -> f32 {
        let mut total = 0.0_f32;
        for (s, &code) in codes.iter().enumerate() {
            let idx = s * CODEBOOK_SIZE + code as usize;
            total += table[idx];
        }
        total
    }

    /// Score every compressed vector in `codes` (each `subspaces` bytes),
    /// writing results into `out`.
    pub fn bulk_score(&self, codes: &[u8], out: &mut [f32]) -> Result<()> {
        if codes.len() % self.quantizer_subspaces != 0 {
            invalid_argument!("codes buffer length is not a multiple of subspace count");
        }
        let n = codes.len() / self.quantizer_subspaces;
        if out.len() != n {
            invalid_argument!("output buffer length {} does not match vector count {}", out.len(), n);
        }
        for i in 0..n {
            let start = i * self.quantizer_subspaces;
            out[i] = self.score(&codes[start..start + self.quantizer_subspaces])?;
        }
        Ok(())
    }
}

fn centroid_of(vectors: &[Vec<f32>], dim: usize) -> Vec<f32> {
    let mut c = vec![0.0_f32; dim];
    for v in vectors {
        for (a, b) in c.iter_mut().zip(v) {
            *a += b;
        }
    }
    let inv = 1.0 / vectors.len() as f32;
    for a in c.iter_mut() {
        *a *= inv;
    }
    c
}

fn subtract(v: &[f32], center: &[f32]) -> Vec<f32> {
    v.iter().zip(center).map(|(a, b)| a - b).collect()
}

/// k-means++ seeding followed by Lloyd's algorithm, bounded to
/// [`MAX_ITERATIONS`] or until centroid movement falls below
/// [`CONVERGENCE_EPSILON`].
fn lloyds_kmeans(points: &[Vec<f32>], k: usize, dim: usize, rng: &mut impl Rng) -> Vec<Vec<f32>> {
    if points.is_empty() || k == 0 {
        return Vec::new();
    }
    let mut centroids = kmeans_plus_plus_init(points, k, rng);

    for _ in 0..MAX_ITERATIONS {
        let mut sums = vec![vec![0.0_f32; dim]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];

        for p in points {
            let nearest = nearest_centroid(p, &centroids);
            counts[nearest] += 1;
            for (s, x) in sums[nearest].iter_mut().zip(p) {
                *s += x;
            }
        }

        let mut movement = 0.0_f32;
        for (i, centroid) in centroids.iter_mut().enumerate() {
            if counts[i] == 0 {
                continue;
            }
            let inv = 1.0 / counts[i] as f32;
            for (c, s) in centroid.iter_mut().zip(&sums[i]) {
                let new_val = s * inv;
                movement += (new_val - *c).powi(2);
                *c = new_val;
            }
        }
        if movement.sqrt() < CONVERGENCE_EPSILON {
            break;
        }
    }
    centroids
}

fn kmeans_plus_plus_init(points: &[Vec<f32>], k: usize, rng: &mut impl Rng) -> Vec<Vec<f32>> {
    let mut centroids = Vec::with_capacity(k);
    let first = points.choose(rng).expect("points is non-empty").clone();
    centroids.push(first);

    while centroids.len() < k {
        let weights: Vec<f32> = points
            .iter()
            .map(|p| nearest_sq_dist(p, &centroids))
            .collect();
        let total: f32 = weights.iter().sum();
        if total <= 0.0 {
            // every remaining point coincides with an existing centroid
            break;
        }
        let mut pick = rng.random::<f32>() * total;
        let mut chosen = points.len() - 1;
        for (i, w) in weights.iter().enumerate() {
            if pick <= *w {
                chosen = i;
                break;
            }
            pick -= w;
        }
        centroids.push(points[chosen].clone());
    }
    centroids
}

fn nearest_centroid(point: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_euclidean(point, c);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

fn nearest_sq_dist(point: &[f32], centroids: &[Vec<f32>]) -> f32 {
    centroids
        .iter()
        .map(|c| squared_euclidean(point, c))
        .fold(f32::INFINITY, f32::min)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clustered_vectors() -> Vec<Vec<f32>> {
        let mut v = Vec::new();
        for &(cx, cy) in &[(0.0_f32, 0.0), (10.0, 10.0), (-10.0, 10.0), (10.0, -10.0)] {
            for i in 0..20 {
                let jitter = (i as f32 % 5.0) * 0.05;
                v.push(vec![cx + jitter, cy + jitter, cx - jitter, cy - jitter]);
            }
        }
        v
    }

    #[test]
    fn train_rejects_empty_input() {
        assert!(ProductQuantizer::train(&[], 2, false).is_err());
    }

    #[test]
    fn train_rejects_indivisible_subspace_count() {
        let vectors = vec![vec![1.0, 2.0, 3.0]];
        assert!(ProductQuantizer::train(&vectors, 2, false).is_err());
    }

    #[test]
    fn encode_decode_stays_within_bounded_distance() {
        let vectors = clustered_vectors();
        let pq = ProductQuantizer::train(&vectors, 2, false).unwrap();
        for v in &vectors {
            let code = pq.encode(v).unwrap();
            let decoded = pq.decode(&code);
            let d = squared_euclidean(v, &decoded);
            // points are tightly clustered (jitter <= 0.2 per axis); a sane
            // codebook should land well within that radius.
            assert!(d < 1.0, "decoded point too far: {d}");
        }
    }

    #[test]
    fn encode_rejects_dimension_mismatch() {
        let vectors = clustered_vectors();
        let pq = ProductQuantizer::train(&vectors, 2, false).unwrap();
        assert!(pq.encode(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn adc_table_orders_codes_by_true_proximity() {
        let vectors = clustered_vectors();
        let pq = ProductQuantizer::train(&vectors, 2, false).unwrap();
        let codes: Vec<Vec<u8>> = vectors.iter().map(|v| pq.encode(v).unwrap()).collect();

        let query = vec![0.0, 0.0, 0.0, 0.0];
        let table = pq.build_adc_table(&query, SimilarityFunction::Euclidean).unwrap();

        let near_score = table.score(&codes[0]).unwrap();
        let far_score = table.score(&codes[20]).unwrap();
        assert!(near_score > far_score);
    }

    #[test]
    fn bulk_score_matches_individual_scores() {
        let vectors = clustered_vectors();
        let pq = ProductQuantizer::train(&vectors, 2, false).unwrap();
        let codes: Vec<u8> = vectors.iter().flat_map(|v| pq.encode(v).unwrap()).collect();
        let query = vec![0.0, 0.0, 0.0, 0.0];
        let table = pq.build_adc_table(&query, SimilarityFunction::DotProduct).unwrap();

        let mut out = vec![0.0; vectors.len()];
        table.bulk_score(&codes, &mut out).unwrap();
        for (i, v) in vectors.iter().enumerate() {
            let individual = table.score(&pq.encode(v).unwrap()).unwrap();
            assert!((out[i] - individual).abs() < 1e-6);
        }
    }

    #[test]
    fn centering_round_trips() {
        let vectors = clustered_vectors();
        let pq = ProductQuantizer::train(&vectors, 2, true).unwrap();
        for v in &vectors {
            let code = pq.encode(v).unwrap();
            let decoded = pq.decode(&code);
            assert!(squared_euclidean(v, &decoded) < 1.0);
        }
    }
}
