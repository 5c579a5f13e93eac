//! Exact nearest-neighbor index over unit vectors.
//!
//! Vectors are kept in one row-major matrix and compared by squared Euclidean
//! distance. For unit vectors `D = 2 - 2·cos`, so the reported similarity is
//! `1 - D/2`, which is the cosine similarity.

use crate::error::{MemoryError, Result};

/// Cosine similarity of two unit vectors given their squared L2 distance.
pub fn similarity_from_distance(distance: f32) -> f32 {
    1.0 - distance / 2.0
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Flat brute-force index. Rows are numbered in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dims: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            data: Vec::new(),
        }
    }

    /// Rebuild from a row-major matrix of `data.len() / dims` rows.
    pub fn from_matrix(dims: usize, data: Vec<f32>) -> Result<Self> {
        if dims == 0 || data.len() % dims != 0 {
            return Err(MemoryError::Corrupt(format!(
                "matrix of {} floats is not a whole number of {dims}-dim rows",
                data.len()
            )));
        }
        Ok(Self { dims, data })
    }

    pub fn dimensions(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dims.max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_matrix(&self) -> &[f32] {
        &self.data
    }

    pub fn row(&self, row: usize) -> Option<&[f32]> {
        let start = row.checked_mul(self.dims)?;
        self.data.get(start..start + self.dims)
    }

    pub fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dims {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Append a vector; returns its row number.
    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        self.check_dimensions(vector)?;
        let row = self.len();
        self.data.extend_from_slice(vector);
        Ok(row)
    }

    /// Up to `k` `(row, squared distance)` pairs, nearest first. Ties keep row order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        self.check_dimensions(query)?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dims)
            .enumerate()
            .map(|(row, v)| (row, squared_l2(query, v)))
            .collect();

        let by_distance =
            |a: &(usize, f32), b: &(usize, f32)| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0));
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_distance);
            scored.truncate(k);
        }
        scored.sort_unstable_by(by_distance);
        Ok(scored)
    }

    /// Keep only rows for which `keep[row]` is true, preserving order.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        let dims = self.dims;
        let mut compacted = Vec::with_capacity(self.data.len());
        for (row, v) in self.data.chunks_exact(dims).enumerate() {
            if keep.get(row).copied().unwrap_or(false) {
                compacted.extend_from_slice(v);
            }
        }
        self.data = compacted;
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn unit(angle: f32) -> Vec<f32> {
        vec![angle.cos(), angle.sin()]
    }

    #[test]
    fn empty_index_returns_nothing() {
        let idx = VectorIndex::new(2);
        assert!(idx.search(&unit(0.0), 5).unwrap().is_empty());
    }

    #[test]
    fn returns_all_when_fewer_than_k() {
        let mut idx = VectorIndex::new(2);
        idx.add(&unit(0.0)).unwrap();
        idx.add(&unit(1.0)).unwrap();
        let hits = idx.search(&unit(0.0), 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, 0);
    }

    #[test]
    fn nearest_first() {
        let mut idx = VectorIndex::new(2);
        for a in [1.5_f32, 0.1, 0.8, 3.0] {
            idx.add(&unit(a)).unwrap();
        }
        let rows: Vec<usize> = idx
            .search(&unit(0.0), 3)
            .unwrap()
            .into_iter()
            .map(|(r, _)| r)
            .collect();
        assert_eq!(rows, vec![1, 2, 0]);
    }

    #[test]
    fn identical_vector_has_similarity_one() {
        let mut idx = VectorIndex::new(2);
        idx.add(&unit(0.7)).unwrap();
        let (_, d) = idx.search(&unit(0.7), 1).unwrap()[0];
        assert_eq!(d, 0.0);
        assert_eq!(similarity_from_distance(d), 1.0);
    }

    #[test]
    fn similarity_is_cosine_and_decreases_with_distance() {
        let q = unit(0.0);
        let mut last = f32::INFINITY;
        for step in 0..=8 {
            let angle = step as f32 * std::f32::consts::PI / 8.0;
            let sim = similarity_from_distance(squared_l2(&q, &unit(angle)));
            assert!((sim - angle.cos()).abs() < 1e-5, "angle {angle}");
            assert!(sim < last);
            last = sim;
        }
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut idx = VectorIndex::new(3);
        assert!(matches!(
            idx.add(&[1.0, 0.0]),
            Err(MemoryError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert!(idx.is_empty());
    }

    #[test]
    fn retain_rows_compacts_in_order() {
        let mut idx = VectorIndex::new(1);
        for v in [1.0, 2.0, 3.0, 4.0] {
            idx.add(&[v]).unwrap();
        }
        idx.retain_rows(&[true, false, true, false]);
        assert_eq!(idx.as_matrix(), &[1.0, 3.0]);
        assert_eq!(idx.len(), 2);
    }

    #[test]
    fn from_matrix_rejects_ragged_data() {
        assert!(VectorIndex::from_matrix(3, vec![0.0; 7]).is_err());
        assert_eq!(VectorIndex::from_matrix(3, vec![0.0; 6]).unwrap().len(), 2);
    }
}
