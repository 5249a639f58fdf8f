//! Tanner graph construction.
//!
//! The parity-check matrix H is an `m x n` regular LDPC matrix with `wr`
//! ones per row and `wc` ones per column. Rows are split into `wc` groups of
//! `m / wc` rows. Group 0 is block diagonal; every further group places each
//! column in exactly one of its rows following a seeded permutation.
//!
//! Every validator must derive the same H from the same parent hash, so the
//! construction (including the permutation generator) is part of consensus.

use crate::difficulty::DifficultyLevel;
use crate::{ConsensusError, ConsensusResult};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

/// Shape of the code and the graph seed for one header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodingParameters {
    /// Codeword length (variable nodes).
    pub n: usize,
    /// Number of check equations (check nodes).
    pub m: usize,
    /// Column weight.
    pub wc: usize,
    /// Row weight.
    pub wr: usize,
    /// Permutation seed.
    pub seed: i64,
}

impl DecodingParameters {
    /// Parameters with an explicit shape, checked for regularity.
    pub fn new(n: usize, wc: usize, wr: usize, seed: i64) -> ConsensusResult<Self> {
        if n == 0 || wc == 0 || wr == 0 || n % wr != 0 || wc >= wr {
            return Err(ConsensusError::MalformedTable(format!(
                "cannot build a regular code with n={}, wc={}, wr={}",
                n, wc, wr
            )));
        }
        Ok(Self {
            n,
            m: n * wc / wr,
            wc,
            wr,
            seed,
        })
    }

    /// Parameters for a difficulty level and a parent hash.
    pub fn for_level(level: &DifficultyLevel, parent_hash: &[u8]) -> ConsensusResult<Self> {
        Self::with_seed(level, seed_from_parent_hash(parent_hash))
    }

    /// Parameters for a difficulty level with an explicit seed.
    pub fn with_seed(level: &DifficultyLevel, seed: i64) -> ConsensusResult<Self> {
        Self::new(level.n, level.wc, level.wr, seed)
    }

    /// Rows per row group.
    pub fn rows_per_group(&self) -> usize {
        self.m / self.wc
    }
}

/// Graph seed: the sum of the parent hash bytes.
pub fn seed_from_parent_hash(parent_hash: &[u8]) -> i64 {
    parent_hash.iter().map(|&b| i64::from(b)).sum()
}

/// Parity-check matrix with its message-passing adjacency.
///
/// All tables are flat and row-major:
/// - `h[row * n + col]`
/// - `col_in_row[slot * m + row]`: the `slot`-th column of `row`
/// - `row_in_col[slot * n + col]`: the row of group `slot` holding `col`
/// - `edge_of_var[slot * n + col]`: flat edge id `row * wr + position`,
///   where `position` is the column's slot inside `row`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TannerGraph {
    params: DecodingParameters,
    h: Vec<u8>,
    col_in_row: Vec<usize>,
    row_in_col: Vec<usize>,
    edge_of_var: Vec<usize>,
}

impl TannerGraph {
    /// Build H and its adjacency from the parameters.
    pub fn build(params: DecodingParameters) -> Self {
        let DecodingParameters { n, m, wc, wr, .. } = params;
        let group_rows = params.rows_per_group();

        let mut h = vec![0u8; m * n];

        for row in 0..group_rows {
            h[row * n + row * wr..row * n + (row + 1) * wr].fill(1);
        }

        let mut group_seed = params.seed;
        for group in 1..wc {
            let mut col_order: Vec<usize> = (0..n).collect();
            let mut rng = ChaCha8Rng::seed_from_u64(group_seed as u64);
            col_order.shuffle(&mut rng);
            group_seed -= 1;

            for (col, &position) in col_order.iter().enumerate() {
                let row = position / wr + group * group_rows;
                h[row * n + col] = 1;
            }
        }

        let mut col_in_row = vec![0usize; wr * m];
        let mut row_in_col = vec![0usize; wc * n];
        let mut edge_of_var = vec![0usize; wc * n];

        let mut edge = 0usize;
        for row in 0..m {
            for col in 0..n {
                if h[row * n + col] == 1 {
                    let position = edge % wr;
                    let group = edge / n;
                    col_in_row[position * m + row] = col;
                    row_in_col[group * n + col] = row;
                    edge_of_var[group * n + col] = row * wr + position;
                    edge += 1;
                }
            }
        }

        trace!(n, m, wc, wr, seed = params.seed, edges = edge, "Built Tanner graph");

        Self {
            params,
            h,
            col_in_row,
            row_in_col,
            edge_of_var,
        }
    }

    /// Parameters the graph was built from.
    pub fn params(&self) -> &DecodingParameters {
        &self.params
    }

    /// Entry `H[row][col]`.
    pub fn get(&self, row: usize, col: usize) -> bool {
        self.h[row * self.params.n + col] == 1
    }

    /// Row `row` of H.
    pub fn row(&self, row: usize) -> &[u8] {
        let n = self.params.n;
        &self.h[row * n..(row + 1) * n]
    }

    /// The `slot`-th variable node of check `row`, in construction order.
    #[inline]
    pub fn col_in_row(&self, slot: usize, row: usize) -> usize {
        self.col_in_row[slot * self.params.m + row]
    }

    /// The check node of group `slot` attached to variable `col`.
    #[inline]
    pub fn row_in_col(&self, slot: usize, col: usize) -> usize {
        self.row_in_col[slot * self.params.n + col]
    }

    /// Flat edge id of variable `col`'s `slot`-th edge.
    #[inline]
    pub(crate) fn edge(&self, slot: usize, col: usize) -> usize {
        self.edge_of_var[slot * self.params.n + col]
    }

    /// Variable nodes of check `row`.
    pub fn check_neighbors(&self, row: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.params.wr).map(move |slot| self.col_in_row(slot, row))
    }

    /// Check nodes of variable `col`.
    pub fn variable_neighbors(&self, col: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.params.wc).map(move |slot| self.row_in_col(slot, col))
    }

    /// True when every row has `wr` ones and every column `wc` ones.
    pub fn is_regular(&self) -> bool {
        let DecodingParameters { n, m, wc, wr, .. } = self.params;

        let rows_ok = (0..m).all(|row| self.row(row).iter().filter(|&&b| b == 1).count() == wr);
        let cols_ok =
            (0..n).all(|col| (0..m).filter(|&row| self.get(row, col)).count() == wc);

        rows_ok && cols_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DifficultyTable;

    fn level0_params(seed: i64) -> DecodingParameters {
        let level = DifficultyTable::reference().level(0).unwrap();
        DecodingParameters::with_seed(level, seed).unwrap()
    }

    #[test]
    fn test_parameters_from_level() {
        let params = level0_params(0);
        assert_eq!((params.n, params.m, params.wc, params.wr), (32, 24, 3, 4));
        assert_eq!(params.rows_per_group(), 8);
    }

    #[test]
    fn test_seed_from_parent_hash() {
        assert_eq!(seed_from_parent_hash(&[0u8; 32]), 0);
        assert_eq!(seed_from_parent_hash(&[0xff; 32]), 255 * 32);
        assert_eq!(seed_from_parent_hash(&[1, 2, 3]), 6);
    }

    #[test]
    fn test_invalid_shapes() {
        assert!(DecodingParameters::new(30, 3, 4, 0).is_err());
        assert!(DecodingParameters::new(32, 4, 4, 0).is_err());
        assert!(DecodingParameters::new(0, 3, 4, 0).is_err());
        assert_eq!(DecodingParameters::new(48, 3, 6, 7).unwrap().m, 24);
    }

    #[test]
    fn test_level_with_zero_row_weight() {
        let level = DifficultyLevel {
            wr: 0,
            ..*DifficultyTable::reference().level(0).unwrap()
        };
        assert!(matches!(
            DecodingParameters::with_seed(&level, 0),
            Err(ConsensusError::MalformedTable(_))
        ));
        assert!(DecodingParameters::for_level(&level, &[1u8; 32]).is_err());
    }

    #[test]
    fn test_block_diagonal_first_group() {
        let graph = TannerGraph::build(level0_params(0));
        for row in 0..8 {
            for col in 0..32 {
                assert_eq!(graph.get(row, col), col / 4 == row, "H[{}][{}]", row, col);
            }
        }
    }

    #[test]
    fn test_graph_is_regular_for_every_level() {
        for level in DifficultyTable::reference().levels() {
            for seed in [0, 1, 4080, -3] {
                let graph = TannerGraph::build(DecodingParameters::with_seed(level, seed).unwrap());
                assert!(graph.is_regular(), "level {} seed {}", level.level, seed);
            }
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = TannerGraph::build(level0_params(1234));
        let b = TannerGraph::build(level0_params(1234));
        assert_eq!(a, b);

        let c = TannerGraph::build(level0_params(1235));
        assert_ne!(a.h, c.h);
    }

    #[test]
    fn test_adjacency_matches_matrix() {
        let graph = TannerGraph::build(level0_params(99));
        let DecodingParameters { n, m, wc, wr, .. } = *graph.params();

        for row in 0..m {
            let cols: Vec<usize> = graph.check_neighbors(row).collect();
            assert_eq!(cols.len(), wr);
            assert!(cols.windows(2).all(|w| w[0] < w[1]), "scan order");
            assert!(cols.iter().all(|&col| graph.get(row, col)));
        }

        for col in 0..n {
            for slot in 0..wc {
                let row = graph.row_in_col(slot, col);
                assert!(graph.get(row, col));
                assert_eq!(row / graph.params().rows_per_group(), slot);

                let edge = graph.edge(slot, col);
                assert_eq!(edge / wr, row);
                assert_eq!(graph.col_in_row(edge % wr, row), col);
            }
        }
    }
}
