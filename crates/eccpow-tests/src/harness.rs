//! Test harness utilities.
//!
//! Builders for difficulty levels, tables and contexts that make otherwise
//! probabilistic outcomes deterministic.

use eccpow_consensus::{hamming_weight, DifficultyLevel, DifficultyTable, PowContext, TannerGraph};
use eccpow_mining::FixedNonces;

/// A level from the reference table.
pub fn reference_level(level: usize) -> DifficultyLevel {
    DifficultyTable::reference().levels()[level]
}

/// `base` with a different decision window.
pub fn with_window(base: DifficultyLevel, from: usize, to: usize, step: usize) -> DifficultyLevel {
    DifficultyLevel {
        decision_from: from,
        decision_to: to,
        decision_step: step,
        ..base
    }
}

/// Level 0 shape whose window only the all-zero word meets.
pub fn zero_window_level() -> DifficultyLevel {
    with_window(reference_level(0), 0, 0, 1)
}

/// Level 0 shape whose window only the all-ones word meets.
pub fn full_weight_level() -> DifficultyLevel {
    let base = reference_level(0);
    with_window(base, base.n, base.n, 1)
}

/// Level 0 shape whose window no word can meet.
pub fn unreachable_level() -> DifficultyLevel {
    let base = reference_level(0);
    with_window(base, base.n + 2, base.n + 2, 1)
}

/// Single-row table built from `level`, renumbered to 0.
pub fn single_level_table(level: DifficultyLevel) -> DifficultyTable {
    DifficultyTable::new(vec![DifficultyLevel { level: 0, ..level }])
        .expect("single level table is well formed")
}

/// Context for a reference level and an explicit seed.
pub fn reference_context(level: usize, seed: i64) -> PowContext {
    PowContext::new(reference_level(level), seed).unwrap()
}

/// Nonces `start, start + 1, ...`.
pub fn sequential_nonces(start: u64, count: u64) -> FixedNonces {
    (start..start + count).collect()
}

/// The all-ones word, a codeword of every regular graph with even row weight.
pub fn all_ones(graph: &TannerGraph) -> Vec<u8> {
    vec![1u8; graph.params().n]
}

/// A basis of the null space of H over GF(2), one codeword per free column.
///
/// Limited to codes with `n <= 128`, which covers every reference level.
pub fn null_space_basis(graph: &TannerGraph) -> Vec<Vec<u8>> {
    let params = graph.params();
    assert!(params.n <= 128, "codeword length {} above 128", params.n);

    let mut rows: Vec<u128> = (0..params.m)
        .map(|row| {
            graph
                .check_neighbors(row)
                .fold(0u128, |acc, col| acc | (1u128 << col))
        })
        .collect();

    // Reduced row echelon form.
    let mut pivots = Vec::new();
    let mut rank = 0;
    for col in 0..params.n {
        let Some(found) = (rank..rows.len()).find(|&r| (rows[r] >> col) & 1 == 1) else {
            continue;
        };
        rows.swap(rank, found);
        for r in 0..rows.len() {
            if r != rank && (rows[r] >> col) & 1 == 1 {
                rows[r] ^= rows[rank];
            }
        }
        pivots.push(col);
        rank += 1;
    }

    (0..params.n)
        .filter(|col| !pivots.contains(col))
        .map(|free| {
            let mut word = vec![0u8; params.n];
            word[free] = 1;
            for (r, &pivot) in pivots.iter().enumerate() {
                word[pivot] = ((rows[r] >> free) & 1) as u8;
            }
            word
        })
        .collect()
}

/// A codeword of H with exactly `weight` ones, if one is found among the
/// combinations of the first 20 basis vectors.
pub fn codeword_with_weight(graph: &TannerGraph, weight: usize) -> Option<Vec<u8>> {
    let basis = null_space_basis(graph);
    let used = basis.len().min(20);

    (0u32..1 << used).find_map(|mask| {
        let mut word = vec![0u8; graph.params().n];
        for (i, vector) in basis.iter().take(used).enumerate() {
            if (mask >> i) & 1 == 1 {
                word.iter_mut().zip(vector).for_each(|(w, v)| *w ^= v);
            }
        }
        (hamming_weight(&word) == weight).then_some(word)
    })
}
