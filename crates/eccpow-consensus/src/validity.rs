//! Acceptance rules for decoded words.

use crate::difficulty::DifficultyLevel;
use crate::graph::TannerGraph;

/// Number of ones in a bit vector.
pub fn hamming_weight(word: &[u8]) -> usize {
    word.iter().filter(|&&b| b != 0).count()
}

/// True when `word` satisfies every parity check of `graph`.
pub fn parity_holds(word: &[u8], graph: &TannerGraph) -> bool {
    let params = graph.params();
    if word.len() != params.n {
        return false;
    }

    (0..params.m).all(|row| {
        graph
            .check_neighbors(row)
            .map(|col| usize::from(word[col] != 0))
            .sum::<usize>()
            % 2
            == 0
    })
}

/// True when `weight` lies in the level's decision window and is a multiple
/// of its decision step.
pub fn weight_in_window(weight: usize, level: &DifficultyLevel) -> bool {
    weight >= level.decision_from
        && weight <= level.decision_to
        && weight % level.decision_step == 0
}

/// Full acceptance check: valid codeword with an accepted weight.
pub fn is_valid(word: &[u8], graph: &TannerGraph, level: &DifficultyLevel) -> bool {
    parity_holds(word, graph) && weight_in_window(hamming_weight(word), level)
}
