//! Log-domain sum-product belief-propagation decoder.
//!
//! The decoder always runs [`MAX_ITERATIONS`] rounds; it never stops early
//! on convergence, so the work per trial does not depend on the input.
//!
//! Messages are stored per edge in flat arrays indexed by the graph's edge
//! ids (`row * wr + position`), so one round touches contiguous memory:
//! - variable-to-check: `var_to_check[edge]`
//! - check-to-variable: `check_to_var[edge]`
//!
//! A decoder owns its scratch buffers and is meant to be reused across the
//! trials of one worker; every call to [`decode`](BeliefPropagationDecoder::decode)
//! starts from a fresh all-zero message state.

use crate::graph::{DecodingParameters, TannerGraph};
use crate::params::{BIG_INFINITY, CROSSOVER_ERROR, LLR_BOUND, MAX_ITERATIONS};
use crate::{ConsensusError, ConsensusResult};

/// Clamp an LLR to `[-LLR_BOUND, LLR_BOUND]`.
#[inline]
pub fn clamp_llr(x: f64) -> f64 {
    if x >= LLR_BOUND {
        LLR_BOUND
    } else if x <= -LLR_BOUND {
        -LLR_BOUND
    } else {
        x
    }
}

/// Saturating `ln((e^x + 1) / (e^x - 1))`.
///
/// The transform is its own inverse on the positive reals. Outside
/// `(1 / BIG_INFINITY, BIG_INFINITY)` it saturates to the opposite bound.
#[inline]
pub fn saturating_log_tanh(x: f64) -> f64 {
    if x >= BIG_INFINITY {
        1.0 / BIG_INFINITY
    } else if x <= 1.0 / BIG_INFINITY {
        BIG_INFINITY
    } else {
        let e = x.exp();
        ((e + 1.0) / (e - 1.0)).ln()
    }
}

/// Belief-propagation decoder bound to one Tanner graph.
#[derive(Debug, Clone)]
pub struct BeliefPropagationDecoder<'g> {
    graph: &'g TannerGraph,
    iterations: usize,
    channel: Vec<f64>,
    var_to_check: Vec<f64>,
    check_to_var: Vec<f64>,
    posterior: Vec<f64>,
}

impl<'g> BeliefPropagationDecoder<'g> {
    /// Create a decoder running [`MAX_ITERATIONS`] rounds.
    pub fn new(graph: &'g TannerGraph) -> Self {
        Self::with_iterations(graph, MAX_ITERATIONS)
    }

    /// Create a decoder with a custom round count (for testing).
    pub fn with_iterations(graph: &'g TannerGraph, iterations: usize) -> Self {
        let DecodingParameters { n, m, wr, .. } = *graph.params();
        let edges = m * wr;
        Self {
            graph,
            iterations,
            channel: vec![0.0; n],
            var_to_check: vec![0.0; edges],
            check_to_var: vec![0.0; edges],
            posterior: vec![0.0; n],
        }
    }

    /// The graph this decoder runs on.
    pub fn graph(&self) -> &'g TannerGraph {
        self.graph
    }

    /// Posterior LLRs left by the last decode.
    pub fn posterior(&self) -> &[f64] {
        &self.posterior
    }

    /// Decode a hash vector into a hard-decision output word.
    pub fn decode(&mut self, hash_vector: &[u8]) -> ConsensusResult<Vec<u8>> {
        let n = self.graph.params().n;
        if hash_vector.len() != n {
            return Err(ConsensusError::LengthMismatch {
                expected: n,
                got: hash_vector.len(),
            });
        }

        let gain = ((1.0 - CROSSOVER_ERROR) / CROSSOVER_ERROR).ln();
        for (llr, &bit) in self.channel.iter_mut().zip(hash_vector) {
            *llr = if bit != 0 { gain } else { -gain };
        }
        self.var_to_check.fill(0.0);
        self.check_to_var.fill(0.0);

        let mut output_word = vec![0u8; n];
        for _ in 0..self.iterations {
            self.update_variable_nodes();
            self.update_check_nodes();
            self.update_posterior(&mut output_word);
        }

        Ok(output_word)
    }

    fn update_variable_nodes(&mut self) {
        let graph = self.graph;
        let DecodingParameters { n, wc, .. } = *graph.params();

        for t in 0..n {
            let mut total = 0.0;
            for slot in 0..wc {
                total = clamp_llr(total + self.check_to_var[graph.edge(slot, t)]);
            }
            for slot in 0..wc {
                let edge = graph.edge(slot, t);
                let extrinsic = clamp_llr(total - self.check_to_var[edge]);
                self.var_to_check[edge] = clamp_llr(self.channel[t] + extrinsic);
            }
        }
    }

    fn update_check_nodes(&mut self) {
        let DecodingParameters { m, wr, .. } = *self.graph.params();

        for row in 0..m {
            let incoming = &self.var_to_check[row * wr..(row + 1) * wr];
            let outgoing = &mut self.check_to_var[row * wr..(row + 1) * wr];

            for (l, out) in outgoing.iter_mut().enumerate() {
                let mut magnitude = 0.0;
                let mut sign = 1.0;
                for (k, &msg) in incoming.iter().enumerate() {
                    if k == l {
                        continue;
                    }
                    magnitude += saturating_log_tanh(msg.abs());
                    if msg <= 0.0 {
                        sign = -sign;
                    }
                }
                *out = clamp_llr(sign * saturating_log_tanh(magnitude));
            }
        }
    }

    fn update_posterior(&mut self, output_word: &mut [u8]) {
        let graph = self.graph;
        let DecodingParameters { n, wc, .. } = *graph.params();

        for t in 0..n {
            let mut llr = clamp_llr(self.channel[t]);
            for slot in 0..wc {
                llr = clamp_llr(llr + self.check_to_var[graph.edge(slot, t)]);
            }
            self.posterior[t] = llr;
            output_word[t] = u8::from(llr >= 0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{is_valid, parity_holds, DifficultyTable};

    fn level0_graph(seed: i64) -> TannerGraph {
        let level = DifficultyTable::reference().level(0).unwrap();
        TannerGraph::build(DecodingParameters::with_seed(level, seed).unwrap())
    }

    #[test]
    fn test_clamp_llr() {
        assert_eq!(clamp_llr(100.0), LLR_BOUND);
        assert_eq!(clamp_llr(-100.0), -LLR_BOUND);
        assert_eq!(clamp_llr(1.5), 1.5);
        assert_eq!(clamp_llr(LLR_BOUND), LLR_BOUND);
    }

    #[test]
    fn test_log_tanh_saturation() {
        assert_eq!(saturating_log_tanh(BIG_INFINITY), 1.0 / BIG_INFINITY);
        assert_eq!(saturating_log_tanh(0.0), BIG_INFINITY);
        assert_eq!(saturating_log_tanh(1.0 / BIG_INFINITY), BIG_INFINITY);
    }

    #[test]
    fn test_log_tanh_is_self_inverse() {
        for x in [0.05, 0.5, 1.0, 2.0, 4.0, 8.0] {
            let back = saturating_log_tanh(saturating_log_tanh(x));
            assert!((back - x).abs() < 1e-9, "x={} back={}", x, back);
        }
    }

    #[test]
    fn test_zero_vector_decodes_to_zero_word() {
        let graph = level0_graph(0);
        let level = DifficultyTable::reference().level(0).unwrap();
        let mut decoder = BeliefPropagationDecoder::new(&graph);

        let output = decoder.decode(&[0u8; 32]).unwrap();
        assert!(output.iter().all(|&b| b == 0));
        assert!(parity_holds(&output, &graph));
        // Weight 0 is outside the level 0 window [10, 22].
        assert!(!is_valid(&output, &graph, level));
        assert!(decoder.posterior().iter().all(|&llr| llr < 0.0));
    }

    #[test]
    fn test_all_ones_vector_sets_every_bit() {
        // Every row of a weight-4 check is satisfied by the all-ones word.
        let graph = level0_graph(0);
        let mut decoder = BeliefPropagationDecoder::new(&graph);
        let output = decoder.decode(&[1u8; 32]).unwrap();
        assert!(output.iter().all(|&b| b == 1));
        assert!(parity_holds(&output, &graph));
    }

    #[test]
    fn test_decode_is_deterministic() {
        let graph = level0_graph(77);
        let hash_vector: Vec<u8> = (0..32).map(|i| ((i * 7 + 3) % 5 == 0) as u8).collect();

        let mut decoder = BeliefPropagationDecoder::new(&graph);
        let first = decoder.decode(&hash_vector).unwrap();
        let first_posterior = decoder.posterior().to_vec();
        let second = decoder.decode(&hash_vector).unwrap();
        assert_eq!(first, second);
        assert_eq!(first_posterior, decoder.posterior());

        let mut fresh = BeliefPropagationDecoder::new(&graph);
        assert_eq!(fresh.decode(&hash_vector).unwrap(), first);
    }

    #[test]
    fn test_reuse_does_not_leak_state() {
        let graph = level0_graph(5);
        let noisy: Vec<u8> = (0..32).map(|i| (i % 3 == 0) as u8).collect();

        let mut decoder = BeliefPropagationDecoder::new(&graph);
        decoder.decode(&noisy).unwrap();
        let after_reuse = decoder.decode(&[0u8; 32]).unwrap();

        let mut fresh = BeliefPropagationDecoder::new(&graph);
        assert_eq!(after_reuse, fresh.decode(&[0u8; 32]).unwrap());
    }

    #[test]
    fn test_posterior_is_bounded() {
        let graph = level0_graph(11);
        let hash_vector: Vec<u8> = (0..32).map(|i| (i % 2) as u8).collect();
        let mut decoder = BeliefPropagationDecoder::new(&graph);
        decoder.decode(&hash_vector).unwrap();
        assert!(decoder
            .posterior()
            .iter()
            .all(|llr| llr.abs() <= LLR_BOUND));
    }

    #[test]
    fn test_length_mismatch() {
        let graph = level0_graph(0);
        let mut decoder = BeliefPropagationDecoder::new(&graph);
        assert_eq!(
            decoder.decode(&[0u8; 31]),
            Err(ConsensusError::LengthMismatch {
                expected: 32,
                got: 31
            })
        );
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_clamp_is_bounded_and_idempotent(x in -1.0e9f64..1.0e9) {
                let clamped = clamp_llr(x);
                prop_assert!(clamped.abs() <= LLR_BOUND);
                prop_assert_eq!(clamp_llr(clamped), clamped);
            }

            #[test]
            fn prop_log_tanh_is_self_inverse(x in 0.01f64..10.0) {
                let round_trip = saturating_log_tanh(saturating_log_tanh(x));
                prop_assert!((round_trip - x).abs() <= 1.0e-6 * x.max(1.0));
            }

            #[test]
            fn prop_log_tanh_stays_in_range(x in 0.0f64..500.0) {
                let y = saturating_log_tanh(x);
                prop_assert!(y >= 0.0);
                prop_assert!(y <= BIG_INFINITY);
            }
        }
    }
}
