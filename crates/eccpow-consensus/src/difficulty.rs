//! Difficulty levels and nearest-level selection.
//!
//! Every level fixes the shape of the LDPC code (`n`, `wc`, `wr`) and the
//! Hamming-weight window a decoded word must fall in. A difficulty value is
//! turned into an implied per-trial success probability (`1 / difficulty`)
//! and matched against the `mining_probability` column.

use crate::{ConsensusError, ConsensusResult};
use num_bigint::BigUint;
use num_traits::{FromPrimitive, ToPrimitive, Zero};
use once_cell::sync::Lazy;
use tracing::trace;

/// One row of the difficulty table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyLevel {
    /// Level number (row index).
    pub level: usize,
    /// Codeword length.
    pub n: usize,
    /// Column weight (ones per column of H).
    pub wc: usize,
    /// Row weight (ones per row of H).
    pub wr: usize,
    /// Smallest accepted Hamming weight.
    pub decision_from: usize,
    /// Largest accepted Hamming weight.
    pub decision_to: usize,
    /// Accepted weights must be a multiple of this.
    pub decision_step: usize,
    /// Channel probability the level was tuned with. Informational only.
    pub channel_probability: f32,
    /// Probability that a single trial is accepted.
    pub mining_probability: f64,
}

impl DifficultyLevel {
    #[allow(clippy::too_many_arguments)]
    const fn row(
        level: usize,
        n: usize,
        wc: usize,
        wr: usize,
        decision_from: usize,
        decision_to: usize,
        decision_step: usize,
        channel_probability: f32,
        mining_probability: f64,
    ) -> Self {
        Self {
            level,
            n,
            wc,
            wr,
            decision_from,
            decision_to,
            decision_step,
            channel_probability,
            mining_probability,
        }
    }

    /// Number of check equations, `m = n * wc / wr`. Zero when `wr` is zero.
    pub fn check_nodes(&self) -> usize {
        (self.n * self.wc).checked_div(self.wr).unwrap_or(0)
    }

    fn validate(&self, index: usize) -> ConsensusResult<()> {
        if self.level != index {
            return Err(ConsensusError::MalformedTable(format!(
                "level {}: level numbers must run 0, 1, 2, ... in table order",
                index
            )));
        }
        self.validate_shape()
    }

    /// Check the code shape, decision window and probability of a single
    /// level, independent of its position in a table.
    pub fn validate_shape(&self) -> ConsensusResult<()> {
        let fail = |reason: &str| {
            Err(ConsensusError::MalformedTable(format!(
                "level {}: {}",
                self.level, reason
            )))
        };

        if self.n == 0 || self.wc == 0 || self.wr == 0 {
            return fail("code dimensions must be positive");
        }
        if self.n % self.wr != 0 {
            return fail("n must be a multiple of wr");
        }
        if self.wc >= self.wr {
            return fail("wc must be smaller than wr");
        }
        if self.decision_step == 0 {
            return fail("decision step must be positive");
        }
        if self.decision_from > self.decision_to {
            return fail("empty decision window");
        }
        if !(self.mining_probability > 0.0 && self.mining_probability <= 1.0) {
            return fail("mining probability must lie in (0, 1]");
        }
        Ok(())
    }
}

/// Reference difficulty levels.
const REFERENCE_LEVELS: [DifficultyLevel; 11] = [
    DifficultyLevel::row(0, 32, 3, 4, 10, 22, 2, 0.329111, 3.077970e-05),
    DifficultyLevel::row(1, 32, 3, 4, 10, 22, 2, 0.329111, 3.077970e-05),
    DifficultyLevel::row(2, 32, 3, 4, 10, 16, 2, 0.329111, 2.023220e-05),
    DifficultyLevel::row(3, 32, 3, 4, 16, 16, 1, 0.329111, 9.684650e-06),
    DifficultyLevel::row(4, 32, 3, 4, 14, 14, 1, 0.329111, 6.784080e-06),
    DifficultyLevel::row(5, 36, 3, 4, 12, 24, 2, 0.329111, 4.830240e-06),
    DifficultyLevel::row(6, 36, 3, 4, 12, 18, 2, 0.369449, 3.125970e-06),
    DifficultyLevel::row(7, 32, 3, 4, 12, 12, 1, 0.369449, 2.862890e-06),
    DifficultyLevel::row(8, 44, 3, 4, 14, 30, 2, 0.369449, 1.637790e-06),
    DifficultyLevel::row(9, 36, 3, 4, 18, 18, 1, 0.369449, 1.421700e-06),
    DifficultyLevel::row(10, 36, 3, 4, 16, 16, 1, 0.369449, 1.051350e-06),
];

static REFERENCE_TABLE: Lazy<DifficultyTable> = Lazy::new(|| DifficultyTable {
    levels: REFERENCE_LEVELS.to_vec(),
});

/// Immutable difficulty table, ordered by level.
///
/// The `mining_probability` column must be non-increasing. Level selection
/// relies on that ordering to stop at the first row whose distance grows,
/// and does not re-check it.
#[derive(Debug, Clone, PartialEq)]
pub struct DifficultyTable {
    levels: Vec<DifficultyLevel>,
}

impl DifficultyTable {
    /// Build a table from levels loaded elsewhere, checking its invariants.
    pub fn new(levels: Vec<DifficultyLevel>) -> ConsensusResult<Self> {
        if levels.is_empty() {
            return Err(ConsensusError::MalformedTable("table is empty".into()));
        }

        for (index, level) in levels.iter().enumerate() {
            level.validate(index)?;
        }

        if let Some(pair) = levels
            .windows(2)
            .find(|pair| pair[1].mining_probability > pair[0].mining_probability)
        {
            return Err(ConsensusError::MalformedTable(format!(
                "mining probability increases from level {} to level {}",
                pair[0].level, pair[1].level
            )));
        }

        Ok(Self { levels })
    }

    /// The reference table shared by the whole process.
    pub fn reference() -> &'static DifficultyTable {
        &REFERENCE_TABLE
    }

    /// All levels in order.
    pub fn levels(&self) -> &[DifficultyLevel] {
        &self.levels
    }

    /// Number of levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Always false for a constructed table.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Look up a level by number.
    pub fn level(&self, level: usize) -> ConsensusResult<&DifficultyLevel> {
        self.levels.get(level).ok_or_else(|| {
            ConsensusError::MalformedTable(format!(
                "level {} not found in a table of {} levels",
                level,
                self.levels.len()
            ))
        })
    }

    /// Select the level whose mining probability is nearest to `1 / difficulty`.
    ///
    /// Rows are scanned in order with a running best distance starting at 1.
    /// A row becomes the selection while its distance does not exceed the
    /// best so far; the first row that is further away ends the scan. Equal
    /// distances in a contiguous run therefore resolve to the last row of
    /// the run.
    pub fn select_level(&self, difficulty: &BigUint) -> ConsensusResult<&DifficultyLevel> {
        let probability = difficulty_to_probability(difficulty)?;

        let mut selected = &self.levels[0];
        let mut distance = 1.0_f64;
        for level in &self.levels {
            let current = (probability - level.mining_probability).abs();
            if current <= distance {
                selected = level;
                distance = current;
            } else {
                break;
            }
        }

        trace!(
            level = selected.level,
            probability,
            distance,
            "Selected difficulty level"
        );
        Ok(selected)
    }
}

/// Convert a difficulty to the implied per-trial success probability.
pub fn difficulty_to_probability(difficulty: &BigUint) -> ConsensusResult<f64> {
    if difficulty.is_zero() {
        return Err(ConsensusError::InvalidDifficulty(
            "difficulty must be positive".into(),
        ));
    }

    let value = difficulty
        .to_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            ConsensusError::InvalidDifficulty(format!(
                "difficulty of {} bits is not representable",
                difficulty.bits()
            ))
        })?;

    Ok(1.0 / value)
}

/// Convert a mining probability back to a difficulty, truncating `1 / p`.
pub fn prob_to_difficulty(mining_probability: f64) -> ConsensusResult<BigUint> {
    if !(mining_probability > 0.0 && mining_probability <= 1.0) {
        return Err(ConsensusError::InvalidDifficulty(format!(
            "mining probability {} outside (0, 1]",
            mining_probability
        )));
    }

    BigUint::from_f64((1.0 / mining_probability).trunc()).ok_or_else(|| {
        ConsensusError::InvalidDifficulty(format!(
            "mining probability {} has no integer difficulty",
            mining_probability
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_table_is_well_formed() {
        let table = DifficultyTable::reference();
        let rebuilt = DifficultyTable::new(table.levels().to_vec()).unwrap();
        assert_eq!(&rebuilt, table);
        assert_eq!(table.len(), 11);
    }

    #[test]
    fn test_zero_difficulty_rejected() {
        let table = DifficultyTable::reference();
        let err = table.select_level(&BigUint::zero()).unwrap_err();
        assert!(matches!(err, ConsensusError::InvalidDifficulty(_)));
    }

    #[test]
    fn test_huge_difficulty_rejected() {
        let huge = BigUint::from(1u32) << 2000;
        assert!(matches!(
            difficulty_to_probability(&huge),
            Err(ConsensusError::InvalidDifficulty(_))
        ));
    }

    #[test]
    fn test_select_exact_levels() {
        let table = DifficultyTable::reference();
        // Level 0 shares its probability with level 1; the tie resolves to 1.
        for level in table.levels().iter().skip(1) {
            let difficulty = prob_to_difficulty(level.mining_probability).unwrap();
            let selected = table.select_level(&difficulty).unwrap();
            assert_eq!(selected.level, level.level, "difficulty {}", difficulty);
        }
    }

    #[test]
    fn test_tie_resolves_to_last_of_run() {
        let table = DifficultyTable::reference();
        let difficulty = prob_to_difficulty(3.077970e-05).unwrap();
        assert_eq!(table.select_level(&difficulty).unwrap().level, 1);
    }

    #[test]
    fn test_easy_difficulty_selects_first_run() {
        // Probability 1 is closest to the top of the table.
        let table = DifficultyTable::reference();
        let selected = table.select_level(&BigUint::from(1u32)).unwrap();
        assert_eq!(selected.level, 1);
    }

    #[test]
    fn test_hard_difficulty_selects_last_level() {
        let table = DifficultyTable::reference();
        let selected = table.select_level(&BigUint::from(10_000_000u64)).unwrap();
        assert_eq!(selected.level, 10);
    }

    #[test]
    fn test_scan_stops_at_first_increase() {
        // The last row is an exact match, but level 2 is further away than
        // level 1 so the scan never reaches it.
        let mut levels = REFERENCE_LEVELS[..4].to_vec();
        levels[3].mining_probability = 1.0e-03;
        let table = DifficultyTable { levels };
        let difficulty = prob_to_difficulty(1.0e-03).unwrap();
        assert_eq!(table.select_level(&difficulty).unwrap().level, 1);
    }

    #[test]
    fn test_malformed_tables() {
        assert!(DifficultyTable::new(Vec::new()).is_err());

        let mut increasing = REFERENCE_LEVELS.to_vec();
        increasing[4].mining_probability = 1.0e-04;
        assert!(matches!(
            DifficultyTable::new(increasing),
            Err(ConsensusError::MalformedTable(_))
        ));

        let mut bad_shape = REFERENCE_LEVELS.to_vec();
        bad_shape[2].n = 30;
        assert!(DifficultyTable::new(bad_shape).is_err());

        let mut bad_weights = REFERENCE_LEVELS.to_vec();
        bad_weights[0].wc = 4;
        assert!(DifficultyTable::new(bad_weights).is_err());

        let mut skipped = REFERENCE_LEVELS.to_vec();
        skipped.remove(3);
        assert!(DifficultyTable::new(skipped).is_err());
    }

    #[test]
    fn test_validate_shape_outside_table() {
        let base = REFERENCE_LEVELS[0];
        assert!(base.validate_shape().is_ok());

        // Out-of-order level numbers only matter inside a table.
        assert!(DifficultyLevel { level: 7, ..base }.validate_shape().is_ok());

        let no_rows = DifficultyLevel { wr: 0, ..base };
        assert_eq!(no_rows.check_nodes(), 0);
        assert!(matches!(
            no_rows.validate_shape(),
            Err(ConsensusError::MalformedTable(_))
        ));
        assert!(DifficultyLevel { decision_step: 0, ..base }
            .validate_shape()
            .is_err());
        assert!(DifficultyLevel {
            decision_from: 20,
            decision_to: 10,
            ..base
        }
        .validate_shape()
        .is_err());
    }

    #[test]
    fn test_level_lookup() {
        let table = DifficultyTable::reference();
        assert_eq!(table.level(5).unwrap().n, 36);
        assert!(matches!(
            table.level(11),
            Err(ConsensusError::MalformedTable(_))
        ));
    }

    #[test]
    fn test_prob_to_difficulty_truncates() {
        assert_eq!(prob_to_difficulty(0.3).unwrap(), BigUint::from(3u32));
        assert_eq!(prob_to_difficulty(1.0).unwrap(), BigUint::from(1u32));
        assert!(prob_to_difficulty(0.0).is_err());
        assert!(prob_to_difficulty(f64::NAN).is_err());
    }
}
