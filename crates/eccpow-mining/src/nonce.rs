//! Nonce sources for the search loop.

use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng};

/// Supplies the nonces tried by a search.
pub trait NonceSource {
    /// Next nonce, or `None` when the source is exhausted.
    fn next_nonce(&mut self) -> Option<u64>;
}

/// Uniformly random nonces from a generator seeded by the OS.
#[derive(Debug, Clone)]
pub struct RandomNonces {
    rng: StdRng,
}

impl Default for RandomNonces {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomNonces {
    /// Create a source seeded from the operating system.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_rng(OsRng).unwrap_or_else(|_| StdRng::from_entropy()),
        }
    }
}

impl NonceSource for RandomNonces {
    fn next_nonce(&mut self) -> Option<u64> {
        Some(self.rng.gen())
    }
}

/// A pre-supplied nonce sequence, tried in order.
#[derive(Debug, Clone, Default)]
pub struct FixedNonces {
    nonces: Vec<u64>,
    position: usize,
}

impl FixedNonces {
    /// Create a source over `nonces`.
    pub fn new(nonces: impl Into<Vec<u64>>) -> Self {
        Self {
            nonces: nonces.into(),
            position: 0,
        }
    }

    /// Nonces not yet handed out.
    pub fn remaining(&self) -> usize {
        self.nonces.len() - self.position
    }
}

impl NonceSource for FixedNonces {
    fn next_nonce(&mut self) -> Option<u64> {
        let nonce = self.nonces.get(self.position).copied()?;
        self.position += 1;
        Some(nonce)
    }
}

impl FromIterator<u64> for FixedNonces {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect::<Vec<_>>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_nonces_in_order() {
        let mut nonces = FixedNonces::new(vec![5, 1, 9]);
        assert_eq!(nonces.remaining(), 3);
        assert_eq!(nonces.next_nonce(), Some(5));
        assert_eq!(nonces.next_nonce(), Some(1));
        assert_eq!(nonces.next_nonce(), Some(9));
        assert_eq!(nonces.next_nonce(), None);
        assert_eq!(nonces.remaining(), 0);
    }

    #[test]
    fn test_fixed_nonces_from_iter() {
        let mut nonces: FixedNonces = (10..12).collect();
        assert_eq!(nonces.next_nonce(), Some(10));
        assert_eq!(nonces.next_nonce(), Some(11));
        assert_eq!(nonces.next_nonce(), None);
    }

    #[test]
    fn test_random_nonces_vary() {
        let mut nonces = RandomNonces::new();
        let drawn: Vec<u64> = (0..8).filter_map(|_| nonces.next_nonce()).collect();
        assert_eq!(drawn.len(), 8);
        assert!(drawn.windows(2).any(|w| w[0] != w[1]));
    }
}
