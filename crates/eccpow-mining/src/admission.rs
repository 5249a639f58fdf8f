//! Admission pre-filter for candidate miners.
//!
//! Before a candidate identity may search for a nonce it has to be admitted
//! by an upstream scheme. The reference scheme signs a message with a lattice
//! signature and admits the candidate when the signature norm falls below a
//! bound chosen for the desired admission rate. Only the boolean decision is
//! consumed here; the signature itself is computed by the caller.

use crate::{MiningError, MiningResult};

/// Admission rate (percent) to norm bound.
pub const NORM_BOUNDS: [(u8, u32); 6] = [
    (5, 55_085_531),
    (10, 55_744_816),
    (15, 56_189_632),
    (20, 56_543_158),
    (25, 56_846_452),
    (30, 57_118_819),
];

/// Norm bound for an admission rate in percent.
pub fn norm_bound_for(percent: u8) -> MiningResult<u32> {
    NORM_BOUNDS
        .iter()
        .find(|(p, _)| *p == percent)
        .map(|(_, bound)| *bound)
        .ok_or_else(|| {
            MiningError::InvalidConfig(format!(
                "no norm bound for an admission rate of {}%",
                percent
            ))
        })
}

/// Decides whether a candidate may start searching.
pub trait Admission: Send + Sync {
    /// True when `identity` is admitted for `message`.
    fn admit(&self, identity: &[u8], message: &[u8]) -> bool;
}

/// Admits every candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdmitAll;

impl Admission for AdmitAll {
    fn admit(&self, _identity: &[u8], _message: &[u8]) -> bool {
        true
    }
}

/// Admits a candidate when the norm reported for its signature is strictly
/// below the bound.
pub struct NormBoundAdmission<F> {
    bound: u32,
    norm: F,
}

impl<F> NormBoundAdmission<F>
where
    F: Fn(&[u8], &[u8]) -> u32 + Send + Sync,
{
    /// Use an explicit bound.
    pub fn new(bound: u32, norm: F) -> Self {
        Self { bound, norm }
    }

    /// Use the bound for an admission rate in percent.
    pub fn for_rate(percent: u8, norm: F) -> MiningResult<Self> {
        Ok(Self::new(norm_bound_for(percent)?, norm))
    }

    /// The norm bound.
    pub fn bound(&self) -> u32 {
        self.bound
    }
}

impl<F> Admission for NormBoundAdmission<F>
where
    F: Fn(&[u8], &[u8]) -> u32 + Send + Sync,
{
    fn admit(&self, identity: &[u8], message: &[u8]) -> bool {
        (self.norm)(identity, message) < self.bound
    }
}

/// Indices of the admitted candidates, in order.
pub fn admitted_candidates<A, I>(admission: &A, candidates: &[I], message: &[u8]) -> Vec<usize>
where
    A: Admission + ?Sized,
    I: AsRef<[u8]>,
{
    candidates
        .iter()
        .enumerate()
        .filter(|(_, identity)| admission.admit(identity.as_ref(), message))
        .map(|(index, _)| index)
        .collect()
}
