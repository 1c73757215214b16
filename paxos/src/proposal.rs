//! Proposal numbers.
//!
//! The number line is split into `stride` residue classes and every proposer
//! owns the class of its identity, so two proposers can never produce the
//! same number no matter what they have observed.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::{PaxosError, Result};

/// Totally ordered identifier of one proposal attempt. Zero means "none".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProposalNumber(pub u64);

impl ProposalNumber {
    /// No proposal seen or promised yet.
    pub const ZERO: Self = Self(0);

    /// Whether this is [`ProposalNumber::ZERO`].
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ProposalNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

fn check_identity(identity: u64, stride: u64) -> Result<()> {
    if identity == 0 || identity > stride {
        return Err(PaxosError::InvalidIdentity { identity, stride });
    }
    Ok(())
}

/// Smallest number greater than `prior` that is congruent to `identity`
/// modulo `stride`.
pub fn next(prior: ProposalNumber, identity: u64, stride: u64) -> Result<ProposalNumber> {
    check_identity(identity, stride)?;
    let base = prior.0 - prior.0 % stride;
    let candidate = base
        .checked_add(identity % stride)
        .ok_or(PaxosError::NumberSpaceExhausted)?;
    if candidate > prior.0 {
        Ok(ProposalNumber(candidate))
    } else {
        candidate
            .checked_add(stride)
            .map(ProposalNumber)
            .ok_or(PaxosError::NumberSpaceExhausted)
    }
}

/// Per-proposer number source, safe to share between concurrent rounds.
#[derive(Debug)]
pub struct ProposalNumberGenerator {
    identity: u64,
    stride: u64,
    /// Highest number generated or observed. Only ever grows.
    highest: AtomicU64,
}

impl ProposalNumberGenerator {
    /// Generator for `identity` in an identity space of size `stride`.
    pub fn new(identity: u64, stride: u64) -> Result<Self> {
        check_identity(identity, stride)?;
        Ok(Self {
            identity,
            stride,
            highest: AtomicU64::new(0),
        })
    }

    /// The proposer identity numbers are derived from.
    pub fn identity(&self) -> u64 {
        self.identity
    }

    /// Highest number generated or observed so far.
    pub fn highest(&self) -> ProposalNumber {
        ProposalNumber(self.highest.load(Ordering::SeqCst))
    }

    /// Raise the floor for later numbers to `n`.
    pub fn observe(&self, n: ProposalNumber) {
        self.highest.fetch_max(n.0, Ordering::SeqCst);
    }

    /// Allocate a fresh number above everything seen so far.
    ///
    /// Concurrent callers never get the same number.
    pub fn next(&self) -> Result<ProposalNumber> {
        let mut current = self.highest.load(Ordering::SeqCst);
        loop {
            let n = next(ProposalNumber(current), self.identity, self.stride)?;
            match self.highest.compare_exchange_weak(
                current,
                n.0,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(n),
                Err(actual) => current = actual,
            }
        }
    }
}
