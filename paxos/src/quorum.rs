//! Majority arithmetic and the decisions built on it.
//!
//! A majority is always taken over every configured acceptor, never over the
//! ones that happened to answer.

use std::collections::HashMap;

use crate::{PaxosError, Proposal, ProposalNumber, Result};

/// Whether `count` acceptors out of `total` form a strict majority.
pub fn is_majority(count: usize, total: usize) -> bool {
    count > total / 2
}

/// Smallest strict majority of `total`.
pub fn majority(total: usize) -> usize {
    total / 2 + 1
}

/// Affirmative replies of one fan-out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quorum {
    /// Whether the affirmative replies form a majority.
    pub reached: bool,
    /// Indices of the acceptors that replied affirmatively.
    pub members: Vec<usize>,
}

/// Count the slots holding a reply that satisfies `yes`.
///
/// `outcomes` holds one slot per acceptor, `None` for no reply.
pub fn evaluate<T>(outcomes: &[Option<T>], total: usize, yes: impl Fn(&T) -> bool) -> Quorum {
    let members: Vec<usize> = outcomes
        .iter()
        .enumerate()
        .filter_map(|(i, o)| match o {
            Some(reply) if yes(reply) => Some(i),
            _ => None,
        })
        .collect();
    Quorum {
        reached: is_majority(members.len(), total),
        members,
    }
}

/// The highest numbered proposal among those reported by promises.
///
/// The same proposal may be reported by several acceptors, but one number
/// carrying two different values means numbers are not unique and the round
/// must not continue.
pub fn highest_accepted<'a>(
    accepted: impl IntoIterator<Item = &'a Proposal>,
) -> Result<Option<&'a Proposal>> {
    let mut values: HashMap<ProposalNumber, &str> = HashMap::new();
    let mut best: Option<&Proposal> = None;
    for p in accepted {
        if let Some(prev) = values.insert(p.number, &p.value) {
            if prev != p.value {
                return Err(PaxosError::ProtocolViolation(format!(
                    "proposal {} reported with values {:?} and {:?}",
                    p.number, prev, p.value
                )));
            }
        }
        if best.map_or(true, |b| p.number > b.number) {
            best = Some(p);
        }
    }
    Ok(best)
}

/// The value held by a majority of `total` acceptors, if any.
pub fn agreed_value(values: impl IntoIterator<Item = String>, total: usize) -> Option<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    counts
        .into_iter()
        .find(|(_, c)| is_majority(*c, total))
        .map(|(v, _)| v)
}
