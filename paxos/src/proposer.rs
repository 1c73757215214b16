use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use labrpc::client::Client;
use labrpc::RpcError;
use log::{debug, error, info, warn};
use tokio::time::{self, Instant};

use crate::proposal::ProposalNumberGenerator;
use crate::quorum;
use crate::{Config, Membership, PaxosError, ProposalNumber, ProposerService, Result, View};

/// Outcome of a successful prepare phase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prepared {
    /// The number the acceptors promised.
    pub number: ProposalNumber,
    /// The value to propose: the highest accepted one reported, or the
    /// client's own.
    pub value: String,
    /// Indices in the view of the acceptors that promised.
    pub members: Vec<usize>,
}

/// Classify a failed call to `peer`. Whatever the cause, the call counts as
/// a non-vote.
fn call_failure(peer: &str, e: anyhow::Error) -> PaxosError {
    match e.downcast::<RpcError>() {
        Ok(r) if r.is_no_response() => PaxosError::Unreachable(peer.to_owned()),
        Ok(RpcError::InvalidRequest(msg)) => PaxosError::MalformedRequest(msg),
        Ok(r) => PaxosError::ProtocolViolation(format!("{}: {}", peer, r)),
        Err(e) => PaxosError::MalformedRequest(format!("reply from {}: {}", peer, e)),
    }
}

/// A Paxos proposer.
///
/// Concurrent writes through the same proposer are fine: every round draws a
/// distinct number from the shared generator.
#[derive(Debug)]
pub struct Proposer {
    numbers: ProposalNumberGenerator,
    membership: Arc<Membership>,
    config: Config,
}

impl Proposer {
    /// A proposer with the given `identity`, which must be unique in the
    /// cluster and lie in `1..=membership.max_proposers()`.
    pub fn new(identity: u64, membership: Arc<Membership>, config: Config) -> Result<Self> {
        config.validate()?;
        if config.max_proposers != membership.max_proposers() {
            return Err(PaxosError::Config(format!(
                "max_proposers {} does not match the membership's {}",
                config.max_proposers,
                membership.max_proposers()
            )));
        }
        Ok(Self {
            numbers: ProposalNumberGenerator::new(identity, membership.max_proposers())?,
            membership,
            config,
        })
    }

    /// This proposer's identity.
    pub fn identity(&self) -> u64 {
        self.numbers.identity()
    }

    /// Highest proposal number generated or observed so far.
    pub fn highest_seen(&self) -> ProposalNumber {
        self.numbers.highest()
    }

    /// Await `call`, folding errors and timeouts into "no reply".
    async fn bounded<T>(
        &self,
        peer: &str,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> Option<T> {
        let failure = match time::timeout(self.config.call_timeout(), call).await {
            Ok(Ok(reply)) => return Some(reply),
            Ok(Err(e)) => call_failure(peer, e),
            Err(_) => PaxosError::Unreachable(peer.to_owned()),
        };
        match failure {
            PaxosError::Unreachable(_) => warn!("p{}: {}", self.identity(), failure),
            _ => error!("p{}: {}", self.identity(), failure),
        }
        None
    }

    /// Phase 1: get a fresh number promised by a majority of `view`.
    ///
    /// `Ok(None)` means no majority promised; the numbers seen in the replies
    /// have been recorded so the next attempt starts above them.
    pub async fn prepare(&self, view: &View, value: &str) -> Result<Option<Prepared>> {
        let n = self.numbers.next()?;
        let total = view.acceptors.len();
        debug!("p{}: prepare {} to {} acceptors", self.identity(), n, total);

        let replies = join_all(
            view.acceptors
                .iter()
                .map(|c| self.bounded(c.server_id(), c.prepare(n))),
        )
        .await;

        for promise in replies.iter().flatten() {
            self.numbers.observe(promise.number);
            if let Some(p) = &promise.accepted {
                self.numbers.observe(p.number);
            }
        }

        let q = quorum::evaluate(&replies, total, |p| p.ok && p.number == n);
        if !q.reached {
            info!(
                "p{}: prepare {} promised by {}/{}, retrying",
                self.identity(),
                n,
                q.members.len(),
                total
            );
            return Ok(None);
        }

        let accepted = q
            .members
            .iter()
            .filter_map(|&i| replies[i].as_ref().and_then(|p| p.accepted.as_ref()));
        let highest = quorum::highest_accepted(accepted).map_err(|e| {
            error!("p{}: {}", self.identity(), e);
            e
        })?;
        let value = match highest {
            Some(p) => {
                info!("p{}: adopting value of {}", self.identity(), p.number);
                p.value.clone()
            }
            None => value.to_owned(),
        };

        Ok(Some(Prepared {
            number: n,
            value,
            members: q.members,
        }))
    }

    /// Phase 2: ask every acceptor in `view` to accept `prepared`.
    ///
    /// Returns whether a majority of the whole view accepted, i.e. whether
    /// the value is chosen.
    pub async fn accept(&self, view: &View, prepared: &Prepared) -> Result<bool> {
        let n = prepared.number;
        let total = view.acceptors.len();
        debug!(
            "p{}: accept {} (promised by {:?})",
            self.identity(),
            n,
            prepared.members
        );

        let replies = join_all(view.acceptors.iter().map(|c| {
            self.bounded(c.server_id(), c.accept(n, prepared.value.clone()))
        }))
        .await;

        for r in replies.iter().flatten().filter(|r| !r.ok) {
            self.numbers.observe(r.number);
        }

        let q = quorum::evaluate(&replies, total, |r| r.ok && r.number == n);
        if !q.reached {
            info!(
                "p{}: accept {} acknowledged by {}/{}, retrying",
                self.identity(),
                n,
                q.members.len(),
                total
            );
        }
        Ok(q.reached)
    }

    /// One full round against the current view.
    async fn round(&self, value: &str) -> Result<Option<String>> {
        let view = self.membership.snapshot();
        let prepared = match self.prepare(&view, value).await? {
            Some(prepared) => prepared,
            None => return Ok(None),
        };
        if self.accept(&view, &prepared).await? {
            Ok(Some(prepared.value))
        } else {
            Ok(None)
        }
    }

    /// Get some value chosen, proposing `value` if nothing was chosen yet.
    ///
    /// Returns the chosen value, which is another proposer's value when that
    /// one got there first. Lost rounds are retried with a higher number until
    /// `max_attempts` or the deadline runs out.
    pub async fn choose(&self, value: String) -> Result<String> {
        let deadline = self.config.deadline().map(|d| Instant::now() + d);
        let mut attempts = 0;
        loop {
            if let Some(max) = self.config.max_attempts {
                if attempts >= max {
                    warn!("p{}: giving up after {} attempts", self.identity(), attempts);
                    return Err(PaxosError::QuorumNotReached { attempts });
                }
            }
            attempts += 1;

            let round = self.round(&value);
            let outcome = match deadline {
                Some(at) => time::timeout_at(at, round)
                    .await
                    .map_err(|_| PaxosError::Cancelled { attempts })?,
                None => round.await,
            };
            if let Some(chosen) = outcome? {
                info!(
                    "p{}: chosen {:?} after {} attempts",
                    self.identity(),
                    chosen,
                    attempts
                );
                return Ok(chosen);
            }

            let pause = Instant::now() + self.config.backoff();
            match deadline {
                Some(at) if at <= pause => {
                    time::sleep_until(at).await;
                    return Err(PaxosError::Cancelled { attempts });
                }
                _ => time::sleep_until(pause).await,
            }
        }
    }

    /// The value a majority of acceptors holds, `None` if undetermined.
    pub async fn read(&self) -> Option<String> {
        let view = self.membership.snapshot();
        let total = view.acceptors.len();
        let values = join_all(
            view.acceptors
                .iter()
                .map(|c| self.bounded(c.server_id(), c.read())),
        )
        .await;
        let agreed = quorum::agreed_value(values.into_iter().flatten().flatten(), total);
        debug!("p{}: read {:?}", self.identity(), agreed);
        agreed
    }
}

#[labrpc::async_trait]
impl ProposerService for Proposer {
    async fn choose(&self, value: String) -> anyhow::Result<String> {
        Ok(Proposer::choose(self, value).await?)
    }

    async fn read(&self) -> anyhow::Result<Option<String>> {
        Ok(Proposer::read(self).await)
    }
}
