use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use labrpc::RpcError;
use log::{debug, error, trace};
use serde::{Deserialize, Serialize};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task;

use super::AcceptorService;
use crate::{Accepted, PaxosError, Persistor, Promise, Proposal, ProposalNumber, Result};

const STATE_KEY: &str = "acceptor-state";

/// Everything an acceptor has to remember.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptorState {
    /// Highest number promised. Never decreases.
    pub highest_promised: ProposalNumber,
    /// Highest numbered proposal accepted. Never cleared; its number never
    /// decreases and never exceeds `highest_promised`.
    pub accepted: Option<Proposal>,
}

fn check_number(n: ProposalNumber) -> Result<()> {
    if n.is_zero() {
        return Err(PaxosError::MalformedRequest(
            "proposal number must be positive".into(),
        ));
    }
    Ok(())
}

/// Run the blocking `f` without stalling other tasks on the worker, where the
/// runtime allows it.
fn blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current().map(|h| h.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => task::block_in_place(f),
        _ => f(),
    }
}

impl AcceptorState {
    /// Phase 1b.
    pub fn prepare(&mut self, n: ProposalNumber) -> Result<Promise> {
        check_number(n)?;
        if n > self.highest_promised {
            self.highest_promised = n;
            Ok(Promise {
                ok: true,
                number: n,
                accepted: self.accepted.clone(),
            })
        } else {
            Ok(Promise {
                ok: false,
                number: self.highest_promised,
                accepted: None,
            })
        }
    }

    /// Phase 2b. Replaying an accept that was already applied is harmless.
    pub fn accept(&mut self, n: ProposalNumber, value: String) -> Result<Accepted> {
        check_number(n)?;
        if n < self.highest_promised {
            return Ok(Accepted {
                ok: false,
                number: self.highest_promised,
            });
        }

        if let Some(p) = &self.accepted {
            if p.number == n && p.value != value {
                return Err(PaxosError::ProtocolViolation(format!(
                    "proposal {} already accepted with a different value",
                    n
                )));
            }
        }
        self.highest_promised = n;
        if self.accepted.as_ref().map_or(true, |p| p.number < n) {
            self.accepted = Some(Proposal { number: n, value });
        }
        Ok(Accepted { ok: true, number: n })
    }
}

/// A Paxos acceptor.
///
/// Handlers may be called concurrently from any number of proposers; each one
/// runs under the state lock, so they never interleave.
pub struct Acceptor {
    name: String,
    state: Mutex<AcceptorState>,
    down: AtomicBool,
    persistor: Option<Persistor>,
}

impl Acceptor {
    /// An acceptor that keeps its state in memory only.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(AcceptorState::default()),
            down: AtomicBool::new(false),
            persistor: None,
        }
    }

    /// An acceptor persisting its state under `dir`, restoring whatever was
    /// stored there before.
    pub fn open(name: impl Into<String>, dir: impl AsRef<Path>) -> Result<Self> {
        let persistor = Persistor::new(dir)?;
        let state = persistor.get(STATE_KEY)?.unwrap_or_default();
        let acceptor = Self {
            name: name.into(),
            state: Mutex::new(state),
            down: AtomicBool::new(false),
            persistor: Some(persistor),
        };
        debug!("{} restored {:?}", acceptor.name, acceptor.state());
        Ok(acceptor)
    }

    /// Name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A copy of the current state.
    pub fn state(&self) -> AcceptorState {
        self.state.lock().unwrap().clone()
    }

    /// While down the acceptor answers nothing.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Whether the acceptor is down.
    pub fn is_down(&self) -> bool {
        self.down.load(Ordering::SeqCst)
    }

    /// Run `f` on a copy of the state and commit the copy once it is durable.
    fn update<R>(&self, f: impl FnOnce(&mut AcceptorState) -> Result<R>) -> Result<R> {
        let mut state = self.state.lock().unwrap();
        let mut next = state.clone();
        let r = f(&mut next)?;
        if next != *state {
            if let Some(p) = &self.persistor {
                blocking(|| p.set(STATE_KEY, &next))?;
            }
            *state = next;
        }
        Ok(r)
    }

    fn check_up(&self) -> anyhow::Result<()> {
        if self.is_down() {
            trace!("{} is down, ignoring request", self.name);
            return Err(RpcError::Dropped.into());
        }
        Ok(())
    }

    fn reply_error(&self, e: PaxosError) -> anyhow::Error {
        match e {
            PaxosError::MalformedRequest(msg) => RpcError::InvalidRequest(msg).into(),
            PaxosError::Storage(e) => {
                error!("{} failed to persist state: {}", self.name, e);
                RpcError::Dropped.into()
            }
            e => {
                error!("{}: {}", self.name, e);
                RpcError::Service(e.to_string()).into()
            }
        }
    }
}

#[labrpc::async_trait]
impl AcceptorService for Acceptor {
    async fn prepare(&self, n: ProposalNumber) -> anyhow::Result<Promise> {
        self.check_up()?;
        let promise = self
            .update(|s| s.prepare(n))
            .map_err(|e| self.reply_error(e))?;
        if promise.ok {
            debug!("{} promised {}", self.name, n);
        } else {
            debug!("{} rejected prepare {} for {}", self.name, n, promise.number);
        }
        Ok(promise)
    }

    async fn accept(&self, n: ProposalNumber, value: String) -> anyhow::Result<Accepted> {
        self.check_up()?;
        let accepted = self
            .update(|s| s.accept(n, value))
            .map_err(|e| self.reply_error(e))?;
        if accepted.ok {
            debug!("{} accepted {}", self.name, n);
        } else {
            debug!("{} rejected accept {} for {}", self.name, n, accepted.number);
        }
        Ok(accepted)
    }

    async fn read(&self) -> anyhow::Result<Option<String>> {
        self.check_up()?;
        Ok(self.state().accepted.map(|p| p.value))
    }
}
