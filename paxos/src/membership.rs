use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use labrpc::client::Client;
use log::info;

use crate::{AcceptorClient, PaxosError, Result};

/// One version of the acceptor set.
#[derive(Debug)]
pub struct View {
    /// Bumped on every update.
    pub version: u64,
    /// Acceptors of this version.
    pub acceptors: Vec<AcceptorClient>,
}

/// The acceptor set proposers work against.
///
/// Rounds take a [`snapshot`](Membership::snapshot) and use it from start to
/// end, so an update only affects rounds started after it.
#[derive(Debug)]
pub struct Membership {
    view: RwLock<Arc<View>>,
    max_proposers: u64,
    identities: AtomicU64,
}

impl Membership {
    /// Membership over `acceptors` with room for `max_proposers` proposers.
    pub fn new(acceptors: Vec<AcceptorClient>, max_proposers: u64) -> Self {
        Self {
            view: RwLock::new(Arc::new(View {
                version: 0,
                acceptors,
            })),
            max_proposers,
            identities: AtomicU64::new(0),
        }
    }

    /// The current view.
    pub fn snapshot(&self) -> Arc<View> {
        self.view.read().unwrap().clone()
    }

    /// Replace the acceptor set, returning the new version.
    pub fn update(&self, acceptors: Vec<AcceptorClient>) -> u64 {
        let mut view = self.view.write().unwrap();
        let version = view.version + 1;
        info!(
            "membership v{}: {:?}",
            version,
            acceptors.iter().map(|c| c.server_id()).collect::<Vec<_>>()
        );
        *view = Arc::new(View { version, acceptors });
        version
    }

    /// Size of the proposer identity space.
    pub fn max_proposers(&self) -> u64 {
        self.max_proposers
    }

    /// Hand out the next unused proposer identity.
    pub fn admit_proposer(&self) -> Result<u64> {
        let max = self.max_proposers;
        self.identities
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n < max {
                    Some(n + 1)
                } else {
                    None
                }
            })
            .map(|n| n + 1)
            .map_err(|n| PaxosError::InvalidIdentity {
                identity: n + 1,
                stride: max,
            })
    }
}
