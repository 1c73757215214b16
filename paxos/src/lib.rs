#![warn(missing_docs)]
#![deny(clippy::all)]
//! Single-decree Paxos.
//!
//! A cluster of [`Acceptor`]s and [`Proposer`]s agrees on exactly one value.
//! All traffic, including a node talking to its own acceptor, goes through
//! the [`labrpc`] network.

use serde::{Deserialize, Serialize};

/// A numbered value some proposer is trying to get chosen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Proposal number, unique across proposers.
    pub number: ProposalNumber,
    /// Opaque payload.
    pub value: String,
}

/// Reply to a prepare request.
///
/// On a promise `number` is the promised number and `accepted` carries the
/// acceptor's highest accepted proposal. On a rejection `number` is the
/// number the proposer has to beat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promise {
    /// Whether the acceptor promised.
    pub ok: bool,
    /// Promised number, or the rejecting floor.
    pub number: ProposalNumber,
    /// Highest proposal accepted so far.
    pub accepted: Option<Proposal>,
}

/// Reply to an accept request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accepted {
    /// Whether the proposal was accepted.
    pub ok: bool,
    /// Accepted number, or the acceptor's highest promise on rejection.
    pub number: ProposalNumber,
}

labrpc::service! {
    service acceptor_svc {
        fn prepare(n: ProposalNumber) -> Promise;
        fn accept(n: ProposalNumber, value: String) -> Accepted;
        fn read() -> Option<String>;
    }
}

labrpc::service! {
    service proposer_svc {
        fn choose(value: String) -> String;
        fn read() -> Option<String>;
    }
}

pub use acceptor_svc::{
    Client as AcceptorClient, Server as AcceptorServer, Service as AcceptorService,
};

pub use proposer_svc::{
    Client as ProposerClient, Server as ProposerServer, Service as ProposerService,
};

mod acceptor;
pub mod cluster;
mod config;
mod error;
mod membership;
mod node;
mod persistor;
pub mod proposal;
mod proposer;
pub mod quorum;
pub mod shell;

pub use acceptor::{Acceptor, AcceptorState};
pub use config::Config;
pub use error::{PaxosError, Result};
pub use membership::{Membership, View};
pub use node::Node;
pub use persistor::Persistor;
pub use proposal::{ProposalNumber, ProposalNumberGenerator};
pub use proposer::{Prepared, Proposer};
