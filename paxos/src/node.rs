use std::sync::Arc;
use std::time::Duration;

use labrpc::Network;
use tokio::task::JoinHandle;

use crate::{
    Acceptor, AcceptorClient, AcceptorServer, Config, Membership, Proposer, ProposerClient,
    ProposerServer, Result,
};

/// How long a client waits on a write when the config sets no deadline.
const UNBOUNDED_WRITE: Duration = Duration::from_secs(24 * 60 * 60);

/// A process playing both roles: one acceptor and one proposer.
///
/// Both are served on the network under their own ids; the proposer talks to
/// the acceptor next to it through the network like to any other.
pub struct Node {
    name: String,
    acceptor: Arc<Acceptor>,
    proposer: Arc<Proposer>,
    acceptor_client: AcceptorClient,
    proposer_client: ProposerClient,
    servers: Vec<JoinHandle<()>>,
}

impl Node {
    /// Network id of the acceptor of node `name`.
    pub fn acceptor_id(name: &str) -> String {
        format!("{}/acceptor", name)
    }

    /// Network id of the proposer of node `name`.
    pub fn proposer_id(name: &str) -> String {
        format!("{}/proposer", name)
    }

    /// Serve `acceptor` and a new proposer with `identity` on `net`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        net: &Network,
        name: impl Into<String>,
        identity: u64,
        acceptor: Acceptor,
        membership: Arc<Membership>,
        config: Config,
    ) -> Result<Self> {
        let name = name.into();
        let write_timeout = config.deadline().unwrap_or(UNBOUNDED_WRITE) + config.call_timeout();
        let acceptor = Arc::new(acceptor);
        let proposer = Arc::new(Proposer::new(identity, membership, config)?);

        let (acceptor_client, acceptor_routine) = net
            .register_service::<AcceptorServer<Arc<Acceptor>>, AcceptorClient>(
                Self::acceptor_id(&name),
                acceptor.clone(),
            );
        let (proposer_client, proposer_routine) = net
            .register_service::<ProposerServer<Arc<Proposer>>, ProposerClient>(
                Self::proposer_id(&name),
                proposer.clone(),
            );

        Ok(Self {
            name,
            acceptor,
            proposer,
            acceptor_client,
            proposer_client: proposer_client.with_timeout(write_timeout),
            servers: vec![
                tokio::spawn(acceptor_routine),
                tokio::spawn(proposer_routine),
            ],
        })
    }

    /// Node name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The local acceptor.
    pub fn acceptor(&self) -> &Arc<Acceptor> {
        &self.acceptor
    }

    /// The local proposer.
    pub fn proposer(&self) -> &Arc<Proposer> {
        &self.proposer
    }

    /// Client of the local acceptor.
    pub fn acceptor_client(&self) -> &AcceptorClient {
        &self.acceptor_client
    }

    /// Client of the local proposer, the entry point for writes and reads.
    pub fn proposer_client(&self) -> &ProposerClient {
        &self.proposer_client
    }

    /// Make the local acceptor unavailable, or bring it back.
    pub fn set_down(&self, down: bool) {
        self.acceptor.set_down(down);
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        for s in self.servers.iter() {
            s.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_spawn_serves_both_roles() {
        let net = Network::new();
        let config = Config {
            call_timeout_ms: 100,
            ..Config::default()
        };
        let acceptors = vec![net.client::<AcceptorClient>(Node::acceptor_id("solo"))];
        let membership = Arc::new(Membership::new(acceptors, config.max_proposers));

        let node = Node::spawn(&net, "solo", 1, Acceptor::new("solo"), membership, config).unwrap();
        let handle = net.handle();
        let router = tokio::spawn(net.run());
        assert!(handle.is_registered(&Node::proposer_id("solo")));

        let chosen = node.proposer_client().choose("v".into()).await.unwrap();
        assert_eq!(chosen, "v");
        assert_eq!(node.proposer_client().read().await.unwrap(), Some("v".into()));
        assert_eq!(node.acceptor().state().accepted.unwrap().value, "v");
        router.abort();
    }
}
