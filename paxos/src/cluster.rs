//! In-process clusters for tests, benchmarks and the demo.

use std::sync::Arc;

use labrpc::{Network, NetworkHandle};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::task::JoinHandle;

use crate::{
    Acceptor, AcceptorClient, AcceptorServer, Config, Membership, Node, Proposer, Result,
};

/// Create random string of length n.
pub fn random_string(n: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(n)
        .map(char::from)
        .collect()
}

/// Acceptors served on their own network, without proposers.
pub struct AcceptorCluster {
    /// One client per acceptor, in order.
    pub clients: Vec<AcceptorClient>,
    /// The acceptors themselves, for inspection and fault injection.
    pub acceptors: Vec<Arc<Acceptor>>,
    /// Control handle of the network.
    pub network: NetworkHandle,
    /// Shared by every proposer built with [`AcceptorCluster::proposer`].
    pub membership: Arc<Membership>,
    tasks: Vec<JoinHandle<()>>,
}

impl AcceptorCluster {
    /// A proposer with `identity` working against this cluster.
    pub fn proposer(&self, identity: u64, config: Config) -> Result<Proposer> {
        Proposer::new(identity, self.membership.clone(), config)
    }
}

impl Drop for AcceptorCluster {
    fn drop(&mut self) {
        for t in self.tasks.iter() {
            t.abort();
        }
    }
}

/// Create a cluster of `n` in-memory acceptors named `acc-<i>`.
///
/// Must be called from within a tokio runtime.
pub fn acceptor_cluster(n: u32, config: &Config) -> AcceptorCluster {
    let net = Network::new();
    let mut clients = Vec::new();
    let mut acceptors = Vec::new();
    let mut tasks = Vec::new();

    for i in 0..n {
        let id = format!("acc-{}", i);
        let acceptor = Arc::new(Acceptor::new(id.clone()));
        let (client, server_routine) = net
            .register_service::<AcceptorServer<Arc<Acceptor>>, AcceptorClient>(id, acceptor.clone());
        clients.push(client.with_timeout(config.call_timeout()));
        acceptors.push(acceptor);
        tasks.push(tokio::spawn(server_routine));
    }

    let network = net.handle();
    tasks.push(tokio::spawn(net.run()));

    AcceptorCluster {
        membership: Arc::new(Membership::new(clients.clone(), config.max_proposers)),
        clients,
        acceptors,
        network,
        tasks,
    }
}

/// Nodes playing both roles on one network.
pub struct NodeCluster {
    /// Nodes `node-0` to `node-<n-1>`, with proposer identities `1..=n`.
    pub nodes: Vec<Node>,
    /// Control handle of the network.
    pub network: NetworkHandle,
    /// Membership shared by all proposers.
    pub membership: Arc<Membership>,
    router: JoinHandle<()>,
}

impl Drop for NodeCluster {
    fn drop(&mut self) {
        self.router.abort();
    }
}

/// Create a cluster of `n` nodes. With a `data_dir` in `config` every
/// acceptor keeps its state under `<data_dir>/<node name>`.
///
/// Must be called from within a tokio runtime.
pub fn node_cluster(n: u32, config: &Config) -> Result<NodeCluster> {
    config.validate()?;
    let net = Network::new();
    let names: Vec<String> = (0..n).map(|i| format!("node-{}", i)).collect();

    let clients: Vec<AcceptorClient> = names
        .iter()
        .map(|name| {
            net.client::<AcceptorClient>(Node::acceptor_id(name))
                .with_timeout(config.call_timeout())
        })
        .collect();
    let membership = Arc::new(Membership::new(clients, config.max_proposers));

    let mut nodes = Vec::new();
    for name in names {
        let acceptor = match &config.data_dir {
            Some(dir) => Acceptor::open(name.clone(), dir.join(&name))?,
            None => Acceptor::new(name.clone()),
        };
        let identity = membership.admit_proposer()?;
        nodes.push(Node::spawn(
            &net,
            name,
            identity,
            acceptor,
            membership.clone(),
            config.clone(),
        )?);
    }

    let network = net.handle();
    let router = tokio::spawn(net.run());
    Ok(NodeCluster {
        nodes,
        network,
        membership,
        router,
    })
}
