use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use futures::Future;
use log::{trace, warn};
use rand::Rng;
use tokio::sync::{
    mpsc::{self, Receiver, Sender},
    oneshot,
};

use crate::{client::Client, server::Server};

#[derive(Debug)]
pub struct NetworkPackage {
    pub to: String,
    pub reply: oneshot::Sender<String>,
    pub data: String,
}

#[derive(Default)]
struct Shared {
    nodes: Mutex<HashMap<String, Sender<NetworkPackage>>>,
    down: Mutex<HashSet<String>>,
    drop_rate: Mutex<f64>,
}

impl Shared {
    fn insert(&self, id: String, tx: Sender<NetworkPackage>) {
        self.nodes.lock().unwrap().insert(id, tx);
    }

    fn should_drop(&self, to: &str) -> bool {
        if self.down.lock().unwrap().contains(to) {
            return true;
        }
        let rate = *self.drop_rate.lock().unwrap();
        rate > 0.0 && rand::thread_rng().gen_bool(rate)
    }
}

/// Routes packages from clients to the servers registered under their id.
pub struct Network {
    pub tx: Sender<NetworkPackage>,
    rx: Receiver<NetworkPackage>,
    shared: Arc<Shared>,
}

/// Cloneable control handle of a [`Network`] that keeps working after
/// [`Network::run`] has taken ownership of the router.
#[derive(Clone)]
pub struct NetworkHandle {
    tx: Sender<NetworkPackage>,
    shared: Arc<Shared>,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(100);
        Self {
            tx,
            rx,
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn handle(&self) -> NetworkHandle {
        NetworkHandle {
            tx: self.tx.clone(),
            shared: self.shared.clone(),
        }
    }

    /// Register a server for `svc` under `id`.
    ///
    /// The server is reachable as soon as this returns; the returned routine
    /// serves it. A handler that panics only loses its own reply, so the
    /// routine runs for as long as the network does.
    pub fn register_service<S, C>(
        &self,
        id: impl Into<String>,
        svc: S::Service,
    ) -> (C, impl Future<Output = ()>)
    where
        S: Server + 'static,
        C: Client,
    {
        let id = id.into();
        let client = C::from_server(id.clone(), self.tx.clone());
        let mut server = S::from_service(svc);
        self.shared.insert(id.clone(), server.client_chan());

        (client, async move {
            if let Err(e) = server.run().await {
                warn!("server {} stopped: {}", id, e);
            }
        })
    }

    pub fn client<C: Client>(&self, id: impl Into<String>) -> C {
        C::from_server(id.into(), self.tx.clone())
    }

    pub async fn run(mut self) {
        while let Some(p) = self.rx.recv().await {
            if self.shared.should_drop(&p.to) {
                trace!("package to {} dropped", p.to);
                continue;
            }
            let node = {
                let x = self.shared.nodes.lock().unwrap();
                x.get(&p.to).cloned()
            };

            if let Some(x) = node {
                if x.send(p).await.is_err() {
                    warn!("send to node failed, dropped");
                }
            } else {
                warn!("node {} not found", p.to);
            }
        }
    }
}

impl NetworkHandle {
    pub fn client<C: Client>(&self, id: impl Into<String>) -> C {
        C::from_server(id.into(), self.tx.clone())
    }

    /// Drop every package addressed to `id` while it is down.
    pub fn set_down(&self, id: &str, down: bool) {
        let mut set = self.shared.down.lock().unwrap();
        if down {
            set.insert(id.to_owned());
        } else {
            set.remove(id);
        }
    }

    /// Drop each package with probability `rate`, clamped to `[0, 1]`.
    pub fn set_drop_rate(&self, rate: f64) {
        *self.shared.drop_rate.lock().unwrap() = rate.clamp(0.0, 1.0);
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.shared.nodes.lock().unwrap().contains_key(id)
    }
}
