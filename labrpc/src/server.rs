//! Server side of services generated by [`service!`](crate::service).

use anyhow::Result;
use log::debug;
use tokio::sync::mpsc::Sender;

use crate::network::NetworkPackage;

/// Receives the packages the network routes to one server id.
#[async_trait::async_trait]
pub trait Server: Send {
    /// Handler implementation being served.
    type Service;

    /// Wrap `svc`, ready to be registered on a network.
    fn from_service(svc: Self::Service) -> Self;

    /// Sender the network routes this server's packages into.
    fn client_chan(&self) -> Sender<NetworkPackage>;

    /// Take the next package and start serving it without waiting for the
    /// handler. Fails once the channel is closed.
    async fn handle(&mut self) -> Result<()>;

    /// Serve packages until [`handle`](Server::handle) fails.
    async fn run(&mut self) -> Result<()> {
        loop {
            if let Err(e) = self.handle().await {
                debug!("server stopped: {}", e);
                return Err(e);
            }
        }
    }
}
