use std::time::Duration;

use log::trace;
use tokio::sync::{mpsc::Sender, oneshot};
use tokio::time;

use crate::{network::NetworkPackage, RpcError};

/// Call timeout used unless the client is built with another one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

pub trait Client: Clone + Send + Sync + 'static {
    fn from_server(server_id: String, net_tx: Sender<NetworkPackage>) -> Self;
    fn server_id(&self) -> &str;
}

/// Send `data` to server `to` and wait at most `timeout` for its reply.
pub async fn call(
    tx: &Sender<NetworkPackage>,
    to: &str,
    data: String,
    timeout: Duration,
) -> Result<String, RpcError> {
    let (reply, rx) = oneshot::channel();
    trace!("req to {}: {}", to, &data);
    tx.send(NetworkPackage {
        to: to.to_owned(),
        reply,
        data,
    })
    .await
    .map_err(|_| RpcError::Unreachable(to.to_owned()))?;

    match time::timeout(timeout, rx).await {
        Ok(Ok(resp)) => {
            trace!("resp from {}: {}", to, &resp);
            Ok(resp)
        }
        Ok(Err(_)) => Err(RpcError::Unreachable(to.to_owned())),
        Err(_) => Err(RpcError::Timeout(to.to_owned())),
    }
}
