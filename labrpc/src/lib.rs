//! A simulated RPC network.
//!
//! Services are declared with [`service!`], servers are registered on a
//! [`Network`] and every call is routed through it, so tests can take servers
//! down or make the network lossy without touching the services themselves.

pub mod client;
pub mod error;
mod macros;
pub mod network;
pub mod server;

pub use anyhow;
pub use async_trait::async_trait;
pub use futures;
pub use log;
pub use rand;
pub use serde;
pub use serde_json;
pub use tokio;

pub use error::{Reply, RpcError};
pub use network::{Network, NetworkHandle};
