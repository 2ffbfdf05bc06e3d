//! Chrome DevTools Protocol client layer.
//!
//! Wire types for the `Debugger` and `Runtime` domains, the `RpcClient`
//! abstraction the adapter talks through, and a websocket transport.

pub mod client;
pub mod transport;
pub mod types;

pub use client::{Cdp, CdpConnection, CdpConnector, CdpEvent, RpcClient, RpcError};
