//! Remote transport contract
//!
//! The dispatcher consults a `RemoteTransport` when no local action handler
//! resolves a request. Wire framing, peer discovery, and connection
//! management live behind this trait in transport crates; the bus only sees
//! opaque payload bytes and string errors, which it surfaces verbatim.

use async_trait::async_trait;

/// Adapter to a remote peer network
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Bring up connections; called during node start
    async fn start(&self) -> Result<(), String>;

    /// Tear down connections; called during node stop
    async fn stop(&self) -> Result<(), String>;

    /// Forward a request to the network
    ///
    /// `path` is the canonical `"network:service/action"` form.
    async fn request(&self, path: &str, payload: Vec<u8>) -> Result<Vec<u8>, String>;

    /// Forward an event to the network
    ///
    /// The local bus never calls this; it exists for adapters that mirror
    /// events explicitly.
    async fn publish(&self, path: &str, payload: Vec<u8>) -> Result<(), String> {
        let _ = (path, payload);
        Err("publish is not supported by this transport".to_string())
    }
}
