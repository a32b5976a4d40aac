//! Client key generation and handling.

use std::net::{IpAddr, SocketAddr};

/// A key that identifies the entity being rate limited.
///
/// Usually a network address or an authenticated identity. Keys are opaque to
/// the engine; two keys are the same client exactly when they compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientKey(String);

impl ClientKey {
    /// Create a new client key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ClientKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for ClientKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<IpAddr> for ClientKey {
    fn from(addr: IpAddr) -> Self {
        Self(addr.to_string())
    }
}

impl std::fmt::Display for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps an inbound request to the key it is limited under.
pub trait KeyExtractor<R: ?Sized>: Send + Sync {
    /// Extract the client key for `request`.
    fn extract(&self, request: &R) -> ClientKey;
}

impl<R: ?Sized, F> KeyExtractor<R> for F
where
    F: Fn(&R) -> ClientKey + Send + Sync,
{
    fn extract(&self, request: &R) -> ClientKey {
        self(request)
    }
}

/// Keys a connection by its source IP address, ignoring the port.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerAddrKey;

impl KeyExtractor<SocketAddr> for PeerAddrKey {
    fn extract(&self, peer: &SocketAddr) -> ClientKey {
        ClientKey::from(peer.ip())
    }
}
