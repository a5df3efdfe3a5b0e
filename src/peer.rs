use std::fmt;

use serde::Serialize;

/// Identity of a node on the network. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PeerNode {
    node_id: String,
    address: String,
    port: u16,
}

impl PeerNode {
    pub fn new(node_id: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            node_id: node_id.into(),
            address: address.into(),
            port,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for PeerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.node_id, self.address, self.port)
    }
}
