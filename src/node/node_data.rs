use std::fmt::{Debug, Display, Formatter, Result};
use std::net::SocketAddr;

/// The identity of a ring member, usually a single letter such as `A`.
#[derive(Ord, PartialOrd, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// Constructs a new `NodeId`. Identities are case-insensitive and stored upper-case.
    pub fn new(id: &str) -> Self {
        NodeId(id.trim().to_uppercase())
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for NodeId {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "{}", self.0)
    }
}

impl<'a> From<&'a str> for NodeId {
    fn from(id: &'a str) -> Self {
        NodeId::new(id)
    }
}

/// A ring member and the address it listens on.
#[derive(PartialEq, Eq, Hash, Clone, Serialize, Deserialize)]
pub struct NodeData {
    pub id: NodeId,
    pub addr: SocketAddr,
}

impl Debug for NodeData {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "{} - {}", self.id, self.addr)
    }
}
