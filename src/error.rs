use std::io;
use std::net::SocketAddr;

use crate::node::node_data::NodeId;

/// Errors produced by ring nodes and clients.
///
/// Peer failures (`ConnectionUnreachable`, `Timeout`, `MalformedMessage`, `NoLivePeer`) are
/// absorbed by the node that observes them; only `NotFound` and `Incomplete` ever reach a client,
/// as an `ERROR` response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("peer {addr} is unreachable: {source}")]
    ConnectionUnreachable {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("request to {addr} timed out")]
    Timeout { addr: SocketAddr },
    #[error("file '{0}' not found")]
    NotFound(String),
    #[error("file '{name}' is incomplete: {have} of {total} fragments reachable")]
    Incomplete { name: String, have: usize, total: u32 },
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("no live peer reachable from node {0}")]
    NoLivePeer(NodeId),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unknown node '{0}'")]
    UnknownNode(String),
    #[error("invalid upload: {0}")]
    InvalidUpload(String),
    #[error("node replied with an error: {0}")]
    Remote(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = ::std::result::Result<T, Error>;

impl Error {
    /// Classifies an IO error raised while talking to `addr`. Timeouts and refusals are both
    /// treated as the peer being down by callers.
    pub fn from_peer_io(addr: SocketAddr, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Error::Timeout { addr },
            _ => Error::ConnectionUnreachable { addr, source },
        }
    }

    /// Returns `true` if the error means the peer should be treated as down.
    pub fn is_peer_down(&self) -> bool {
        match *self {
            Error::ConnectionUnreachable { .. } | Error::Timeout { .. } => true,
            _ => false,
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::MalformedMessage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use std::io;

    #[test]
    fn test_peer_io_classification() {
        let addr = "127.0.0.1:5001".parse().unwrap();
        let timeout = Error::from_peer_io(addr, io::Error::new(io::ErrorKind::TimedOut, "slow"));
        let blocked = Error::from_peer_io(addr, io::Error::new(io::ErrorKind::WouldBlock, "slow"));
        let refused =
            Error::from_peer_io(addr, io::Error::new(io::ErrorKind::ConnectionRefused, "down"));

        match timeout {
            Error::Timeout { .. } => {},
            other => panic!("expected timeout, got {:?}", other),
        }
        match blocked {
            Error::Timeout { .. } => {},
            other => panic!("expected timeout, got {:?}", other),
        }
        match &refused {
            Error::ConnectionUnreachable { .. } => {},
            other => panic!("expected unreachable, got {:?}", other),
        }
        assert!(refused.is_peer_down());
        assert!(!Error::NotFound("x".to_string()).is_peer_down());
    }
}
