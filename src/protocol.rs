use bincode::{self, Options};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::fragment::Fragment;

/// A request sent to a node. One request is carried per connection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Request {
    /// Client request to store a whole file through the receiving node.
    Upload { file_name: String, content: Vec<u8> },
    /// Client request to reassemble a file from the ring.
    Download { file_name: String },
    /// Client request for every file name known anywhere in the ring.
    List,
    /// Peer message carrying one fragment around the ring. Never answered.
    Replicate { fragment: Fragment, replica_count: u32 },
    /// Peer query for the fragments of a file held by the receiving node only.
    Search { file_name: String },
    /// Peer query for the file names held by the receiving node only.
    ListLocal,
}

impl Request {
    /// Returns `true` for messages exchanged between ring members. These are answered from the
    /// receiving node's own state and never wait on another node.
    pub fn is_peer_message(&self) -> bool {
        match *self {
            Request::Replicate { .. } | Request::Search { .. } | Request::ListLocal => true,
            Request::Upload { .. } | Request::Download { .. } | Request::List => false,
        }
    }
}

/// A reply to a `Request`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Response {
    Uploaded { message: String },
    File { file_name: String, content: Vec<u8> },
    Listing { files: Vec<String> },
    Fragments(Vec<Fragment>),
    Files(Vec<String>),
    Error { message: String },
}

/// Framing and timeouts for the one-message-per-connection wire protocol.
///
/// The sender writes the serialized message and shuts down its write half; the receiver reads to
/// end-of-file. Replies travel back over the same connection the same way.
#[derive(Clone, Debug)]
pub struct Protocol {
    probe_timeout: Duration,
    request_timeout: Duration,
    max_message_bytes: u64,
}

impl Protocol {
    pub fn new(probe_timeout: Duration, request_timeout: Duration, max_message_bytes: u64) -> Self {
        Protocol {
            probe_timeout,
            request_timeout,
            max_message_bytes,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns a copy of `self` that waits `request_timeout` for data-bearing calls.
    pub fn with_request_timeout(&self, request_timeout: Duration) -> Self {
        Protocol {
            request_timeout,
            ..self.clone()
        }
    }

    fn options(&self) -> impl Options {
        bincode::DefaultOptions::new().with_limit(self.max_message_bytes)
    }

    pub fn encode<T: Serialize>(&self, message: &T) -> Result<Vec<u8>> {
        Ok(self.options().serialize(message)?)
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        Ok(self.options().deserialize(bytes)?)
    }

    /// Connects to `addr` and immediately closes the connection. Returns `true` if the connection
    /// was accepted within the probe timeout.
    pub fn probe(&self, addr: SocketAddr) -> bool {
        match TcpStream::connect_timeout(&addr, self.probe_timeout) {
            Ok(stream) => {
                let _ = stream.shutdown(Shutdown::Both);
                true
            },
            Err(_) => false,
        }
    }

    fn connect(&self, addr: SocketAddr) -> Result<TcpStream> {
        let stream = TcpStream::connect_timeout(&addr, self.request_timeout)
            .map_err(|err| Error::from_peer_io(addr, err))?;
        stream
            .set_read_timeout(Some(self.request_timeout))
            .and_then(|_| stream.set_write_timeout(Some(self.request_timeout)))
            .map_err(|err| Error::from_peer_io(addr, err))?;
        Ok(stream)
    }

    /// Sends `request` to `addr` without waiting for a reply.
    pub fn send(&self, addr: SocketAddr, request: &Request) -> Result<()> {
        let mut stream = self.connect(addr)?;
        self.write_message(&mut stream, request)
            .map_err(|err| peer_error(addr, err))
    }

    /// Sends `request` to `addr` and waits for its reply.
    pub fn request(&self, addr: SocketAddr, request: &Request) -> Result<Response> {
        let mut stream = self.connect(addr)?;
        self.write_message(&mut stream, request)
            .map_err(|err| peer_error(addr, err))?;
        match self.read_message(&mut stream) {
            Ok(Some(response)) => Ok(response),
            Ok(None) => Err(Error::MalformedMessage(format!(
                "empty reply from {}",
                addr
            ))),
            Err(err) => Err(peer_error(addr, err)),
        }
    }

    /// Serializes `message`, writes it to `stream` and closes the write half.
    pub fn write_message<T: Serialize>(&self, stream: &mut TcpStream, message: &T) -> Result<()> {
        let buffer = self.encode(message)?;
        stream.write_all(&buffer)?;
        stream.flush()?;
        stream.shutdown(Shutdown::Write)?;
        Ok(())
    }

    /// Reads one whole message from `stream`. Returns `None` if the peer closed the connection
    /// without sending anything, as liveness probes do.
    pub fn read_message<T: DeserializeOwned>(&self, stream: &mut TcpStream) -> Result<Option<T>> {
        let mut buffer = Vec::new();
        stream
            .take(self.max_message_bytes + 1)
            .read_to_end(&mut buffer)?;
        if buffer.is_empty() {
            return Ok(None);
        }
        if buffer.len() as u64 > self.max_message_bytes {
            return Err(Error::MalformedMessage(format!(
                "message exceeds {} bytes",
                self.max_message_bytes
            )));
        }
        self.decode(&buffer).map(Some)
    }
}

/// Attaches `addr` to raw IO failures so callers can treat them as the peer being down.
fn peer_error(addr: SocketAddr, err: Error) -> Error {
    match err {
        Error::Io(source) => Error::from_peer_io(addr, source),
        other => other,
    }
}
