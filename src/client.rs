use crate::config::Config;
use crate::error::{Error, Result};
use crate::node::node_data::NodeId;
use crate::protocol::{Protocol, Request, Response};
use crate::routing::Ring;

/// Issues client requests to any member of a ring.
pub struct Client {
    ring: Ring,
    protocol: Protocol,
}

impl Client {
    /// Constructs a new `Client` for the ring described by `config`.
    ///
    /// A download may walk the whole ring behind the entry node, so replies are awaited for up to
    /// one request timeout per ring member.
    pub fn new(config: &Config) -> Result<Self> {
        let ring = config.ring()?;
        let protocol = config
            .protocol()
            .with_request_timeout(config.request_timeout() * ring.len() as u32);
        Ok(Client { ring, protocol })
    }

    fn request(&self, node: &NodeId, request: &Request) -> Result<Response> {
        let addr = self.ring.node_data(node)?.addr;
        match self.protocol.request(addr, request)? {
            Response::Error { message } => Err(Error::Remote(message)),
            response => Ok(response),
        }
    }

    /// Uploads `content` as `file_name` through `node`. Returns the node's acknowledgment.
    pub fn upload(&self, node: &NodeId, file_name: &str, content: Vec<u8>) -> Result<String> {
        let request = Request::Upload {
            file_name: file_name.to_string(),
            content,
        };
        match self.request(node, &request)? {
            Response::Uploaded { message } => Ok(message),
            other => Err(unexpected(&other)),
        }
    }

    /// Downloads `file_name` through `node`.
    pub fn download(&self, node: &NodeId, file_name: &str) -> Result<Vec<u8>> {
        let request = Request::Download {
            file_name: file_name.to_string(),
        };
        match self.request(node, &request)? {
            Response::File { content, .. } => Ok(content),
            other => Err(unexpected(&other)),
        }
    }

    /// Lists every file known to the ring, as seen from `node`.
    pub fn list(&self, node: &NodeId) -> Result<Vec<String>> {
        match self.request(node, &Request::List)? {
            Response::Listing { files } => Ok(files),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(response: &Response) -> Error {
    Error::UnexpectedResponse(format!("{:?}", response))
}
