pub mod node_data;
mod placement;
mod retrieval;

use std::collections::HashSet;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::node::node_data::{NodeData, NodeId};
use crate::protocol::{Protocol, Request, Response};
use crate::routing::Navigator;
use crate::storage::Storage;

/// A member of the storage ring.
///
/// Cloning a `Node` is cheap and yields a handle to the same running node.
#[derive(Clone)]
pub struct Node {
    node_data: Arc<NodeData>,
    navigator: Arc<Navigator>,
    storage: Arc<RwLock<Storage>>,
    protocol: Arc<Protocol>,
    fragment_size: usize,
    replication_factor: u32,
    is_active: Arc<AtomicBool>,
    listener_thread: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Node {
    /// Constructs a new `Node` for ring member `id`, binding the address `config` assigns to it.
    /// Failing to bind is fatal to the node and is the only error surfaced at startup.
    pub fn new(config: &Config, id: &NodeId) -> Result<Self> {
        let ring = config.ring()?;
        let addr = ring.node_data(id)?.addr;
        let listener = TcpListener::bind(addr)?;
        Node::with_listener(config, id, listener)
    }

    /// Constructs a new `Node` that serves requests from an already bound `listener`.
    pub fn with_listener(config: &Config, id: &NodeId, listener: TcpListener) -> Result<Self> {
        config.validate()?;
        let ring = Arc::new(config.ring()?);
        let node_data = Arc::new(ring.node_data(id)?);
        let navigator = Navigator::new(id.clone(), Arc::clone(&ring));

        let node = Node {
            node_data,
            navigator: Arc::new(navigator),
            storage: Arc::new(RwLock::new(Storage::new())),
            protocol: Arc::new(config.protocol()),
            fragment_size: config.fragment_size,
            replication_factor: config.replication_factor,
            is_active: Arc::new(AtomicBool::new(true)),
            listener_thread: Arc::new(Mutex::new(None)),
        };

        node.start_server(listener, config.workers);
        info!(
            "{} - Listening on {} (ring of {}, fragment size {}, replication factor {})",
            node.node_data.id,
            node.node_data.addr,
            ring.len(),
            node.fragment_size,
            node.replication_factor,
        );
        Ok(node)
    }

    /// Starts the accept thread and two pools of `workers` threads each. Connection handlers
    /// read every request and answer peer messages themselves; client requests, which wait on
    /// other nodes, are passed on to the client pool. A node busy serving clients therefore
    /// still answers its peers.
    fn start_server(&self, listener: TcpListener, workers: usize) {
        let (stream_tx, stream_rx) = channel::<TcpStream>();
        let (client_tx, client_rx) = channel::<(TcpStream, Request)>();
        let stream_rx = Arc::new(Mutex::new(stream_rx));
        let client_rx = Arc::new(Mutex::new(client_rx));

        for _ in 0..workers {
            let node = self.clone();
            let rx = Arc::clone(&stream_rx);
            let client_tx = client_tx.clone();
            thread::spawn(move || {
                while let Some(stream) = recv_next(&rx) {
                    node.handle_connection(stream, &client_tx);
                }
                debug!("{} - Connection handler stopped", node.node_data.id);
            });

            let node = self.clone();
            let rx = Arc::clone(&client_rx);
            thread::spawn(move || {
                while let Some((stream, request)) = recv_next(&rx) {
                    node.reply(stream, request);
                }
                debug!("{} - Client handler stopped", node.node_data.id);
            });
        }

        let node = self.clone();
        let handle = thread::spawn(move || {
            for stream in listener.incoming() {
                if !node.is_active.load(Ordering::Acquire) {
                    break;
                }
                match stream {
                    Ok(stream) => {
                        if stream_tx.send(stream).is_err() {
                            error!("{} - Connection handlers are gone", node.node_data.id);
                            break;
                        }
                    },
                    Err(err) => {
                        warn!("{} - Could not accept connection: {}", node.node_data.id, err)
                    },
                }
            }
            info!("{} - Killed connection listener", node.node_data.id);
        });
        *self.lock_listener_thread() = Some(handle);
    }

    fn lock_listener_thread(&self) -> ::std::sync::MutexGuard<Option<JoinHandle<()>>> {
        match self.listener_thread.lock() {
            Ok(handle) => handle,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Blocks until the node has been killed and its listener closed.
    pub fn wait(&self) {
        let handle = self.lock_listener_thread().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("{} - Connection listener panicked", self.node_data.id);
            }
        }
    }

    /// Reads one request from `stream`. Peer messages are answered here; client requests are
    /// queued on `client_tx`. A malformed or failed exchange drops the connection and leaves the
    /// node running.
    fn handle_connection(&self, mut stream: TcpStream, client_tx: &Sender<(TcpStream, Request)>) {
        let timeout = Some(self.protocol.request_timeout());
        if let Err(err) = stream
            .set_read_timeout(timeout)
            .and_then(|_| stream.set_write_timeout(timeout))
        {
            warn!(
                "{} - Could not configure connection from {}: {}",
                self.node_data.id,
                peer_name(&stream),
                err
            );
            return;
        }

        let request: Request = match self.protocol.read_message(&mut stream) {
            Ok(Some(request)) => request,
            // liveness probe
            Ok(None) => return,
            Err(err) => {
                warn!(
                    "{} - Dropping connection from {}: {}",
                    self.node_data.id,
                    peer_name(&stream),
                    err
                );
                return;
            },
        };

        if request.is_peer_message() {
            self.reply(stream, request);
        } else if client_tx.send((stream, request)).is_err() {
            warn!("{} - Client handlers are gone", self.node_data.id);
        }
    }

    /// Dispatches `request` and writes the reply, if any, back on `stream`.
    fn reply(&self, mut stream: TcpStream, request: Request) {
        if let Some(response) = self.handle_request(request) {
            if let Err(err) = self.protocol.write_message(&mut stream, &response) {
                warn!(
                    "{} - Could not reply to {}: {}",
                    self.node_data.id,
                    peer_name(&stream),
                    err
                );
            }
        }
    }

    /// Routes a request to its handler. Returns `None` for fire-and-forget requests.
    pub fn handle_request(&self, request: Request) -> Option<Response> {
        debug!("{} - Handling {}", self.node_data.id, describe(&request));
        match request {
            Request::Upload { file_name, content } => Some(match self.upload(&file_name, content) {
                Ok(count) => Response::Uploaded {
                    message: format!("Upload of '{}' started ({} fragments).", file_name, count),
                },
                Err(err) => Response::Error {
                    message: err.to_string(),
                },
            }),
            Request::Download { file_name } => Some(match self.retrieve(&file_name) {
                Ok(content) => Response::File { file_name, content },
                Err(err) => Response::Error {
                    message: err.to_string(),
                },
            }),
            Request::List => Some(Response::Listing {
                files: self.list_all().into_iter().collect(),
            }),
            Request::Replicate {
                fragment,
                replica_count,
            } => {
                self.handle_replicate(fragment, replica_count);
                None
            },
            Request::Search { file_name } => {
                Some(Response::Fragments(self.read_storage().get(&file_name)))
            },
            Request::ListLocal => Some(Response::Files(
                self.read_storage().file_names().into_iter().collect(),
            )),
        }
    }

    /// Returns the first reachable peer not in `excluding`, or `NoLivePeer`.
    fn next_live(&self, excluding: &HashSet<NodeId>) -> Result<NodeData> {
        let protocol = &self.protocol;
        self.navigator
            .next_live(excluding, |node_data| protocol.probe(node_data.addr))
            .ok_or_else(|| Error::NoLivePeer(self.node_data.id.clone()))
    }

    fn read_storage(&self) -> RwLockReadGuard<Storage> {
        match self.storage.read() {
            Ok(storage) => storage,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_storage(&self) -> RwLockWriteGuard<Storage> {
        match self.storage.write() {
            Ok(storage) => storage,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Returns the `NodeData` associated with the node.
    pub fn node_data(&self) -> NodeData {
        (*self.node_data).clone()
    }

    pub fn addr(&self) -> SocketAddr {
        self.node_data.addr
    }

    /// Returns the number of fragments held locally for `file_name`.
    pub fn local_fragment_count(&self, file_name: &str) -> usize {
        self.read_storage().get(file_name).len()
    }

    /// Returns `true` if the node holds fragment `position` of `file_name` locally.
    pub fn holds_fragment(&self, file_name: &str, position: u32) -> bool {
        self.read_storage().contains(file_name, position)
    }

    /// Kills the node. The listener is closed, so peers observe the node as down from then on.
    pub fn kill(&self) {
        if self.is_active.swap(false, Ordering::AcqRel) {
            // wake the accept loop so it sees the flag and drops the listener
            let _ =
                TcpStream::connect_timeout(&self.node_data.addr, self.protocol.request_timeout());
            info!("{} - Killed", self.node_data.id);
        }
    }
}

/// Takes the next item off a queue shared by a pool of threads. Returns `None` once the sending
/// side is gone.
fn recv_next<T>(rx: &Mutex<Receiver<T>>) -> Option<T> {
    let rx = match rx.lock() {
        Ok(rx) => rx,
        Err(poisoned) => poisoned.into_inner(),
    };
    rx.recv().ok()
}

fn peer_name(stream: &TcpStream) -> String {
    stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown peer".to_string())
}

fn describe(request: &Request) -> String {
    match *request {
        Request::Upload {
            ref file_name,
            ref content,
        } => format!("UPLOAD '{}' ({} bytes)", file_name, content.len()),
        Request::Download { ref file_name } => format!("DOWNLOAD '{}'", file_name),
        Request::List => "LIST".to_string(),
        Request::Replicate {
            ref fragment,
            replica_count,
        } => format!("REPLICATE {:?} (replica {})", fragment, replica_count),
        Request::Search { ref file_name } => format!("SEARCH '{}'", file_name),
        Request::ListLocal => "LIST-LOCAL".to_string(),
    }
}
