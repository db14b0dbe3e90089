extern crate bincode;
#[macro_use]
extern crate log;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate simplelog;
extern crate thiserror;
extern crate toml;

pub mod client;
pub mod config;
pub mod error;
pub mod fragment;
pub mod logging;
mod node;
pub mod protocol;
pub mod routing;
pub mod storage;

pub use self::client::Client;
pub use self::config::Config;
pub use self::error::{Error, Result};
pub use self::fragment::Fragment;
pub use self::node::node_data::{NodeData, NodeId};
pub use self::node::Node;

/// The default number of bytes in a fragment.
pub const FRAGMENT_SIZE: usize = 64;

/// The default number of distinct nodes that hold a copy of each fragment.
pub const REPLICATION_FACTOR: u32 = 2;

/// Liveness probe timeout in milliseconds.
pub const PROBE_TIMEOUT: u64 = 500;

/// Data-bearing request timeout in milliseconds.
pub const REQUEST_TIMEOUT: u64 = 5000;

/// The default number of connection handler threads per node.
pub const WORKER_COUNT: usize = 8;

/// The maximum length of a serialized message in bytes.
pub const MESSAGE_LENGTH: u64 = 64 * 1024 * 1024;
