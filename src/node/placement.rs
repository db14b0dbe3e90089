use std::collections::HashSet;
use std::thread;

use crate::error::{Error, Result};
use crate::fragment::{self, Fragment};
use crate::node::node_data::NodeId;
use crate::node::Node;
use crate::protocol::Request;

impl Node {
    /// Accepts a file through this node. Names already held by this node are rejected. Every
    /// fragment is stored locally before returning; the remaining `replication_factor - 1`
    /// copies are placed around the ring in the background. Returns the number of fragments the
    /// file was split into.
    pub fn upload(&self, file_name: &str, content: Vec<u8>) -> Result<usize> {
        if file_name.is_empty() {
            return Err(Error::InvalidUpload("file name is empty".to_string()));
        }
        if content.is_empty() {
            return Err(Error::InvalidUpload(format!("file '{}' is empty", file_name)));
        }

        let fragments = fragment::split(file_name, &content, self.fragment_size);
        {
            let mut storage = self.write_storage();
            // stored fragments are never replaced, so a second upload would mix two versions
            if !storage.get(file_name).is_empty() {
                return Err(Error::InvalidUpload(format!(
                    "file '{}' already exists",
                    file_name
                )));
            }
            for fragment in &fragments {
                storage.insert(fragment.clone());
            }
        }
        let count = fragments.len();
        info!(
            "{} - Accepted '{}' ({} bytes, {} fragments)",
            self.node_data.id,
            file_name,
            content.len(),
            count
        );

        if self.replication_factor > 1 {
            let node = self.clone();
            thread::spawn(move || node.place_fragments(fragments));
        }
        Ok(count)
    }

    /// Sends each fragment to a peer chosen through a rotating exclusion window, so consecutive
    /// fragments land on distinct reachable peers. The local copy is the first replica.
    fn place_fragments(&self, fragments: Vec<Fragment>) {
        let window_limit = self.navigator.ring().len().saturating_sub(1);
        let mut window: HashSet<NodeId> = HashSet::new();

        for fragment in fragments {
            if window.len() >= window_limit {
                window.clear();
            }
            match self.forward_replica(&fragment, 1, &window) {
                Ok(peer) => {
                    window.insert(peer);
                },
                Err(Error::NoLivePeer(_)) if !window.is_empty() => {
                    // every peer outside the window is down; allow reuse
                    window.clear();
                    match self.forward_replica(&fragment, 1, &window) {
                        Ok(peer) => {
                            window.insert(peer);
                        },
                        Err(err) => self.warn_unplaced(&fragment, &err),
                    }
                },
                Err(err) => self.warn_unplaced(&fragment, &err),
            }
        }
        debug!("{} - Finished placing fragments", self.node_data.id);
    }

    fn warn_unplaced(&self, fragment: &Fragment, err: &Error) {
        warn!(
            "{} - {:?} is only held locally: {}",
            self.node_data.id, fragment, err
        );
    }

    /// Handles an inbound `REPLICATE` envelope: stores the fragment unless it is already held and
    /// keeps it travelling until `replication_factor` nodes hold it.
    pub fn handle_replicate(&self, fragment: Fragment, replica_count: u32) {
        if replica_count >= self.replication_factor {
            debug!(
                "{} - Discarding {:?}: replica count {} reached",
                self.node_data.id, fragment, replica_count
            );
            return;
        }

        let is_new = self.write_storage().insert(fragment.clone());
        if !is_new {
            debug!("{} - Duplicate {:?}, not forwarding", self.node_data.id, fragment);
            return;
        }
        info!("{} - Stored {:?}", self.node_data.id, fragment);

        let replica_count = replica_count + 1;
        if replica_count < self.replication_factor {
            if let Err(err) = self.forward_replica(&fragment, replica_count, &HashSet::new()) {
                warn!(
                    "{} - Stopped replicating {:?} at {} copies: {}",
                    self.node_data.id, fragment, replica_count, err
                );
            }
        }
    }

    /// Sends `fragment` to the first live peer outside `excluding`. A peer that fails between the
    /// probe and the send is skipped, so at most one ring traversal is attempted. Returns the peer
    /// that accepted the envelope.
    fn forward_replica(
        &self,
        fragment: &Fragment,
        replica_count: u32,
        excluding: &HashSet<NodeId>,
    ) -> Result<NodeId> {
        let mut excluding = excluding.clone();
        let request = Request::Replicate {
            fragment: fragment.clone(),
            replica_count,
        };
        loop {
            let peer = self.next_live(&excluding)?;
            match self.protocol.send(peer.addr, &request) {
                Ok(()) => {
                    debug!(
                        "{} - Sent {:?} to {} (replica {})",
                        self.node_data.id, fragment, peer.id, replica_count
                    );
                    return Ok(peer.id);
                },
                Err(err) => {
                    warn!(
                        "{} - Could not send {:?} to {}: {}",
                        self.node_data.id, fragment, peer.id, err
                    );
                    excluding.insert(peer.id);
                },
            }
        }
    }
}
