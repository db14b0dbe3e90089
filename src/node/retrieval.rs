use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::Result;
use crate::fragment::{self, Fragment};
use crate::node::node_data::NodeId;
use crate::node::Node;
use crate::protocol::{Request, Response};

impl Node {
    /// Reassembles `file_name` from local fragments and, if those are not enough, from the
    /// fragments held by each live peer in successor order. The walk stops as soon as every
    /// declared position is filled or once the ring is exhausted.
    ///
    /// Fails with `NotFound` if no reachable node holds a fragment, or `Incomplete` if some
    /// positions are unreachable.
    pub fn retrieve(&self, file_name: &str) -> Result<Vec<u8>> {
        let mut collected: BTreeMap<u32, Fragment> = self
            .read_storage()
            .get(file_name)
            .into_iter()
            .map(|fragment| (fragment.position, fragment))
            .collect();

        let mut visited: HashSet<NodeId> = HashSet::new();
        while fragment::needs_more(&collected) {
            let peer = match self.next_live(&visited) {
                Ok(peer) => peer,
                Err(err) => {
                    debug!("{} - Search for '{}' ended: {}", self.node_data.id, file_name, err);
                    break;
                },
            };
            visited.insert(peer.id.clone());

            let request = Request::Search {
                file_name: file_name.to_string(),
            };
            match self.protocol.request(peer.addr, &request) {
                Ok(Response::Fragments(fragments)) => {
                    for fragment in fragments.into_iter().filter(|f| f.file_name == file_name) {
                        collected.entry(fragment.position).or_insert(fragment);
                    }
                },
                Ok(other) => warn!(
                    "{} - Unexpected search reply from {}: {:?}",
                    self.node_data.id, peer.id, other
                ),
                Err(err) => warn!("{} - Search at {} failed: {}", self.node_data.id, peer.id, err),
            }
        }

        let content = fragment::assemble(file_name, &collected)?;
        info!(
            "{} - Reassembled '{}' ({} bytes, {} peers queried)",
            self.node_data.id,
            file_name,
            content.len(),
            visited.len()
        );
        Ok(content)
    }

    /// Returns every file name held by this node or any live peer.
    pub fn list_all(&self) -> BTreeSet<String> {
        let mut files = self.read_storage().file_names();
        let mut visited: HashSet<NodeId> = HashSet::new();

        while let Ok(peer) = self.next_live(&visited) {
            visited.insert(peer.id.clone());
            match self.protocol.request(peer.addr, &Request::ListLocal) {
                Ok(Response::Files(names)) => files.extend(names),
                Ok(other) => warn!(
                    "{} - Unexpected listing reply from {}: {:?}",
                    self.node_data.id, peer.id, other
                ),
                Err(err) => warn!("{} - Listing at {} failed: {}", self.node_data.id, peer.id, err),
            }
        }
        debug!(
            "{} - Listed {} files across {} peers",
            self.node_data.id,
            files.len(),
            visited.len()
        );
        files
    }
}
